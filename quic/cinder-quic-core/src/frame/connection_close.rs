// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.19
//# An endpoint sends a CONNECTION_CLOSE frame (type=0x1c or 0x1d) to
//# notify its peer that the connection is being closed.  The
//# CONNECTION_CLOSE with a frame type of 0x1c is used to signal errors
//# at only the QUIC layer, or the absence of errors (with the NO_ERROR
//# code).  The CONNECTION_CLOSE frame with a type of 0x1d is used to
//# signal an error with the application that uses QUIC.

const QUIC_ERROR_TAG: Tag = 0x1c;
const APPLICATION_ERROR_TAG: Tag = 0x1d;

/// Error codes are 16 bits on the wire in these drafts, which still
/// covers the 0x100-0x1ff crypto error range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionClose<'a> {
    pub error_code: u16,

    /// The frame type that triggered the error; absent for the
    /// application variant (0x1d)
    pub frame_type: Option<VarInt>,

    pub reason: &'a [u8],
}

impl ConnectionClose<'_> {
    #[inline]
    pub fn tag(&self) -> Tag {
        if self.frame_type.is_some() {
            QUIC_ERROR_TAG
        } else {
            APPLICATION_ERROR_TAG
        }
    }
}

decoder_parameterized_value!(
    impl<'a> ConnectionClose<'a> {
        fn decode(tag: Tag, buffer: Buffer) -> Result<Self> {
            let (error_code, buffer) = buffer.decode::<u16>()?;

            let (frame_type, buffer) = if tag == QUIC_ERROR_TAG {
                let (frame_type, buffer) = buffer.decode()?;
                (Some(frame_type), buffer)
            } else {
                (None, buffer)
            };

            let (reason, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            let reason: &[u8] = reason.into_less_safe_slice();

            let frame = ConnectionClose {
                error_code,
                frame_type,
                reason,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for ConnectionClose<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.error_code);

        if let Some(frame_type) = &self.frame_type {
            buffer.encode(frame_type);
        }

        buffer.encode_with_len_prefix::<VarInt, _>(&self.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s2n_codec::{DecoderBuffer, EncoderBuffer};

    fn round_trip(frame: &ConnectionClose) {
        let mut bytes = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(frame);
        let len = encoder.len();

        let buffer = DecoderBuffer::new(&bytes[..len]);
        let tag = buffer.peek_byte(0).unwrap();
        assert_eq!(tag, frame.tag());
        let buffer = buffer.skip(1).unwrap();
        let (decoded, remaining) = buffer.decode_parameterized::<ConnectionClose>(tag).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(&decoded, frame);
    }

    #[test]
    fn transport_variant_test() {
        round_trip(&ConnectionClose {
            error_code: 0x0128,
            frame_type: Some(VarInt::from_u8(0x06)),
            reason: b"handshake failure",
        });
    }

    #[test]
    fn application_variant_test() {
        round_trip(&ConnectionClose {
            error_code: 0,
            frame_type: None,
            reason: b"",
        });
    }
}
