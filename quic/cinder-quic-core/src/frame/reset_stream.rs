// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.4
//# An endpoint uses a RESET_STREAM frame (type=0x04) to abruptly
//# terminate the sending part of a stream.

const TAG: Tag = 0x04;

/// Application error codes are 16 bits on the wire in these drafts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetStream {
    pub stream_id: VarInt,
    pub application_error_code: u16,
    pub final_size: VarInt,
}

impl ResetStream {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> ResetStream {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (stream_id, buffer) = buffer.decode()?;
            let (application_error_code, buffer) = buffer.decode()?;
            let (final_size, buffer) = buffer.decode()?;

            let frame = ResetStream {
                stream_id,
                application_error_code,
                final_size,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for ResetStream {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);
        buffer.encode(&self.application_error_code);
        buffer.encode(&self.final_size);
    }
}
