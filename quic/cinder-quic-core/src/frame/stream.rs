// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.8
//# STREAM frames implicitly create a stream and carry stream data.  The
//# STREAM frame takes the form 0b00001XXX (or the set of values from
//# 0x08 to 0x0f).  The value of the three low-order bits of the frame
//# type determine the fields that are present in the frame.

const STREAM_TAG: Tag = 0x08;

/// The OFF bit indicates an Offset field is present
const OFF_BIT: Tag = 0x04;

/// The LEN bit indicates a Length field is present; without it the data
/// extends to the end of the packet
const LEN_BIT: Tag = 0x02;

/// The FIN bit marks the end of the stream
const FIN_BIT: Tag = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct Stream<'a> {
    pub stream_id: VarInt,

    /// Absolute byte offset of `data` within the stream
    pub offset: VarInt,

    /// When true the frame has no Length field and owns the rest of the
    /// packet
    pub is_last_frame: bool,

    /// When true the frame fixes the stream's final size at
    /// `offset + data.len()`
    pub is_fin: bool,

    pub data: &'a [u8],
}

impl Stream<'_> {
    #[inline]
    pub fn tag(&self) -> Tag {
        let mut tag = STREAM_TAG;

        if *self.offset != 0 {
            tag |= OFF_BIT;
        }

        if !self.is_last_frame {
            tag |= LEN_BIT;
        }

        if self.is_fin {
            tag |= FIN_BIT;
        }

        tag
    }
}

decoder_parameterized_value!(
    impl<'a> Stream<'a> {
        fn decode(tag: Tag, buffer: Buffer) -> Result<Self> {
            let has_offset = tag & OFF_BIT == OFF_BIT;
            let is_last_frame = tag & LEN_BIT != LEN_BIT;
            let is_fin = tag & FIN_BIT == FIN_BIT;

            let (stream_id, buffer) = buffer.decode()?;

            let (offset, buffer) = if has_offset {
                buffer.decode()?
            } else {
                (Default::default(), buffer)
            };

            let (data, buffer) = if is_last_frame {
                let len = buffer.len();
                buffer.decode_slice(len)?
            } else {
                buffer.decode_slice_with_len_prefix::<VarInt>()?
            };
            let data: &[u8] = data.into_less_safe_slice();

            let frame = Stream {
                stream_id,
                offset,
                is_last_frame,
                is_fin,
                data,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for Stream<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);

        if *self.offset != 0 {
            buffer.encode(&self.offset);
        }

        if self.is_last_frame {
            buffer.encode(&self.data);
        } else {
            buffer.encode_with_len_prefix::<VarInt, _>(&self.data);
        }
    }
}
