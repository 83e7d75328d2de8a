// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.13
//# A sender SHOULD send a STREAM_DATA_BLOCKED frame (type=0x15) when it
//# wishes to send data, but is unable to due to stream-level flow
//# control.

const TAG: Tag = 0x15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamDataBlocked {
    pub stream_id: VarInt,
    pub stream_data_limit: VarInt,
}

impl StreamDataBlocked {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> StreamDataBlocked {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (stream_id, buffer) = buffer.decode()?;
            let (stream_data_limit, buffer) = buffer.decode()?;

            let frame = StreamDataBlocked {
                stream_id,
                stream_data_limit,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for StreamDataBlocked {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);
        buffer.encode(&self.stream_data_limit);
    }
}
