// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.10
//# The MAX_STREAM_DATA frame (type=0x11) is used in flow control to
//# inform a peer of the maximum amount of data that can be sent on a
//# stream.

const TAG: Tag = 0x11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxStreamData {
    pub stream_id: VarInt,
    pub maximum_stream_data: VarInt,
}

impl MaxStreamData {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> MaxStreamData {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (stream_id, buffer) = buffer.decode()?;
            let (maximum_stream_data, buffer) = buffer.decode()?;

            let frame = MaxStreamData {
                stream_id,
                maximum_stream_data,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for MaxStreamData {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);
        buffer.encode(&self.maximum_stream_data);
    }
}
