// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.9
//# The MAX_DATA frame (type=0x10) is used in flow control to inform the
//# peer of the maximum amount of data that can be sent on the connection
//# as a whole.

const TAG: Tag = 0x10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxData {
    pub maximum_data: VarInt,
}

impl MaxData {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> MaxData {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (maximum_data, buffer) = buffer.decode()?;
            Ok((MaxData { maximum_data }, buffer))
        }
    }
);

impl EncoderValue for MaxData {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.maximum_data);
    }
}
