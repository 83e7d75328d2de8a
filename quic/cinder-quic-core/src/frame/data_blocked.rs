// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.12
//# A sender SHOULD send a DATA_BLOCKED frame (type=0x14) when it wishes
//# to send data, but is unable to due to connection-level flow control.

const TAG: Tag = 0x14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataBlocked {
    /// The connection-level limit at which blocking occurred
    pub data_limit: VarInt,
}

impl DataBlocked {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> DataBlocked {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (data_limit, buffer) = buffer.decode()?;
            Ok((DataBlocked { data_limit }, buffer))
        }
    }
);

impl EncoderValue for DataBlocked {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.data_limit);
    }
}
