// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.6
//# The CRYPTO frame (type=0x06) is used to transmit cryptographic
//# handshake messages.  It can be sent in all packet types.  The CRYPTO
//# frame offers the cryptographic protocol an in-order stream of bytes.

const TAG: Tag = 0x06;

#[derive(Debug, PartialEq, Eq)]
pub struct Crypto<'a> {
    /// The byte offset in the epoch's crypto stream
    pub offset: VarInt,

    pub data: &'a [u8],
}

impl Crypto<'_> {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> Crypto<'a> {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (offset, buffer) = buffer.decode()?;
            let (data, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            let data: &[u8] = data.into_less_safe_slice();

            Ok((Crypto { offset, data }, buffer))
        }
    }
);

impl EncoderValue for Crypto<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.offset);
        buffer.encode_with_len_prefix::<VarInt, _>(&self.data);
    }
}
