// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::{path_challenge::DATA_LEN, Tag};
use core::convert::TryInto;
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.18
//# The PATH_RESPONSE frame (type=0x1b) is sent in response to a
//# PATH_CHALLENGE frame.  Its format is identical to the PATH_CHALLENGE
//# frame.

const TAG: Tag = 0x1b;

#[derive(Debug, PartialEq, Eq)]
pub struct PathResponse<'a> {
    /// The data echoed from the PATH_CHALLENGE
    pub data: &'a [u8; DATA_LEN],
}

impl PathResponse<'_> {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> PathResponse<'a> {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (data, buffer) = buffer.decode_slice(DATA_LEN)?;
            let data: &[u8] = data.into_less_safe_slice();
            let data = data.try_into().expect("length has already been verified");

            Ok((PathResponse { data }, buffer))
        }
    }
);

impl EncoderValue for PathResponse<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.data.as_ref());
    }
}
