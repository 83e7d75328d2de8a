// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::Tag;
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.1
//# The PADDING frame (type=0x00) has no semantic value.  PADDING frames
//# can be used to increase the size of a packet.

const TAG: Tag = 0x00;

/// A run of padding bytes.
///
/// Decoding greedily consumes every consecutive zero byte, so a padded
/// tail parses as a single frame.
#[derive(Debug, PartialEq, Eq)]
pub struct Padding {
    pub length: usize,
}

impl Padding {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> Padding {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let mut length = 1;
            let mut buffer = buffer;
            while matches!(buffer.peek_byte(0), Ok(0)) {
                buffer = buffer.skip(1)?;
                length += 1;
            }
            Ok((Padding { length }, buffer))
        }
    }
);

impl EncoderValue for Padding {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.write_repeated(self.length, 0);
    }
}
