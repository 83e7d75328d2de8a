// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::frame::Tag;
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.2
//# Endpoints can use PING frames (type=0x01) to verify that their peers
//# are still alive or to check reachability to the peer.

const TAG: Tag = 0x01;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Ping;

impl Ping {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> Ping {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            Ok((Ping, buffer))
        }
    }
);

impl EncoderValue for Ping {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
    }
}
