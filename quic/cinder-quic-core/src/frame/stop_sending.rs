// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{frame::Tag, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.5
//# An endpoint uses a STOP_SENDING frame (type=0x05) to communicate that
//# incoming data is being discarded on receipt at application request.

const TAG: Tag = 0x05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSending {
    pub stream_id: VarInt,
    pub application_error_code: u16,
}

impl StopSending {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> StopSending {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (stream_id, buffer) = buffer.decode()?;
            let (application_error_code, buffer) = buffer.decode()?;

            let frame = StopSending {
                stream_id,
                application_error_code,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for StopSending {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);
        buffer.encode(&self.application_error_code);
    }
}
