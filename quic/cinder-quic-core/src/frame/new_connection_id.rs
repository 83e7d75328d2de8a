// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{connection::id, frame::Tag, varint::VarInt};
use core::convert::TryInto;
use s2n_codec::{decoder_invariant, decoder_parameterized_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.15
//# An endpoint sends a NEW_CONNECTION_ID frame (type=0x18) to provide
//# its peer with alternative connection IDs that can be used to break
//# linkability when migrating connections.

const TAG: Tag = 0x18;

pub const STATELESS_RESET_TOKEN_LEN: usize = 16;

#[derive(Debug, PartialEq, Eq)]
pub struct NewConnectionId<'a> {
    /// Monotonically increasing sequence number assigned by the sender
    pub sequence_number: VarInt,

    /// Connection ids with a sequence number below this are retired
    pub retire_prior_to: VarInt,

    pub connection_id: &'a [u8],

    pub stateless_reset_token: &'a [u8; STATELESS_RESET_TOKEN_LEN],
}

impl NewConnectionId<'_> {
    pub const fn tag(&self) -> Tag {
        TAG
    }
}

decoder_parameterized_value!(
    impl<'a> NewConnectionId<'a> {
        fn decode(_tag: Tag, buffer: Buffer) -> Result<Self> {
            let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
            let (retire_prior_to, buffer) = buffer.decode::<VarInt>()?;

            decoder_invariant!(
                retire_prior_to <= sequence_number,
                "retire_prior_to cannot exceed the sequence number"
            );

            let (cid_len, buffer) = buffer.decode::<u8>()?;
            decoder_invariant!(
                (1..=id::MAX_LEN).contains(&(cid_len as usize)),
                "invalid connection id length"
            );

            let (connection_id, buffer) = buffer.decode_slice(cid_len as usize)?;
            let connection_id: &[u8] = connection_id.into_less_safe_slice();

            let (token, buffer) = buffer.decode_slice(STATELESS_RESET_TOKEN_LEN)?;
            let token: &[u8] = token.into_less_safe_slice();
            let stateless_reset_token = token
                .try_into()
                .expect("token length has already been verified");

            let frame = NewConnectionId {
                sequence_number,
                retire_prior_to,
                connection_id,
                stateless_reset_token,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for NewConnectionId<'_> {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.sequence_number);
        buffer.encode(&self.retire_prior_to);
        buffer.encode(&(self.connection_id.len() as u8));
        buffer.encode(&self.connection_id);
        buffer.encode(&self.stateless_reset_token.as_ref());
    }
}
