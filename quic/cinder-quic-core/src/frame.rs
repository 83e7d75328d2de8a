// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Frame codecs for drafts 17 through 20.
//!
//! Every frame type carried by those drafts has a module here; decoding
//! dispatches on the first byte of the frame. Frame tags above 0x1d are
//! not defined in these drafts and are left to the caller, which is what
//! makes "unknown type" a visible default arm instead of an omission.

use s2n_codec::{DecoderBuffer, DecoderBufferResult, DecoderError};

pub(crate) type Tag = u8;

pub mod ack;
pub mod connection_close;
pub mod crypto;
pub mod data_blocked;
pub mod max_data;
pub mod max_stream_data;
pub mod max_streams;
pub mod new_connection_id;
pub mod new_token;
pub mod padding;
pub mod path_challenge;
pub mod path_response;
pub mod ping;
pub mod reset_stream;
pub mod retire_connection_id;
pub mod stop_sending;
pub mod stream;
pub mod stream_data_blocked;
pub mod streams_blocked;

pub use ack::{Ack, EcnCounts};
pub use connection_close::ConnectionClose;
pub use crypto::Crypto;
pub use data_blocked::DataBlocked;
pub use max_data::MaxData;
pub use max_stream_data::MaxStreamData;
pub use max_streams::MaxStreams;
pub use new_connection_id::NewConnectionId;
pub use new_token::NewToken;
pub use padding::Padding;
pub use path_challenge::PathChallenge;
pub use path_response::PathResponse;
pub use ping::Ping;
pub use reset_stream::ResetStream;
pub use retire_connection_id::RetireConnectionId;
pub use stop_sending::StopSending;
pub use stream::Stream;
pub use stream_data_blocked::StreamDataBlocked;
pub use streams_blocked::StreamsBlocked;

/// The largest frame tag defined by drafts 17-20
pub const MAX_KNOWN_TAG: Tag = 0x1d;

#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Padding(Padding),
    Ping(Ping),
    Ack(Ack),
    ResetStream(ResetStream),
    StopSending(StopSending),
    Crypto(Crypto<'a>),
    NewToken(NewToken<'a>),
    Stream(Stream<'a>),
    MaxData(MaxData),
    MaxStreamData(MaxStreamData),
    MaxStreams(MaxStreams),
    DataBlocked(DataBlocked),
    StreamDataBlocked(StreamDataBlocked),
    StreamsBlocked(StreamsBlocked),
    NewConnectionId(NewConnectionId<'a>),
    RetireConnectionId(RetireConnectionId),
    PathChallenge(PathChallenge<'a>),
    PathResponse(PathResponse<'a>),
    ConnectionClose(ConnectionClose<'a>),
}

impl<'a> Frame<'a> {
    pub fn tag(&self) -> Tag {
        match self {
            Frame::Padding(f) => f.tag(),
            Frame::Ping(f) => f.tag(),
            Frame::Ack(f) => f.tag(),
            Frame::ResetStream(f) => f.tag(),
            Frame::StopSending(f) => f.tag(),
            Frame::Crypto(f) => f.tag(),
            Frame::NewToken(f) => f.tag(),
            Frame::Stream(f) => f.tag(),
            Frame::MaxData(f) => f.tag(),
            Frame::MaxStreamData(f) => f.tag(),
            Frame::MaxStreams(f) => f.tag(),
            Frame::DataBlocked(f) => f.tag(),
            Frame::StreamDataBlocked(f) => f.tag(),
            Frame::StreamsBlocked(f) => f.tag(),
            Frame::NewConnectionId(f) => f.tag(),
            Frame::RetireConnectionId(f) => f.tag(),
            Frame::PathChallenge(f) => f.tag(),
            Frame::PathResponse(f) => f.tag(),
            Frame::ConnectionClose(f) => f.tag(),
        }
    }

    /// A packet is ack-eliciting when it contains any frame other than
    /// PADDING, ACK, or CONNECTION_CLOSE.
    pub fn is_ack_eliciting(&self) -> bool {
        !matches!(
            self,
            Frame::Padding(_) | Frame::Ack(_) | Frame::ConnectionClose(_)
        )
    }

    /// Decodes one frame with a known tag (0x00..=0x1d).
    ///
    /// Unknown tags are rejected with an invariant violation; callers that
    /// want draft-style leniency for trailing unknown frames must check the
    /// tag before calling.
    pub fn decode(buffer: DecoderBuffer<'a>) -> DecoderBufferResult<'a, Self> {
        macro_rules! decode {
            ($buffer:ident, $tag:ident, $variant:ident) => {{
                let buffer = $buffer.skip(core::mem::size_of::<Tag>())?;
                let (frame, buffer) = buffer.decode_parameterized($tag)?;
                Ok((Frame::$variant(frame), buffer))
            }};
        }

        let tag = buffer.peek_byte(0)?;
        match tag {
            0x00 => decode!(buffer, tag, Padding),
            0x01 => decode!(buffer, tag, Ping),
            0x02..=0x03 => decode!(buffer, tag, Ack),
            0x04 => decode!(buffer, tag, ResetStream),
            0x05 => decode!(buffer, tag, StopSending),
            0x06 => decode!(buffer, tag, Crypto),
            0x07 => decode!(buffer, tag, NewToken),
            0x08..=0x0f => decode!(buffer, tag, Stream),
            0x10 => decode!(buffer, tag, MaxData),
            0x11 => decode!(buffer, tag, MaxStreamData),
            0x12..=0x13 => decode!(buffer, tag, MaxStreams),
            0x14 => decode!(buffer, tag, DataBlocked),
            0x15 => decode!(buffer, tag, StreamDataBlocked),
            0x16..=0x17 => decode!(buffer, tag, StreamsBlocked),
            0x18 => decode!(buffer, tag, NewConnectionId),
            0x19 => decode!(buffer, tag, RetireConnectionId),
            0x1a => decode!(buffer, tag, PathChallenge),
            0x1b => decode!(buffer, tag, PathResponse),
            0x1c..=0x1d => decode!(buffer, tag, ConnectionClose),
            _ => Err(DecoderError::InvariantViolation("unknown frame type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::VarInt;
    use s2n_codec::{Encoder, EncoderBuffer};

    fn decode_one(bytes: &[u8]) -> Frame {
        let (frame, remaining) = Frame::decode(DecoderBuffer::new(bytes)).unwrap();
        assert!(remaining.is_empty());
        frame
    }

    #[test]
    fn dispatch_test() {
        assert!(matches!(decode_one(&[0x01]), Frame::Ping(_)));
        assert!(matches!(decode_one(&[0x10, 0x04]), Frame::MaxData(_)));
        assert!(matches!(
            decode_one(&[0x12, 0x40, 0x65]),
            Frame::MaxStreams(MaxStreams {
                maximum_streams, ..
            }) if maximum_streams == 101u64
        ));
    }

    #[test]
    fn unknown_tag_test() {
        assert!(Frame::decode(DecoderBuffer::new(&[0x1e])).is_err());
        assert!(Frame::decode(DecoderBuffer::new(&[0x40, 0x20])).is_err());
    }

    #[test]
    fn ack_elicitation_test() {
        let eliciting = decode_one(&[0x01]);
        assert!(eliciting.is_ack_eliciting());

        let padding = decode_one(&[0x00, 0x00, 0x00]);
        assert!(!padding.is_ack_eliciting());

        // ACK: largest 2, delay 0, 0 extra ranges, first range 2
        let ack = decode_one(&[0x02, 0x02, 0x00, 0x00, 0x02]);
        assert!(!ack.is_ack_eliciting());
    }

    #[test]
    fn wire_order_test() {
        // two frames back to back decode sequentially
        let mut bytes = [0u8; 16];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&MaxData {
            maximum_data: VarInt::from_u32(12345),
        });
        encoder.encode(&Ping);
        let len = encoder.len();

        let buffer = DecoderBuffer::new(&bytes[..len]);
        let (first, buffer) = Frame::decode(buffer).unwrap();
        let (second, buffer) = Frame::decode(buffer).unwrap();
        assert!(buffer.is_empty());
        assert!(matches!(first, Frame::MaxData(_)));
        assert!(matches!(second, Frame::Ping(_)));
    }
}
