// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{endpoint, stream::StreamType, varint::VarInt};

/// The ID of a stream.
///
/// A stream ID is a 62-bit integer (0 to 2^62-1) that is unique for all
/// streams on a connection.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub struct StreamId(VarInt);

impl From<StreamId> for VarInt {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl From<StreamId> for u64 {
    fn from(id: StreamId) -> Self {
        id.0.as_u64()
    }
}

impl StreamId {
    #[inline]
    pub const fn from_varint(id: VarInt) -> StreamId {
        StreamId(id)
    }

    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0.as_u64()
    }

    //= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-2.1
    //# The two least significant bits from a stream ID therefore identify a
    //# stream as one of four types, as summarized in Table 1.
    //#
    //#    | Bits | Stream Type                      |
    //#    | 0x0  | Client-Initiated, Bidirectional  |
    //#    | 0x1  | Server-Initiated, Bidirectional  |
    //#    | 0x2  | Client-Initiated, Unidirectional |
    //#    | 0x3  | Server-Initiated, Unidirectional |

    /// Returns the initial Stream ID for a given initiator and type
    #[inline]
    pub fn initial(initiator: endpoint::Type, stream_type: StreamType) -> StreamId {
        match (stream_type, initiator) {
            (StreamType::Bidirectional, endpoint::Type::Client) => StreamId(VarInt::from_u8(0)),
            (StreamType::Bidirectional, endpoint::Type::Server) => StreamId(VarInt::from_u8(1)),
            (StreamType::Unidirectional, endpoint::Type::Client) => StreamId(VarInt::from_u8(2)),
            (StreamType::Unidirectional, endpoint::Type::Server) => StreamId(VarInt::from_u8(3)),
        }
    }

    /// Returns the n-th `StreamId` for a certain type of stream.
    ///
    /// The 0th `StreamId` is the one returned by [`Self::initial`]; ids of
    /// the same type are spaced apart by 4. Returns `None` when the id
    /// would exceed the varint range.
    #[inline]
    pub fn nth(initiator: endpoint::Type, stream_type: StreamType, n: u64) -> Option<StreamId> {
        let initial = Self::initial(initiator, stream_type);
        let id = VarInt::new(n.checked_mul(4)?.checked_add(initial.into())?).ok()?;
        Some(StreamId(id))
    }

    /// Returns whether the client or server initiated the stream
    #[inline]
    pub fn initiator(self) -> endpoint::Type {
        if self.as_u64() & 0x01 == 0 {
            endpoint::Type::Client
        } else {
            endpoint::Type::Server
        }
    }

    /// Returns whether the stream is unidirectional or bidirectional
    #[inline]
    pub fn stream_type(self) -> StreamType {
        if self.as_u64() & 0x02 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }

    /// Returns whether `local` is allowed to receive data on this stream
    #[inline]
    pub fn can_receive(self, local: endpoint::Type) -> bool {
        self.stream_type().is_bidirectional() || self.initiator() != local
    }

    /// Returns whether `local` is allowed to send data on this stream
    #[inline]
    pub fn can_send(self, local: endpoint::Type) -> bool {
        self.stream_type().is_bidirectional() || self.initiator() == local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use endpoint::Type::{Client, Server};

    #[test]
    fn initial_stream_ids_test() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [Client, Server] {
                let id = StreamId::initial(initiator, stream_type);
                assert_eq!(stream_type, id.stream_type());
                assert_eq!(initiator, id.initiator());
            }
        }
    }

    #[test]
    fn nth_stream_id_test() {
        assert_eq!(
            StreamId::nth(Client, StreamType::Bidirectional, 1).unwrap().as_u64(),
            4
        );
        assert_eq!(
            StreamId::nth(Server, StreamType::Unidirectional, 2).unwrap().as_u64(),
            11
        );
        assert!(StreamId::nth(Client, StreamType::Bidirectional, u64::MAX).is_none());
    }

    #[test]
    fn direction_table_test() {
        // the table from the transport draft, exhaustively
        for base in [0u64, 4, 8] {
            let id = |offset| StreamId::from_varint(VarInt::new(base + offset).unwrap());

            // client-initiated bidirectional
            assert!(id(0).can_receive(Client) && id(0).can_send(Client));
            assert!(id(0).can_receive(Server) && id(0).can_send(Server));

            // server-initiated bidirectional
            assert!(id(1).can_receive(Client) && id(1).can_send(Client));
            assert!(id(1).can_receive(Server) && id(1).can_send(Server));

            // client-initiated unidirectional
            assert!(!id(2).can_receive(Client) && id(2).can_send(Client));
            assert!(id(2).can_receive(Server) && !id(2).can_send(Server));

            // server-initiated unidirectional
            assert!(id(3).can_receive(Client) && !id(3).can_send(Client));
            assert!(!id(3).can_receive(Server) && id(3).can_send(Server));
        }
    }
}
