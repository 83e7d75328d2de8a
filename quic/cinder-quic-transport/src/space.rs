// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::buffer::Reassembler;
use cinder_quic_core::{
    ack::AckRanges,
    crypto::{Open, Seal},
};
use std::time::Instant;

/// Per-epoch keys, acknowledgement state, and the crypto stream.
///
/// Packet numbers are assigned by post-increment and never reused within
/// a space; re-initialization after Retry or version negotiation carries
/// the counter forward.
pub(crate) struct PacketNumberSpace {
    pub send_key: Option<Box<dyn Seal>>,
    pub recv_key: Option<Box<dyn Open>>,

    pub next_packet_number: u64,

    /// Received packet numbers not yet acknowledged
    pub ack_queue: AckRanges,

    /// An ack-eliciting packet arrived; the next build pass emits an ACK
    pub ack_pending: bool,

    pub largest_seen: Option<u64>,
    pub largest_seen_time: Option<Instant>,

    /// Reassembly of received CRYPTO frames
    pub crypto_recv: Reassembler,

    /// Handshake bytes waiting to be framed
    pub crypto_send: Vec<u8>,

    /// Offset of the first byte in `crypto_send`
    pub crypto_send_offset: u64,
}

impl PacketNumberSpace {
    pub fn new() -> Self {
        Self {
            send_key: None,
            recv_key: None,
            next_packet_number: 0,
            ack_queue: AckRanges::new(),
            ack_pending: false,
            largest_seen: None,
            largest_seen_time: None,
            crypto_recv: Reassembler::new(),
            crypto_send: Vec::new(),
            crypto_send_offset: 0,
        }
    }

    /// A fresh space keeping the packet number counter
    pub fn reset_keeping_packet_numbers(&self) -> Self {
        let mut space = Self::new();
        space.next_packet_number = self.next_packet_number;
        space
    }

    pub fn allocate_packet_number(&mut self) -> u64 {
        let packet_number = self.next_packet_number;
        self.next_packet_number += 1;
        packet_number
    }

    pub fn on_packet_received(&mut self, packet_number: u64, ack_eliciting: bool) {
        self.ack_queue.insert(packet_number);
        if self.largest_seen.map_or(true, |seen| packet_number > seen) {
            self.largest_seen = Some(packet_number);
            self.largest_seen_time = Some(Instant::now());
        }
        if ack_eliciting {
            self.ack_pending = true;
        }
    }

    /// Queues handshake bytes produced by the TLS engine
    pub fn queue_crypto(&mut self, data: &[u8]) {
        self.crypto_send.extend_from_slice(data);
    }

    pub fn has_crypto_to_send(&self) -> bool {
        !self.crypto_send.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_numbers_increase_test() {
        let mut space = PacketNumberSpace::new();
        assert_eq!(space.allocate_packet_number(), 0);
        assert_eq!(space.allocate_packet_number(), 1);

        let space = space.reset_keeping_packet_numbers();
        assert_eq!(space.next_packet_number, 2);
    }

    #[test]
    fn ack_scheduling_test() {
        let mut space = PacketNumberSpace::new();
        space.on_packet_received(0, false);
        assert!(!space.ack_pending);
        assert_eq!(space.largest_seen, Some(0));

        space.on_packet_received(1, true);
        assert!(space.ack_pending);
        assert!(space.ack_queue.contains(0));
        assert!(space.ack_queue.contains(1));
    }

    #[test]
    fn crypto_queue_test() {
        let mut space = PacketNumberSpace::new();
        assert!(!space.has_crypto_to_send());
        space.queue_crypto(b"client");
        space.queue_crypto(b" hello");
        assert!(space.has_crypto_to_send());
        assert_eq!(space.crypto_send, b"client hello");
        assert_eq!(space.crypto_send_offset, 0);
    }
}
