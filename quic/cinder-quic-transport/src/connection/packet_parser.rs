// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Inbound datagram parsing.
//!
//! Datagrams may hold several coalesced packets; each is located through
//! its header, unprotected, decrypted with the keys of its epoch, and
//! its frames dispatched in wire order. Packets that cannot be keyed or
//! authenticated are dropped without ceremony; only frame-level rule
//! violations become connection errors.

use super::{Inner, State};
use cinder_quic_core::{
    connection::{id, ConnectionId},
    epoch::Epoch,
    frame::{self, Frame},
    packet::{self, number, retry::Retry, version_negotiation::VersionNegotiation, LongType},
    transport::TransportError,
    varint::VarInt,
    version::Version,
};
use core::convert::TryFrom;
use s2n_codec::DecoderBuffer;

impl Inner {
    pub(crate) fn process_datagram(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut offset = 0;
        while offset < data.len() {
            match self.process_packet(&data[offset..])? {
                Some(consumed) if consumed > 0 => offset += consumed,
                _ => break,
            }
        }
        Ok(())
    }

    /// Processes the packet at the head of `data`, returning how many
    /// bytes it occupied, or `None` to discard the rest of the datagram
    fn process_packet(&mut self, data: &[u8]) -> Result<Option<usize>, TransportError> {
        let first = data[0];

        if !packet::is_long_header(first) {
            // trailing padding and stray bytes fail the fixed bit
            if first & packet::FIXED_BIT != packet::FIXED_BIT {
                return Ok(None);
            }
            let pn_offset = 1 + id::LOCAL_LEN;
            self.process_protected(data, Epoch::OneRtt, pn_offset, data.len())?;
            return Ok(None);
        }

        if data.len() < 7 {
            return Ok(None);
        }
        let version = Version::new(u32::from_be_bytes([data[1], data[2], data[3], data[4]]));

        if version == Version::NEGOTIATION {
            self.handle_version_negotiation(data);
            return Ok(None);
        }

        let packet_type = LongType::from_first_byte(first);
        if packet_type == LongType::Retry {
            self.handle_retry(data);
            return Ok(None);
        }

        // walk the header up to the packet number
        let buffer = DecoderBuffer::new(&data[5..]);
        let Ok((cid_lens, buffer)) = buffer.decode::<u8>() else {
            return Ok(None);
        };
        let Ok((dcid, buffer)) = buffer.decode_slice(id::decode_cid_len(cid_lens >> 4)) else {
            return Ok(None);
        };
        let Ok((scid, buffer)) = buffer.decode_slice(id::decode_cid_len(cid_lens & 0x0f)) else {
            return Ok(None);
        };
        let dcid: &[u8] = dcid.into_less_safe_slice();
        let scid: &[u8] = scid.into_less_safe_slice();

        let buffer = if packet_type == LongType::Initial {
            // tokens are opaque here; validation policy is out of scope
            match buffer.decode_slice_with_len_prefix::<VarInt>() {
                Ok((_token, rest)) => rest,
                Err(_) => return Ok(None),
            }
        } else {
            buffer
        };

        let Ok((length, buffer)) = buffer.decode::<VarInt>() else {
            return Ok(None);
        };
        let pn_offset = data.len() - buffer.len();
        let length = length.as_u64() as usize;
        let end = pn_offset + length;
        if length < 2 || end > data.len() {
            return Ok(None);
        }

        if packet_type == LongType::ZeroRtt {
            tracing::trace!("0-RTT packet skipped");
            return Ok(Some(end));
        }

        if self.endpoint_type.is_server() && self.tls.is_none() {
            // the first client Initial names the version and the keys
            if !self.supported_versions.contains(&version) {
                tracing::debug!(?version, "unsupported version; datagram dropped");
                return Ok(None);
            }
            self.version = version;
            if let Ok(peer) = ConnectionId::try_from(scid) {
                self.peer_cid = peer;
                self.peer_cid_set = true;
            }
            self.initialize(dcid)?;
        } else {
            if version != self.version {
                return Ok(Some(end));
            }
            if self.endpoint_type.is_client() && !self.peer_cid_set {
                if let Ok(peer) = ConnectionId::try_from(scid) {
                    self.peer_cid = peer;
                    self.peer_cid_set = true;
                }
            }
        }

        if matches!(self.state, State::Firstflight | State::Negotiating) {
            self.state = State::Handshaking;
        }

        let epoch = match packet_type {
            LongType::Initial => Epoch::Initial,
            _ => Epoch::Handshake,
        };
        self.process_protected(data, epoch, pn_offset, end)?;
        Ok(Some(end))
    }

    /// Unprotects and decrypts one packet, then dispatches its frames.
    ///
    /// Missing keys, header protection failures, and AEAD failures all
    /// drop the packet silently.
    fn process_protected(
        &mut self,
        data: &[u8],
        epoch: Epoch,
        pn_offset: usize,
        end: usize,
    ) -> Result<(), TransportError> {
        let Some(packet) = data.get(..end) else {
            return Ok(());
        };
        let mut packet = packet.to_vec();

        let space = &mut self.spaces[epoch.as_index()];
        let Some(open) = space.recv_key.as_ref() else {
            tracing::trace!(?epoch, "no receive key; packet dropped");
            return Ok(());
        };

        let sample_start = pn_offset + 4;
        let sample_len = open.sample_len();
        if sample_start + sample_len > packet.len() {
            return Ok(());
        }
        let sample = packet[sample_start..sample_start + sample_len].to_vec();

        {
            let (front, _) = packet.split_at_mut(sample_start);
            let (head, pn_bytes) = front.split_at_mut(pn_offset);
            if open
                .unprotect_header(&sample, &mut head[0], pn_bytes)
                .is_err()
            {
                tracing::trace!(?epoch, "header protection failure; packet dropped");
                return Ok(());
            }
        }

        let pn_len = (packet[0] & 0x03) as usize + 1;
        let mut truncated = 0u64;
        for byte in &packet[pn_offset..pn_offset + pn_len] {
            truncated = (truncated << 8) | *byte as u64;
        }
        let packet_number = number::expand(truncated, pn_len, space.largest_seen);

        let header_len = pn_offset + pn_len;
        let (aad, payload) = packet.split_at_mut(header_len);
        let plaintext = match open.open_in_place(packet_number, aad, payload) {
            Ok(plaintext) => plaintext.to_vec(),
            Err(_) => {
                tracing::debug!(?epoch, packet_number, "AEAD failure; packet dropped");
                return Ok(());
            }
        };

        self.on_packet(epoch, packet_number, &plaintext)
    }

    /// Dispatches the frames of a decrypted packet in wire order
    fn on_packet(
        &mut self,
        epoch: Epoch,
        packet_number: u64,
        plaintext: &[u8],
    ) -> Result<(), TransportError> {
        tracing::trace!(?epoch, packet_number, len = plaintext.len(), "packet received");

        let mut buffer = DecoderBuffer::new(plaintext);
        let mut ack_eliciting = false;

        while !buffer.is_empty() {
            let tag = buffer.peek_byte(0)?;

            if tag > frame::MAX_KNOWN_TAG {
                let (frame_type, rest) = buffer.decode::<VarInt>()?;
                if rest.is_empty() && !self.config.strict_frames {
                    // a trailing unknown frame with no body is tolerated
                    tracing::debug!(
                        frame_type = frame_type.as_u64(),
                        "ignoring empty unknown frame"
                    );
                    break;
                }
                return Err(TransportError::PROTOCOL_VIOLATION
                    .with_reason("unknown frame type")
                    .with_frame_type(frame_type));
            }

            let (frame, rest) = Frame::decode(buffer)?;
            buffer = rest;
            ack_eliciting |= frame.is_ack_eliciting();
            self.handle_frame(epoch, frame)?;
        }

        self.spaces[epoch.as_index()].on_packet_received(packet_number, ack_eliciting);
        Ok(())
    }

    /// Version Negotiation is honored only before anything else arrives
    fn handle_version_negotiation(&mut self, data: &[u8]) {
        if !self.endpoint_type.is_client() || self.state != State::Firstflight {
            tracing::trace!("version negotiation ignored");
            return;
        }

        let Ok((packet, _)) = VersionNegotiation::decode(DecoderBuffer::new(&data[5..])) else {
            return;
        };

        self.state = State::Negotiating;

        let chosen = self
            .supported_versions
            .iter()
            .copied()
            .filter(|version| packet.supported_versions.contains(version))
            .max_by_key(|version| Version::as_u32(*version));

        match chosen {
            Some(version) => {
                tracing::debug!(?version, "version negotiated; resending Initial");
                self.version = version;
                let dcid = self.peer_cid.as_bytes().to_vec();
                if let Err(error) = self.initialize(&dcid) {
                    tracing::error!(%error, "re-initialization failed");
                }
            }
            None => {
                tracing::warn!("no common version; connection goes silent");
            }
        }
    }

    /// A Retry replaces the destination connection id and re-derives the
    /// Initial keys before the first flight is re-emitted with the token
    fn handle_retry(&mut self, data: &[u8]) {
        if !self.endpoint_type.is_client()
            || self.retry_accepted
            || self.state != State::Firstflight
        {
            tracing::trace!("retry ignored");
            return;
        }

        let Ok((retry, _)) = Retry::decode(data[0], DecoderBuffer::new(&data[1..])) else {
            return;
        };

        if retry.version != self.version
            || retry.dcid != self.host_cid.as_bytes()
            || retry.odcid != self.peer_cid.as_bytes()
        {
            tracing::debug!("retry does not match this connection; dropped");
            return;
        }

        let Ok(new_peer) = ConnectionId::try_from(retry.scid) else {
            return;
        };

        self.retry_accepted = true;
        self.peer_token = retry.token.to_vec();
        self.peer_cid = new_peer;

        let dcid = new_peer.as_bytes().to_vec();
        if let Err(error) = self.initialize(&dcid) {
            tracing::error!(%error, "re-initialization after retry failed");
        }
    }
}
