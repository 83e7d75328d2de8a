// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Datagram assembly.
//!
//! A build pass walks the epochs in coalescing order, packs what each
//! packet-number space has to say into encrypted packets, and hands
//! MTU-bounded datagrams to the transport. Frame priority within a
//! packet: ACK, CRYPTO, queued control frames, path frames, then stream
//! data round-robin.

use super::{Inner, State};
use cinder_quic_core::{
    epoch::Epoch,
    frame,
    packet::{long, short, LongType},
    varint::VarInt,
};
use s2n_codec::{Encoder, EncoderBuffer, EncoderValue};

/// Datagrams stay within this bound until the handshake completes, and
/// client datagrams carrying Initial packets are padded up to it
pub(crate) const HANDSHAKE_DATAGRAM_CAP: usize = 1200;

/// Largest datagram we will produce once the peer's limit is known
const DATAGRAM_CAP: usize = 1452;

/// Sealed payloads must be long enough for header protection sampling
const MIN_PLAINTEXT_LEN: usize = 3;

impl Inner {
    /// Runs one build pass; zero or more datagrams leave the transport
    pub(crate) fn send_pending(&mut self) {
        if self.transport.is_none()
            || matches!(
                self.state,
                State::Closing | State::Draining | State::Terminated
            )
        {
            return;
        }

        let capacity = self.datagram_capacity();
        let mut datagrams: Vec<(Vec<u8>, bool)> = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        let mut has_initial = false;

        for epoch in Epoch::ALL {
            loop {
                if self.spaces[epoch.as_index()].send_key.is_none() {
                    break;
                }
                if !self.epoch_has_data(epoch) {
                    break;
                }

                let remaining = capacity - current.len();
                match self.build_packet(epoch, remaining) {
                    Some(packet) => {
                        current.extend_from_slice(&packet);
                        has_initial |= epoch == Epoch::Initial;
                    }
                    None if current.is_empty() => break,
                    None => {
                        datagrams.push((core::mem::take(&mut current), has_initial));
                        has_initial = false;
                    }
                }
            }
        }

        if !current.is_empty() {
            datagrams.push((current, has_initial));
        }

        for (mut datagram, carries_initial) in datagrams {
            //= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-14
            //# A client MUST expand the payload of all UDP datagrams carrying
            //# Initial packets to at least 1200 bytes
            if carries_initial
                && self.endpoint_type.is_client()
                && datagram.len() < HANDSHAKE_DATAGRAM_CAP
            {
                datagram.resize(HANDSHAKE_DATAGRAM_CAP, 0);
            }
            self.transmit(&datagram);
        }
    }

    /// Emits the single CONNECTION_CLOSE datagram for a close, using the
    /// highest epoch with installed send keys
    pub(crate) fn send_close_datagram(&mut self, frame_bytes: &[u8]) {
        let epoch = [Epoch::OneRtt, Epoch::Handshake, Epoch::Initial]
            .into_iter()
            .find(|epoch| self.spaces[epoch.as_index()].send_key.is_some());
        let Some(epoch) = epoch else {
            return;
        };

        if let Some(mut datagram) = self.seal_packet(epoch, frame_bytes.to_vec()) {
            if epoch == Epoch::Initial
                && self.endpoint_type.is_client()
                && datagram.len() < HANDSHAKE_DATAGRAM_CAP
            {
                datagram.resize(HANDSHAKE_DATAGRAM_CAP, 0);
            }
            self.transmit(&datagram);
        }
    }

    fn transmit(&self, data: &[u8]) {
        if let Some(transport) = &self.transport {
            tracing::trace!(len = data.len(), "datagram sent");
            transport.send_to(data);
        }
    }

    fn datagram_capacity(&self) -> usize {
        if self.state == State::Connected {
            self.remote_params.map_or(HANDSHAKE_DATAGRAM_CAP, |p| {
                (p.max_packet_size.as_u64() as usize).clamp(HANDSHAKE_DATAGRAM_CAP, DATAGRAM_CAP)
            })
        } else {
            HANDSHAKE_DATAGRAM_CAP
        }
    }

    fn connection_send_allowance(&self) -> u64 {
        self.remote_max_data.saturating_sub(self.data_sent)
    }

    fn epoch_has_data(&self, epoch: Epoch) -> bool {
        let space = &self.spaces[epoch.as_index()];
        if space.ack_pending || space.has_crypto_to_send() {
            return true;
        }

        if epoch == Epoch::OneRtt {
            if !self.pending_control.is_empty()
                || self.response_pending.is_some()
                || self.challenge_pending.is_some()
            {
                return true;
            }
            let connection_allowance = self.connection_send_allowance();
            return self.streams.values().any(|stream| {
                if stream.reset_sent.is_some() || stream.fin_sent {
                    return false;
                }
                let sendable = (stream.send_buffer.len() as u64)
                    .min(stream.send_allowance())
                    .min(connection_allowance);
                sendable > 0 || (stream.fin_pending && stream.send_buffer.is_empty())
            });
        }

        false
    }

    /// Builds one sealed packet for `epoch` within `capacity` bytes, or
    /// `None` when nothing (more) fits
    fn build_packet(&mut self, epoch: Epoch, capacity: usize) -> Option<Vec<u8>> {
        let index = epoch.as_index();
        let tag_len = self.spaces[index].send_key.as_ref()?.tag_len();

        let token_len = if epoch == Epoch::Initial && self.endpoint_type.is_client() {
            self.peer_token.len()
        } else {
            0
        };
        let header_overhead = match epoch {
            Epoch::Initial => {
                let token_prefix = VarInt::try_from(token_len).ok()?.encoded_size();
                1 + 4 + 1
                    + self.peer_cid.len()
                    + self.host_cid.len()
                    + token_prefix
                    + token_len
                    + 2
                    + 2
            }
            Epoch::Handshake => 1 + 4 + 1 + self.peer_cid.len() + self.host_cid.len() + 2 + 2,
            Epoch::OneRtt => 1 + self.peer_cid.len() + 2,
        };

        let max_plaintext = capacity.checked_sub(header_overhead + tag_len)?;
        if max_plaintext < MIN_PLAINTEXT_LEN {
            return None;
        }

        let mut scratch = vec![0u8; max_plaintext];
        let mut encoder = EncoderBuffer::new(&mut scratch);
        let mut ack_eliciting = false;

        // 1. acknowledgements
        {
            let space = &mut self.spaces[index];
            if space.ack_pending {
                if let Some(ack) = frame::Ack::from_ack_ranges(&space.ack_queue, VarInt::ZERO) {
                    if ack.encoding_size() <= encoder.remaining_capacity() {
                        encoder.encode(&ack);
                        space.ack_pending = false;
                    }
                }
            }
        }

        // 2. crypto stream
        loop {
            let space = &mut self.spaces[index];
            if space.crypto_send.is_empty() {
                break;
            }
            let offset = VarInt::new(space.crypto_send_offset).ok()?;
            let overhead = 1 + offset.encoded_size() + 4;
            let room = encoder.remaining_capacity();
            if room <= overhead {
                break;
            }
            let chunk_len = (room - overhead).min(space.crypto_send.len());
            let chunk: Vec<u8> = space.crypto_send.drain(..chunk_len).collect();
            encoder.encode(&frame::Crypto {
                offset,
                data: &chunk,
            });
            space.crypto_send_offset += chunk_len as u64;
            ack_eliciting = true;
        }

        // 3. application frames only travel in 1-RTT packets
        if epoch == Epoch::OneRtt {
            while let Some(front_len) = self.pending_control.front().map(bytes::Bytes::len) {
                if front_len > encoder.remaining_capacity() {
                    break;
                }
                if let Some(frame_bytes) = self.pending_control.pop_front() {
                    encoder.write_slice(&frame_bytes);
                    ack_eliciting = true;
                }
            }

            if let Some(token) = self.response_pending {
                let response = frame::PathResponse { data: &token };
                if response.encoding_size() <= encoder.remaining_capacity() {
                    encoder.encode(&response);
                    self.response_pending = None;
                    ack_eliciting = true;
                }
            }

            if let Some(token) = self.challenge_pending {
                let challenge = frame::PathChallenge { data: &token };
                if challenge.encoding_size() <= encoder.remaining_capacity() {
                    encoder.encode(&challenge);
                    self.challenge_pending = None;
                    self.challenges_sent.push(token);
                    ack_eliciting = true;
                }
            }

            ack_eliciting |= self.write_stream_frames(&mut encoder);
        }

        if encoder.is_empty() {
            return None;
        }

        let payload_len = encoder.len();
        drop(encoder);
        scratch.truncate(payload_len);

        let packet_number = self.spaces[index].next_packet_number;
        let packet = self.seal_packet(epoch, scratch)?;
        if ack_eliciting {
            self.ack_eliciting_in_flight.insert((index, packet_number));
        }
        Some(packet)
    }

    /// Round-robin across streams with send credit; returns whether any
    /// frame was written
    fn write_stream_frames(&mut self, encoder: &mut EncoderBuffer) -> bool {
        let mut wrote = false;
        let ids: Vec<u64> = self.streams.keys().copied().collect();
        if ids.is_empty() {
            return false;
        }

        let pivot = ids
            .iter()
            .position(|id| *id >= self.stream_send_cursor)
            .unwrap_or(0);
        let order: Vec<u64> = ids[pivot..]
            .iter()
            .chain(ids[..pivot].iter())
            .copied()
            .collect();

        for id in order {
            let connection_allowance = self.connection_send_allowance();
            let Some(stream) = self.streams.get_mut(&id) else {
                continue;
            };
            if stream.reset_sent.is_some() || stream.fin_sent {
                continue;
            }

            let allowance = (stream.send_buffer.len() as u64)
                .min(stream.send_allowance())
                .min(connection_allowance) as usize;
            let bare_fin = stream.fin_pending && stream.send_buffer.is_empty();
            if allowance == 0 && !bare_fin {
                continue;
            }

            let stream_id = stream.id.as_varint();
            let offset = stream.send_offset;
            let offset_size = if offset > 0 {
                VarInt::new(offset).map(VarInt::encoded_size).unwrap_or(8)
            } else {
                0
            };
            let overhead = 1 + stream_id.encoded_size() + offset_size + 4;
            let room = encoder.remaining_capacity();
            if room <= overhead {
                continue;
            }

            let chunk_len = (room - overhead).min(allowance);
            if chunk_len == 0 && !bare_fin {
                continue;
            }

            let chunk: Vec<u8> = stream.send_buffer.drain(..chunk_len).collect();
            let is_fin = stream.fin_pending && stream.send_buffer.is_empty();
            encoder.encode(&frame::Stream {
                stream_id,
                offset: VarInt::new(offset).unwrap_or(VarInt::MAX),
                is_last_frame: false,
                is_fin,
                data: &chunk,
            });

            stream.send_offset += chunk_len as u64;
            if is_fin {
                stream.fin_sent = true;
                stream.fin_pending = false;
            }
            stream.wake_writer();
            self.data_sent += chunk_len as u64;
            self.stream_send_cursor = id + 1;
            wrote = true;
        }

        wrote
    }

    /// Seals `payload` into a finished packet: header, AEAD, and header
    /// protection; assigns the packet number by post-increment
    fn seal_packet(&mut self, epoch: Epoch, mut payload: Vec<u8>) -> Option<Vec<u8>> {
        if payload.len() < MIN_PLAINTEXT_LEN {
            // pad at the front so the payload's last frame stays last
            let mut padded = vec![0u8; MIN_PLAINTEXT_LEN - payload.len()];
            padded.extend_from_slice(&payload);
            payload = padded;
        }

        let index = epoch.as_index();
        let token = if epoch == Epoch::Initial && self.endpoint_type.is_client() {
            self.peer_token.clone()
        } else {
            Vec::new()
        };

        let space = &mut self.spaces[index];
        let packet_number = space.allocate_packet_number();
        let seal = space.send_key.as_ref()?;
        let tag_len = seal.tag_len();

        let mut header_scratch = vec![0u8; 64 + token.len()];
        let mut header = EncoderBuffer::new(&mut header_scratch);
        match epoch {
            Epoch::Initial => long::encode(
                &mut header,
                LongType::Initial,
                self.version,
                self.peer_cid.as_bytes(),
                self.host_cid.as_bytes(),
                &token,
                payload.len() + tag_len,
                packet_number,
            ),
            Epoch::Handshake => long::encode(
                &mut header,
                LongType::Handshake,
                self.version,
                self.peer_cid.as_bytes(),
                self.host_cid.as_bytes(),
                &[],
                payload.len() + tag_len,
                packet_number,
            ),
            Epoch::OneRtt => {
                short::encode(&mut header, self.peer_cid.as_bytes(), packet_number)
            }
        }
        let header_len = header.len();
        drop(header);
        header_scratch.truncate(header_len);

        seal.seal_in_place(packet_number, &header_scratch, &mut payload)
            .ok()?;

        let mut packet = header_scratch;
        packet.extend_from_slice(&payload);

        let pn_offset = header_len - 2;
        let sample_start = pn_offset + 4;
        let sample = packet[sample_start..sample_start + seal.sample_len()].to_vec();
        let (front, _) = packet.split_at_mut(sample_start);
        let (head, pn_bytes) = front.split_at_mut(pn_offset);
        seal.protect_header(&sample, &mut head[0], pn_bytes).ok()?;

        Some(packet)
    }
}
