// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The connection state machine.
//!
//! One [`Connection`] owns three packet-number spaces, the stream arena,
//! the TLS session, and the queues the packet builder drains. Everything
//! runs on a single logical execution context; the only suspension
//! points live in the stream read and drain futures.

mod packet_builder;
mod packet_parser;
#[cfg(test)]
mod tests;

use crate::{
    config::ConnectionConfig,
    space::PacketNumberSpace,
    stream::{StreamReader, StreamState, StreamWriter, HIGH_WATER},
    tls,
};
use cinder_quic_core::{
    connection::ConnectionId,
    endpoint,
    epoch::Epoch,
    frame::{self, Frame},
    stream::{StreamId, StreamType},
    transport::{parameters::TransportParameters, TransportError},
    varint::VarInt,
    version::Version,
};
use core::task::{Context, Poll};
use std::{
    cell::RefCell,
    collections::{BTreeSet, VecDeque},
    io,
    net::SocketAddr,
    rc::Rc,
};

/// The outbound half of the datagram socket the connection writes to.
///
/// Implementations must not call back into the connection synchronously.
pub trait DatagramTransport {
    /// Sends one UDP datagram
    fn send_to(&self, data: &[u8]);
}

/// Connection lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing from the peer yet; Version Negotiation is still honored
    Firstflight,
    /// A Version Negotiation packet arrived
    Negotiating,
    Handshaking,
    Connected,
    /// CONNECTION_CLOSE sent, waiting for the peer's
    Closing,
    /// CONNECTION_CLOSE received; nothing more is sent
    Draining,
    Terminated,
}

pub(crate) type Handle = Rc<RefCell<Inner>>;

/// A QUIC connection endpoint.
///
/// The handle is shared with stream readers and writers; all methods
/// take `&self` and serialize through the interior state.
pub struct Connection {
    pub(crate) inner: Handle,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(config))),
        }
    }

    /// Binds the outbound datagram sink.
    ///
    /// A client emits its Initial flight here: exactly one datagram
    /// carrying the ClientHello, padded to 1200 bytes.
    pub fn connection_made(&self, transport: Rc<dyn DatagramTransport>) {
        self.inner.borrow_mut().connection_made(transport);
    }

    /// Feeds one received datagram, which may hold several coalesced
    /// packets, and runs the resulting build passes
    pub fn datagram_received(&self, data: &[u8], addr: Option<SocketAddr>) {
        let _ = addr;
        self.inner.borrow_mut().on_datagram(data);
    }

    /// Opens a locally-initiated stream, if the peer's stream credit
    /// allows another one
    pub fn create_stream(
        &self,
        is_unidirectional: bool,
    ) -> Result<(StreamReader, StreamWriter), TransportError> {
        let id = self.inner.borrow_mut().create_stream(is_unidirectional)?;
        Ok((
            StreamReader {
                conn: self.inner.clone(),
                id,
            },
            StreamWriter {
                conn: self.inner.clone(),
                id,
            },
        ))
    }

    /// Closes the connection, emitting exactly one CONNECTION_CLOSE
    /// datagram in the highest epoch with installed keys
    pub fn close(&self, error_code: u64, frame_type: Option<u64>, reason_phrase: &str) {
        self.inner
            .borrow_mut()
            .close(error_code, frame_type, reason_phrase);
    }

    /// Records a transport-level failure for observation; never fails
    pub fn error_received(&self, error: io::Error) {
        self.inner.borrow_mut().error_received(error);
    }

    /// Originates a PATH_CHALLENGE with a random token
    pub fn send_path_challenge(&self) {
        self.inner.borrow_mut().send_path_challenge();
    }

    /// Releases the connection once draining is done
    pub fn shutdown(&self) {
        self.inner.borrow_mut().state = State::Terminated;
    }

    pub fn state(&self) -> State {
        self.inner.borrow().state
    }

    pub fn is_established(&self) -> bool {
        self.state() == State::Connected
    }

    #[cfg(test)]
    pub(crate) fn send_pending(&self) {
        self.inner.borrow_mut().send_pending();
    }
}

/// A connection id issued to the peer by this endpoint
pub(crate) struct IssuedConnectionId {
    pub sequence: u64,
    #[allow(dead_code)]
    pub cid: ConnectionId,
}

/// A connection id the peer issued through NEW_CONNECTION_ID
pub(crate) struct PeerConnectionId {
    pub sequence: u64,
    pub cid: Vec<u8>,
    pub stateless_reset_token: [u8; 16],
}

pub(crate) struct Inner {
    pub config: ConnectionConfig,
    pub endpoint_type: endpoint::Type,
    pub state: State,

    pub version: Version,
    pub supported_versions: Vec<Version>,

    pub host_cid: ConnectionId,
    pub peer_cid: ConnectionId,
    pub peer_cid_set: bool,
    pub retry_accepted: bool,

    /// Token to echo in Initial packets, from Retry or NEW_TOKEN
    pub peer_token: Vec<u8>,

    pub tls: Option<tls::Session>,
    pub secrets_sink: Option<Box<dyn io::Write + Send>>,

    pub spaces: [PacketNumberSpace; 3],

    pub streams: std::collections::BTreeMap<u64, StreamState>,
    pub next_ordinal_bidi: u64,
    pub next_ordinal_uni: u64,
    pub stream_send_cursor: u64,

    // connection-level flow control
    pub local_max_data: u64,
    pub local_max_stream_data: u64,
    pub local_max_streams_bidi: u64,
    pub local_max_streams_uni: u64,
    pub remote_max_data: u64,
    pub remote_max_streams_bidi: u64,
    pub remote_max_streams_uni: u64,
    pub data_received: u64,
    pub data_sent: u64,

    /// Raw frame payloads the handler layer queues for the builder
    pub pending_control: VecDeque<bytes::Bytes>,

    /// (epoch index, packet number) of unacknowledged eliciting packets
    pub ack_eliciting_in_flight: BTreeSet<(usize, u64)>,

    pub challenge_pending: Option<[u8; 8]>,
    pub challenges_sent: Vec<[u8; 8]>,
    pub response_pending: Option<[u8; 8]>,

    pub issued_cids: Vec<IssuedConnectionId>,
    pub local_cid_seq: u64,
    pub peer_cids: Vec<PeerConnectionId>,

    pub remote_params: Option<TransportParameters>,

    pub transport: Option<Rc<dyn DatagramTransport>>,
    pub newly_connected: bool,
    pub transport_error_count: u64,
}

impl Inner {
    fn new(mut config: ConnectionConfig) -> Self {
        let secrets_sink = config.secrets_log.take();
        let endpoint_type = config.endpoint_type;
        let version = config.version;
        let supported_versions = config.supported_versions.clone();

        Self {
            config,
            endpoint_type,
            state: State::Firstflight,
            version,
            supported_versions,
            host_cid: ConnectionId::from(rand::random::<[u8; 8]>()),
            peer_cid: ConnectionId::EMPTY,
            peer_cid_set: false,
            retry_accepted: false,
            peer_token: Vec::new(),
            tls: None,
            secrets_sink,
            spaces: [
                PacketNumberSpace::new(),
                PacketNumberSpace::new(),
                PacketNumberSpace::new(),
            ],
            streams: Default::default(),
            next_ordinal_bidi: 0,
            next_ordinal_uni: 0,
            stream_send_cursor: 0,
            local_max_data: 1_048_576,
            local_max_stream_data: 1_048_576,
            local_max_streams_bidi: 100,
            local_max_streams_uni: 0,
            remote_max_data: 0,
            // optimistic until the peer's transport parameters arrive,
            // so speculative stream creation works before the handshake
            remote_max_streams_bidi: 100,
            remote_max_streams_uni: 100,
            data_received: 0,
            data_sent: 0,
            pending_control: VecDeque::new(),
            ack_eliciting_in_flight: BTreeSet::new(),
            challenge_pending: None,
            challenges_sent: Vec::new(),
            response_pending: None,
            issued_cids: Vec::new(),
            local_cid_seq: 1,
            peer_cids: Vec::new(),
            remote_params: None,
            transport: None,
            newly_connected: false,
            transport_error_count: 0,
        }
    }

    fn connection_made(&mut self, transport: Rc<dyn DatagramTransport>) {
        self.transport = Some(transport);

        if self.endpoint_type.is_client() {
            let dcid = rand::random::<[u8; 8]>();
            self.peer_cid = ConnectionId::from(dcid);
            if let Err(error) = self.initialize(&dcid) {
                tracing::error!(%error, "client initialization failed");
                return;
            }
            self.send_pending();
        }
    }

    fn on_datagram(&mut self, data: &[u8]) {
        if matches!(self.state, State::Draining | State::Terminated) {
            tracing::trace!(len = data.len(), "datagram ignored while draining");
            return;
        }

        if let Err(error) = self.process_datagram(data) {
            tracing::debug!(%error, "closing on protocol error");
            self.close_on_error(error);
            return;
        }

        if matches!(self.state, State::Closing | State::Draining) {
            return;
        }

        self.send_pending();

        if self.newly_connected {
            self.newly_connected = false;
            self.queue_post_handshake();
            self.send_pending();
        }
    }

    /// Re-derives keys and restarts the handshake, keeping packet number
    /// counters; used at first flight, after Retry, and after version
    /// negotiation
    pub(crate) fn initialize(&mut self, dcid: &[u8]) -> Result<(), TransportError> {
        self.spaces = [
            self.spaces[0].reset_keeping_packet_numbers(),
            self.spaces[1].reset_keeping_packet_numbers(),
            self.spaces[2].reset_keeping_packet_numbers(),
        ];

        let (seal, open) =
            cinder_quic_core::crypto::initial::initial_keys(dcid, self.endpoint_type);
        self.spaces[Epoch::Initial.as_index()].send_key = Some(Box::new(seal));
        self.spaces[Epoch::Initial.as_index()].recv_key = Some(Box::new(open));

        let params = self.local_transport_parameters().encode_to_vec();
        let session = match self.endpoint_type {
            endpoint::Type::Client => tls::Session::new_client(&self.config, self.version, params),
            endpoint::Type::Server => tls::Session::new_server(&self.config, self.version, params),
        }?;
        self.tls = Some(session);

        // a client's session immediately produces the ClientHello
        self.apply_tls_events()
    }

    fn local_transport_parameters(&self) -> TransportParameters {
        TransportParameters {
            initial_max_data: VarInt::new(self.local_max_data).unwrap_or(VarInt::MAX),
            initial_max_stream_data: VarInt::new(self.local_max_stream_data)
                .unwrap_or(VarInt::MAX),
            initial_max_streams_bidi: VarInt::new(self.local_max_streams_bidi)
                .unwrap_or(VarInt::MAX),
            initial_max_streams_uni: VarInt::new(self.local_max_streams_uni)
                .unwrap_or(VarInt::MAX),
            ..Default::default()
        }
    }

    pub(crate) fn apply_tls_events(&mut self) -> Result<(), TransportError> {
        let events = match self.tls.as_mut() {
            Some(tls) => tls.events(),
            None => return Ok(()),
        };

        for event in events {
            match event {
                tls::Event::Transmit { epoch, data } => {
                    self.spaces[epoch.as_index()].queue_crypto(&data);
                }
                tls::Event::Keys { epoch, keys } => {
                    let (seal, open) = tls::split_keys(keys);
                    let space = &mut self.spaces[epoch.as_index()];
                    space.send_key = Some(Box::new(seal));
                    space.recv_key = Some(Box::new(open));
                    tracing::trace!(?epoch, "keys installed");
                }
                tls::Event::HandshakeComplete => self.on_handshake_complete()?,
            }
        }

        Ok(())
    }

    fn on_handshake_complete(&mut self) -> Result<(), TransportError> {
        if matches!(
            self.state,
            State::Firstflight | State::Negotiating | State::Handshaking
        ) {
            self.state = State::Connected;
        }
        self.newly_connected = true;

        let raw = self
            .tls
            .as_ref()
            .and_then(tls::Session::peer_transport_parameters);
        if let Some(raw) = raw {
            let params = TransportParameters::decode_from_slice(&raw)?;
            self.apply_remote_parameters(params);
        }

        if let (Some(tls), Some(sink)) = (self.tls.as_ref(), self.secrets_sink.as_mut()) {
            tls.flush_secrets(sink.as_mut());
        }

        tracing::debug!(
            role = tls::local_endpoint_label(self.endpoint_type),
            version = ?self.version,
            "handshake complete"
        );
        Ok(())
    }

    /// Remote limits only move up; the peer's parameters are one more
    /// monotone input alongside MAX_DATA and MAX_STREAMS
    fn apply_remote_parameters(&mut self, params: TransportParameters) {
        self.remote_max_data = self.remote_max_data.max(params.initial_max_data.as_u64());
        self.remote_max_streams_bidi = self
            .remote_max_streams_bidi
            .max(params.initial_max_streams_bidi.as_u64());
        self.remote_max_streams_uni = self
            .remote_max_streams_uni
            .max(params.initial_max_streams_uni.as_u64());

        let stream_limit = params.initial_max_stream_data.as_u64();
        for stream in self.streams.values_mut() {
            stream.max_data_remote = stream.max_data_remote.max(stream_limit);
        }

        self.remote_params = Some(params);
    }

    /// Issues an alternate connection id in its own datagram once the
    /// handshake completes
    fn queue_post_handshake(&mut self) {
        let sequence = self.local_cid_seq;
        self.local_cid_seq += 1;

        let cid: [u8; 8] = rand::random();
        let token: [u8; 16] = rand::random();
        self.issued_cids.push(IssuedConnectionId {
            sequence,
            cid: ConnectionId::from(cid),
        });

        let frame = frame::NewConnectionId {
            sequence_number: VarInt::new(sequence).unwrap_or(VarInt::MAX),
            retire_prior_to: VarInt::ZERO,
            connection_id: &cid,
            stateless_reset_token: &token,
        };
        self.pending_control.push_back(encode_frame(&frame).into());
    }

    pub(crate) fn create_stream(
        &mut self,
        is_unidirectional: bool,
    ) -> Result<u64, TransportError> {
        let stream_type = if is_unidirectional {
            StreamType::Unidirectional
        } else {
            StreamType::Bidirectional
        };

        let limit = match stream_type {
            StreamType::Bidirectional => self.remote_max_streams_bidi,
            StreamType::Unidirectional => self.remote_max_streams_uni,
        };
        let ordinal = match stream_type {
            StreamType::Bidirectional => &mut self.next_ordinal_bidi,
            StreamType::Unidirectional => &mut self.next_ordinal_uni,
        };

        if *ordinal >= limit {
            return Err(TransportError::STREAM_LIMIT_ERROR
                .with_reason("peer stream credit exhausted"));
        }

        let id = StreamId::nth(self.endpoint_type, stream_type, *ordinal)
            .ok_or_else(|| TransportError::INTERNAL_ERROR.with_reason("stream id overflow"))?;
        *ordinal += 1;

        let remote_limit = self
            .remote_params
            .map_or(0, |p| p.initial_max_stream_data.as_u64());
        self.streams.insert(
            id.as_u64(),
            StreamState::new(id, self.local_max_stream_data, remote_limit),
        );

        tracing::trace!(stream_id = id.as_u64(), "stream created");
        Ok(id.as_u64())
    }

    fn get_or_create_stream(
        &mut self,
        id: StreamId,
    ) -> Result<&mut StreamState, TransportError> {
        let key = id.as_u64();

        if !self.streams.contains_key(&key) && id.initiator() != self.endpoint_type {
            let ordinal = key >> 2;
            let limit = match id.stream_type() {
                StreamType::Bidirectional => self.local_max_streams_bidi,
                StreamType::Unidirectional => self.local_max_streams_uni,
            };
            if ordinal >= limit {
                return Err(TransportError::STREAM_LIMIT_ERROR
                    .with_reason("peer exceeded the stream limit"));
            }
        }

        let local_limit = self.local_max_stream_data;
        let remote_limit = self
            .remote_params
            .map_or(0, |p| p.initial_max_stream_data.as_u64());
        Ok(self
            .streams
            .entry(key)
            .or_insert_with(|| StreamState::new(id, local_limit, remote_limit)))
    }

    // === frame dispatch =================================================

    pub(crate) fn handle_frame(
        &mut self,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<(), TransportError> {
        match frame {
            Frame::Padding(_) | Frame::Ping(_) => Ok(()),
            Frame::Ack(ack) => self.handle_ack(epoch, &ack),
            Frame::ResetStream(f) => self.handle_reset_stream(&f),
            Frame::StopSending(f) => self.handle_stop_sending(&f),
            Frame::Crypto(f) => self.handle_crypto(epoch, &f),
            Frame::NewToken(f) => self.handle_new_token(&f),
            Frame::Stream(f) => self.handle_stream(&f),
            Frame::MaxData(f) => self.handle_max_data(&f),
            Frame::MaxStreamData(f) => self.handle_max_stream_data(&f),
            Frame::MaxStreams(f) => self.handle_max_streams(&f),
            Frame::DataBlocked(f) => self.handle_data_blocked(&f),
            Frame::StreamDataBlocked(f) => self.handle_stream_data_blocked(&f),
            Frame::StreamsBlocked(f) => self.handle_streams_blocked(&f),
            Frame::NewConnectionId(f) => self.handle_new_connection_id(&f),
            Frame::RetireConnectionId(f) => self.handle_retire_connection_id(&f),
            Frame::PathChallenge(f) => self.handle_path_challenge(&f),
            Frame::PathResponse(f) => self.handle_path_response(&f),
            Frame::ConnectionClose(f) => self.handle_connection_close(&f),
        }
    }

    pub(crate) fn handle_ack(
        &mut self,
        epoch: Epoch,
        ack: &frame::Ack,
    ) -> Result<(), TransportError> {
        // retiring already-retired packet numbers is a no-op, so replayed
        // ACK frames have no effect
        let index = epoch.as_index();
        for range in &ack.ranges {
            self.ack_eliciting_in_flight
                .retain(|(space, pn)| *space != index || !range.contains(pn));
        }
        Ok(())
    }

    pub(crate) fn handle_crypto(
        &mut self,
        epoch: Epoch,
        frame: &frame::Crypto,
    ) -> Result<(), TransportError> {
        let space = &mut self.spaces[epoch.as_index()];
        space
            .crypto_recv
            .write_at(frame.offset.as_u64(), frame.data, false)
            .map_err(|error| error.with_frame_type(VarInt::from_u8(frame.tag())))?;

        if let Some(chunk) = space.crypto_recv.pop(None) {
            let tls = self
                .tls
                .as_mut()
                .ok_or_else(|| TransportError::INTERNAL_ERROR.with_reason("no TLS session"))?;
            tls.read(&chunk)?;
            self.apply_tls_events()?;
        }
        Ok(())
    }

    pub(crate) fn handle_stream(&mut self, frame: &frame::Stream) -> Result<(), TransportError> {
        let id = StreamId::from_varint(frame.stream_id);
        if !id.can_receive(self.endpoint_type) {
            return Err(TransportError::STREAM_STATE_ERROR
                .with_reason("Stream is send-only")
                .with_frame_type(VarInt::from_u8(frame.tag())));
        }

        let frame_type = VarInt::from_u8(frame.tag());
        let end = frame.offset.as_u64() + frame.data.len() as u64;
        let local_max_data = self.local_max_data;

        let stream = self.get_or_create_stream(id)?;
        if end > stream.max_data_local {
            return Err(TransportError::FLOW_CONTROL_ERROR
                .with_reason("stream data limit exceeded")
                .with_frame_type(frame_type));
        }

        let previous_highest = stream.recv.highest_offset();
        stream
            .recv
            .write_at(frame.offset.as_u64(), frame.data, frame.is_fin)
            .map_err(|error| error.with_frame_type(frame_type))?;
        if stream.recv.has_data() || frame.is_fin {
            stream.wake_reader();
        }

        self.data_received += end.saturating_sub(previous_highest);
        if self.data_received > local_max_data {
            return Err(TransportError::FLOW_CONTROL_ERROR
                .with_reason("connection data limit exceeded")
                .with_frame_type(frame_type));
        }
        Ok(())
    }

    pub(crate) fn handle_reset_stream(
        &mut self,
        frame: &frame::ResetStream,
    ) -> Result<(), TransportError> {
        let id = StreamId::from_varint(frame.stream_id);
        if !id.can_receive(self.endpoint_type) {
            return Err(TransportError::STREAM_STATE_ERROR
                .with_reason("Stream is send-only")
                .with_frame_type(VarInt::from_u8(frame.tag())));
        }

        let final_size = frame.final_size.as_u64();
        let frame_type = VarInt::from_u8(frame.tag());
        let stream = self.get_or_create_stream(id)?;

        if let Some(known) = stream.recv.final_size() {
            if known != final_size {
                return Err(TransportError::FINAL_SIZE_ERROR
                    .with_reason("conflicting final size")
                    .with_frame_type(frame_type));
            }
        } else if final_size < stream.recv.highest_offset() {
            return Err(TransportError::FINAL_SIZE_ERROR
                .with_reason("final size below received data")
                .with_frame_type(frame_type));
        }

        stream.reset_received = Some(frame.application_error_code);
        stream.wake_reader();
        Ok(())
    }

    pub(crate) fn handle_stop_sending(
        &mut self,
        frame: &frame::StopSending,
    ) -> Result<(), TransportError> {
        let id = StreamId::from_varint(frame.stream_id);
        if !id.can_send(self.endpoint_type) {
            return Err(TransportError::STREAM_STATE_ERROR
                .with_reason("Stream is receive-only")
                .with_frame_type(VarInt::from_u8(frame.tag())));
        }

        let stream = self.get_or_create_stream(id)?;
        stream.stop_sending_received = Some(frame.application_error_code);
        Ok(())
    }

    pub(crate) fn handle_new_token(
        &mut self,
        frame: &frame::NewToken,
    ) -> Result<(), TransportError> {
        if self.endpoint_type.is_server() {
            return Err(TransportError::PROTOCOL_VIOLATION
                .with_reason("clients must not send NEW_TOKEN")
                .with_frame_type(VarInt::from_u8(frame.tag())));
        }
        self.peer_token = frame.token.to_vec();
        Ok(())
    }

    pub(crate) fn handle_max_data(&mut self, frame: &frame::MaxData) -> Result<(), TransportError> {
        let value = frame.maximum_data.as_u64();
        if value < self.remote_max_data {
            tracing::trace!(value, "MAX_DATA below the current limit discarded");
        }
        self.remote_max_data = self.remote_max_data.max(value);
        Ok(())
    }

    pub(crate) fn handle_max_stream_data(
        &mut self,
        frame: &frame::MaxStreamData,
    ) -> Result<(), TransportError> {
        let id = StreamId::from_varint(frame.stream_id);
        if !id.can_send(self.endpoint_type) {
            return Err(TransportError::STREAM_STATE_ERROR
                .with_reason("Stream is receive-only")
                .with_frame_type(VarInt::from_u8(frame.tag())));
        }

        if let Some(stream) = self.streams.get_mut(&id.as_u64()) {
            stream.max_data_remote = stream.max_data_remote.max(frame.maximum_stream_data.as_u64());
            stream.wake_writer();
        }
        Ok(())
    }

    pub(crate) fn handle_max_streams(
        &mut self,
        frame: &frame::MaxStreams,
    ) -> Result<(), TransportError> {
        let value = frame.maximum_streams.as_u64();
        let limit = match frame.stream_type {
            StreamType::Bidirectional => &mut self.remote_max_streams_bidi,
            StreamType::Unidirectional => &mut self.remote_max_streams_uni,
        };
        if value < *limit {
            tracing::trace!(value, "MAX_STREAMS below the current limit discarded");
        }
        *limit = (*limit).max(value);
        Ok(())
    }

    pub(crate) fn handle_data_blocked(
        &mut self,
        frame: &frame::DataBlocked,
    ) -> Result<(), TransportError> {
        tracing::trace!(limit = frame.data_limit.as_u64(), "peer is data blocked");
        Ok(())
    }

    pub(crate) fn handle_stream_data_blocked(
        &mut self,
        frame: &frame::StreamDataBlocked,
    ) -> Result<(), TransportError> {
        let id = StreamId::from_varint(frame.stream_id);
        if !id.can_receive(self.endpoint_type) {
            return Err(TransportError::STREAM_STATE_ERROR
                .with_reason("Stream is send-only")
                .with_frame_type(VarInt::from_u8(frame.tag())));
        }
        tracing::trace!(
            stream_id = id.as_u64(),
            limit = frame.stream_data_limit.as_u64(),
            "peer is stream data blocked"
        );
        Ok(())
    }

    pub(crate) fn handle_streams_blocked(
        &mut self,
        frame: &frame::StreamsBlocked,
    ) -> Result<(), TransportError> {
        tracing::trace!(
            limit = frame.stream_limit.as_u64(),
            "peer is stream blocked"
        );
        Ok(())
    }

    pub(crate) fn handle_new_connection_id(
        &mut self,
        frame: &frame::NewConnectionId,
    ) -> Result<(), TransportError> {
        let retire_prior_to = frame.retire_prior_to.as_u64();
        self.peer_cids.retain(|c| c.sequence >= retire_prior_to);

        let sequence = frame.sequence_number.as_u64();
        if self.peer_cids.iter().all(|c| c.sequence != sequence) {
            self.peer_cids.push(PeerConnectionId {
                sequence,
                cid: frame.connection_id.to_vec(),
                stateless_reset_token: *frame.stateless_reset_token,
            });
        }
        Ok(())
    }

    pub(crate) fn handle_retire_connection_id(
        &mut self,
        frame: &frame::RetireConnectionId,
    ) -> Result<(), TransportError> {
        let sequence = frame.sequence_number.as_u64();
        self.issued_cids.retain(|issued| issued.sequence != sequence);
        Ok(())
    }

    pub(crate) fn handle_path_challenge(
        &mut self,
        frame: &frame::PathChallenge,
    ) -> Result<(), TransportError> {
        self.response_pending = Some(*frame.data);
        Ok(())
    }

    pub(crate) fn handle_path_response(
        &mut self,
        frame: &frame::PathResponse,
    ) -> Result<(), TransportError> {
        match self.challenges_sent.iter().position(|c| c == frame.data) {
            Some(index) => {
                self.challenges_sent.remove(index);
                Ok(())
            }
            None => Err(TransportError::PROTOCOL_VIOLATION
                .with_reason("unsolicited PATH_RESPONSE")
                .with_frame_type(VarInt::from_u8(frame.tag()))),
        }
    }

    pub(crate) fn handle_connection_close(
        &mut self,
        frame: &frame::ConnectionClose,
    ) -> Result<(), TransportError> {
        tracing::debug!(
            error_code = frame.error_code,
            "peer closed the connection"
        );

        if !matches!(
            self.state,
            State::Closing | State::Draining | State::Terminated
        ) {
            // reply with exactly one CONNECTION_CLOSE, then go silent
            let reply = frame::ConnectionClose {
                error_code: TransportError::NO_ERROR.code.as_u64() as u16,
                frame_type: None,
                reason: &[],
            };
            self.send_close_datagram(&encode_frame(&reply));
        }
        self.state = State::Draining;
        Ok(())
    }

    // === close paths ====================================================

    pub(crate) fn close(
        &mut self,
        error_code: u64,
        frame_type: Option<u64>,
        reason_phrase: &str,
    ) {
        if matches!(
            self.state,
            State::Closing | State::Draining | State::Terminated
        ) {
            return;
        }

        let frame = frame::ConnectionClose {
            error_code: error_code as u16,
            frame_type: frame_type.map(|ft| VarInt::new(ft).unwrap_or(VarInt::MAX)),
            reason: reason_phrase.as_bytes(),
        };
        self.send_close_datagram(&encode_frame(&frame));
        self.state = State::Closing;
    }

    fn close_on_error(&mut self, error: TransportError) {
        if matches!(
            self.state,
            State::Closing | State::Draining | State::Terminated
        ) {
            return;
        }

        let frame = frame::ConnectionClose {
            error_code: error.code.as_u64() as u16,
            frame_type: Some(error.frame_type.unwrap_or(VarInt::ZERO)),
            reason: error.reason.as_bytes(),
        };
        self.send_close_datagram(&encode_frame(&frame));
        self.state = State::Closing;
    }

    pub(crate) fn error_received(&mut self, error: io::Error) {
        self.transport_error_count += 1;
        tracing::warn!(%error, "transport error observed");
    }

    pub(crate) fn send_path_challenge(&mut self) {
        let token: [u8; 8] = rand::random();
        self.challenge_pending = Some(token);
        self.send_pending();
    }

    // === stream plumbing ================================================

    pub(crate) fn stream_write(&mut self, id: u64, data: &[u8]) {
        if matches!(
            self.state,
            State::Closing | State::Draining | State::Terminated
        ) {
            return;
        }
        if let Some(stream) = self.streams.get_mut(&id) {
            if stream.fin_pending || stream.fin_sent {
                tracing::debug!(stream_id = id, "write after eof ignored");
                return;
            }
            stream.send_buffer.extend_from_slice(data);
        }
        self.send_pending();
    }

    pub(crate) fn stream_write_eof(&mut self, id: u64) {
        if matches!(
            self.state,
            State::Closing | State::Draining | State::Terminated
        ) {
            return;
        }
        if let Some(stream) = self.streams.get_mut(&id) {
            if !stream.fin_sent {
                stream.fin_pending = true;
            }
        }
        self.send_pending();
    }

    pub(crate) fn poll_read_stream(
        &mut self,
        id: u64,
        max_bytes: Option<usize>,
        cx: &mut Context<'_>,
    ) -> Poll<Vec<u8>> {
        let draining = matches!(
            self.state,
            State::Closing | State::Draining | State::Terminated
        );

        let outcome = {
            let stream = match self.streams.get_mut(&id) {
                Some(stream) => stream,
                // already reclaimed; signal end of stream
                None => return Poll::Ready(Vec::new()),
            };

            if stream.reset_received.is_some() {
                Some(Vec::new())
            } else {
                match max_bytes {
                    Some(limit) => {
                        if let Some(bytes) = stream.recv.pop(Some(limit)) {
                            Some(bytes)
                        } else if stream.recv.is_complete() && stream.fin_received() {
                            Some(Vec::new())
                        } else if draining {
                            // closing cancels reads with end-of-stream
                            Some(Vec::new())
                        } else {
                            stream.recv_waker = Some(cx.waker().clone());
                            None
                        }
                    }
                    None => {
                        let contiguous = stream.recv.contiguous_len() as u64;
                        let finished = stream
                            .recv
                            .final_size()
                            .map_or(false, |f| stream.recv.delivered() + contiguous == f);
                        if finished || draining {
                            Some(stream.recv.pop(None).unwrap_or_default())
                        } else {
                            stream.recv_waker = Some(cx.waker().clone());
                            None
                        }
                    }
                }
            }
        };

        match outcome {
            Some(bytes) => {
                self.reclaim_if_closed(id);
                Poll::Ready(bytes)
            }
            None => Poll::Pending,
        }
    }

    pub(crate) fn poll_drain_stream(&mut self, id: u64, cx: &mut Context<'_>) -> Poll<()> {
        match self.streams.get_mut(&id) {
            Some(stream) if stream.send_buffer.len() > HIGH_WATER => {
                stream.send_waker = Some(cx.waker().clone());
                Poll::Pending
            }
            _ => Poll::Ready(()),
        }
    }

    /// Streams are destroyed once both directions have finished
    fn reclaim_if_closed(&mut self, id: u64) {
        if self
            .streams
            .get(&id)
            .map_or(false, StreamState::is_closed)
        {
            self.streams.remove(&id);
            tracing::trace!(stream_id = id, "stream reclaimed");
        }
    }
}

pub(crate) fn encode_frame<T: s2n_codec::EncoderValue>(frame: &T) -> Vec<u8> {
    frame.encode_to_vec()
}
