// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use cinder_quic_core::{
    crypto::aesgcm::AesGcmSeal,
    packet::{retry::Retry, version_negotiation::VersionNegotiation},
};
use futures::executor::block_on;
use s2n_codec::DecoderBuffer;
use std::{
    cell::Cell,
    sync::{Arc, Mutex},
};

/// Queues outbound datagrams instead of delivering them inline, so the
/// two endpoints never re-enter each other; the pump drains the queues
/// to quiescence, which yields the same datagram counts as a
/// synchronous transport would.
#[derive(Default)]
struct FakeTransport {
    sent: Cell<usize>,
    queue: RefCell<VecDeque<Vec<u8>>>,
}

impl DatagramTransport for FakeTransport {
    fn send_to(&self, data: &[u8]) {
        self.sent.set(self.sent.get() + 1);
        self.queue.borrow_mut().push_back(data.to_vec());
    }
}

impl FakeTransport {
    fn sent(&self) -> usize {
        self.sent.get()
    }

    fn pop(&self) -> Option<Vec<u8>> {
        self.queue.borrow_mut().pop_front()
    }
}

fn pump(
    client: &Connection,
    client_tx: &Rc<FakeTransport>,
    server: &Connection,
    server_tx: &Rc<FakeTransport>,
) {
    loop {
        if let Some(datagram) = client_tx.pop() {
            server.datagram_received(&datagram, None);
            continue;
        }
        if let Some(datagram) = server_tx.pop() {
            client.datagram_received(&datagram, None);
            continue;
        }
        break;
    }
}

fn create_transport(
    client: &Connection,
    server: &Connection,
) -> (Rc<FakeTransport>, Rc<FakeTransport>) {
    let client_tx = Rc::new(FakeTransport::default());
    let server_tx = Rc::new(FakeTransport::default());
    server.connection_made(server_tx.clone());
    client.connection_made(client_tx.clone());
    pump(client, &client_tx, server, &server_tx);
    (client_tx, server_tx)
}

fn server_config() -> ConnectionConfig {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("certificate generation");
    ConnectionConfig::server(
        cert.serialize_der().expect("certificate serialization"),
        cert.serialize_private_key_der(),
    )
}

/// Handle for a stream the peer opened
fn remote_reader(conn: &Connection, id: u64) -> crate::stream::StreamReader {
    crate::stream::StreamReader {
        conn: conn.inner.clone(),
        id,
    }
}

fn remote_writer(conn: &Connection, id: u64) -> crate::stream::StreamWriter {
    crate::stream::StreamWriter {
        conn: conn.inner.clone(),
        id,
    }
}

/// An `io::Write` whose contents stay observable from the test
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("sink lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().expect("sink lock").clone()).expect("utf8 log")
    }
}

fn connect_with_version(version: Version) {
    let client = Connection::new(ConnectionConfig::client().with_versions(vec![version]));
    let server = Connection::new(server_config().with_versions(vec![version]));

    // perform the handshake
    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client_tx.sent(), 4);
    assert_eq!(server_tx.sent(), 4);
    assert!(client.is_established());
    assert!(server.is_established());

    // send data over a stream
    let (client_reader, client_writer) = client.create_stream(false).expect("stream credit");
    client_writer.write(b"ping");
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client_tx.sent(), 5);
    assert_eq!(server_tx.sent(), 5);

    let server_reader = remote_reader(&server, 0);
    let server_writer = remote_writer(&server, 0);
    assert_eq!(block_on(server_reader.read(1024)), b"ping");

    server_writer.write(b"pong");
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client_tx.sent(), 6);
    assert_eq!(server_tx.sent(), 6);

    // client receives pong
    assert_eq!(block_on(client_reader.read(1024)), b"pong");

    // client sends the end of the stream
    client_writer.write_eof();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client_tx.sent(), 7);
    assert_eq!(server_tx.sent(), 7);

    // server observes the end of the stream
    assert_eq!(block_on(server_reader.read_to_end()), b"");
}

#[test]
fn connect_draft_17_test() {
    connect_with_version(Version::DRAFT_17);
}

#[test]
fn connect_draft_18_test() {
    connect_with_version(Version::DRAFT_18);
}

#[test]
fn connect_draft_19_test() {
    connect_with_version(Version::DRAFT_19);
}

#[test]
fn connect_draft_20_test() {
    connect_with_version(Version::DRAFT_20);
}

#[test]
fn connect_with_secrets_log_test() {
    let client_log = SharedBuf::default();
    let server_log = SharedBuf::default();

    let client = Connection::new(
        ConnectionConfig::client().with_secrets_log(Box::new(client_log.clone())),
    );
    let server =
        Connection::new(server_config().with_secrets_log(Box::new(server_log.clone())));

    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client_tx.sent(), 4);
    assert_eq!(server_tx.sent(), 4);

    // both sides logged identical secrets, in the canonical order
    let client_contents = client_log.contents();
    assert_eq!(client_contents, server_log.contents());

    let labels: Vec<&str> = client_contents
        .lines()
        .map(|line| line.split(' ').next().expect("label"))
        .collect();
    assert_eq!(
        labels,
        [
            "QUIC_SERVER_HANDSHAKE_TRAFFIC_SECRET",
            "QUIC_CLIENT_HANDSHAKE_TRAFFIC_SECRET",
            "QUIC_SERVER_TRAFFIC_SECRET_0",
            "QUIC_CLIENT_TRAFFIC_SECRET_0",
        ]
    );

    // each line is label, client random, secret
    for line in client_contents.lines() {
        assert_eq!(line.split(' ').count(), 3);
    }
}

#[test]
fn create_stream_test() {
    let client = Connection::new(ConnectionConfig::client());
    client.inner.borrow_mut().initialize(&[]).expect("initialize");

    let server = Connection::new(server_config());
    server.inner.borrow_mut().initialize(&[]).expect("initialize");

    // client allocation order: bidi, bidi, uni, uni
    let (_, writer) = client.create_stream(false).expect("credit");
    assert_eq!(writer.stream_id(), 0);
    let (_, writer) = client.create_stream(false).expect("credit");
    assert_eq!(writer.stream_id(), 4);
    let (_, writer) = client.create_stream(true).expect("credit");
    assert_eq!(writer.stream_id(), 2);
    let (_, writer) = client.create_stream(true).expect("credit");
    assert_eq!(writer.stream_id(), 6);

    // server
    let (_, writer) = server.create_stream(false).expect("credit");
    assert_eq!(writer.stream_id(), 1);
    let (_, writer) = server.create_stream(false).expect("credit");
    assert_eq!(writer.stream_id(), 5);
    let (_, writer) = server.create_stream(true).expect("credit");
    assert_eq!(writer.stream_id(), 3);
    let (_, writer) = server.create_stream(true).expect("credit");
    assert_eq!(writer.stream_id(), 7);
}

#[test]
fn create_stream_exhausts_credit_test() {
    let client = Connection::new(ConnectionConfig::client());
    client.inner.borrow_mut().remote_max_streams_uni = 1;

    assert!(client.create_stream(true).is_ok());
    let error = client.create_stream(true).unwrap_err();
    assert_eq!(error.code, TransportError::STREAM_LIMIT_ERROR.code);
}

#[test]
fn decryption_error_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());

    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client_tx.sent(), 4);
    assert_eq!(server_tx.sent(), 4);

    // replace the server's 1-RTT seal key with one derived from a zeroed
    // secret; the client can no longer authenticate its packets
    server.inner.borrow_mut().spaces[Epoch::OneRtt.as_index()].send_key =
        Some(Box::new(AesGcmSeal::from_secret(&[0u8; 48])));

    server.close(0, None, "");
    pump(&client, &client_tx, &server, &server_tx);

    // the close datagram is dropped silently; the client stays quiet
    assert_eq!(server_tx.sent(), 5);
    assert_eq!(client_tx.sent(), 4);
    assert!(client.is_established());
    assert_eq!(server.state(), State::Closing);
}

#[test]
fn tls_handshake_failure_test() {
    // no common cipher suite: the server answers the first flight with a
    // crypto-range CONNECTION_CLOSE, which the client echoes
    let client = Connection::new(ConnectionConfig::client().with_cipher_suites(vec![
        rustls::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
    ]));
    let server = Connection::new(
        server_config()
            .with_cipher_suites(vec![rustls::cipher_suite::TLS13_AES_128_GCM_SHA256]),
    );

    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client_tx.sent(), 2);
    assert_eq!(server_tx.sent(), 1);
    assert_eq!(client.state(), State::Draining);
    // the client's reply reached the server during the exchange
    assert_eq!(server.state(), State::Draining);
}

#[test]
fn error_received_test() {
    let client = Connection::new(ConnectionConfig::client());
    client.error_received(io::Error::new(io::ErrorKind::Other, "foo"));
    assert_eq!(client.inner.borrow().transport_error_count, 1);
    assert_eq!(client.state(), State::Firstflight);
}

#[test]
fn retry_test() {
    let client = Connection::new(ConnectionConfig::client());
    let client_tx = Rc::new(FakeTransport::default());
    client.connection_made(client_tx.clone());
    assert_eq!(client_tx.sent(), 1);

    let (host_cid, peer_cid) = {
        let inner = client.inner.borrow();
        (
            inner.host_cid.as_bytes().to_vec(),
            inner.peer_cid.as_bytes().to_vec(),
        )
    };

    let retry = Retry::encode_to_vec(
        Version::DRAFT_20,
        &host_cid,
        &[9u8; 8],
        &peer_cid,
        b"retry-token",
    );
    client.datagram_received(&retry, None);

    // exactly one extra datagram, now carrying the token
    assert_eq!(client_tx.sent(), 2);
    {
        let inner = client.inner.borrow();
        assert_eq!(inner.peer_token, b"retry-token");
        assert_eq!(inner.peer_cid.as_bytes(), &[9u8; 8]);
    }

    // a second Retry is ignored
    let again = Retry::encode_to_vec(Version::DRAFT_20, &host_cid, &[8u8; 8], &[9u8; 8], b"x");
    client.datagram_received(&again, None);
    assert_eq!(client_tx.sent(), 2);
}

#[test]
fn version_negotiation_ok_test() {
    let client = Connection::new(ConnectionConfig::client());
    let client_tx = Rc::new(FakeTransport::default());
    client.connection_made(client_tx.clone());
    assert_eq!(client_tx.sent(), 1);

    let host_cid = client.inner.borrow().host_cid.as_bytes().to_vec();
    let packet = VersionNegotiation::encode_to_vec(
        &host_cid,
        &[7u8; 8],
        &[Version::DRAFT_18, Version::new(0x1a2a_3a4a)],
    );
    client.datagram_received(&packet, None);

    // common version found: the Initial goes out again
    assert_eq!(client_tx.sent(), 2);
    assert_eq!(client.inner.borrow().version, Version::DRAFT_18);
}

#[test]
fn version_negotiation_fail_test() {
    let client =
        Connection::new(ConnectionConfig::client().with_versions(vec![Version::DRAFT_19]));
    let client_tx = Rc::new(FakeTransport::default());
    client.connection_made(client_tx.clone());
    assert_eq!(client_tx.sent(), 1);

    let host_cid = client.inner.borrow().host_cid.as_bytes().to_vec();
    let packet = VersionNegotiation::encode_to_vec(
        &host_cid,
        &[7u8; 8],
        &[Version::DRAFT_18, Version::new(0x1a2a_3a4a)],
    );
    client.datagram_received(&packet, None);

    // no common version: the connection goes silent
    assert_eq!(client_tx.sent(), 1);
    assert_eq!(client.state(), State::Negotiating);
}

#[test]
fn handle_ack_ecn_test() {
    let client = Connection::new(ConnectionConfig::client());

    // largest 0, delay 2, no extra ranges, first range 0, ECN counts 0
    let bytes = [0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
    let (ack, rest) = DecoderBuffer::new(&bytes)
        .decode_parameterized::<frame::Ack>(0x03)
        .expect("decode");
    assert!(rest.is_empty());

    client
        .inner
        .borrow_mut()
        .handle_ack(Epoch::OneRtt, &ack)
        .expect("ECN counts decode without state change");
}

#[test]
fn ack_retires_in_flight_test() {
    let client = Connection::new(ConnectionConfig::client());
    {
        let mut inner = client.inner.borrow_mut();
        let index = Epoch::OneRtt.as_index();
        inner.ack_eliciting_in_flight.insert((index, 0));
        inner.ack_eliciting_in_flight.insert((index, 1));
        inner.ack_eliciting_in_flight.insert((index, 5));

        let ack = frame::Ack {
            ack_delay: VarInt::ZERO,
            ranges: vec![0..=1],
            ecn_counts: None,
        };
        inner.handle_ack(Epoch::OneRtt, &ack).expect("ack");
        assert_eq!(inner.ack_eliciting_in_flight.len(), 1);

        // replaying the same ACK has no further effect
        inner.handle_ack(Epoch::OneRtt, &ack).expect("ack replay");
        assert_eq!(inner.ack_eliciting_in_flight.len(), 1);
    }
}

#[test]
fn handle_connection_close_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());

    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client_tx.sent(), 4);
    assert_eq!(server_tx.sent(), 4);

    // transport-flavored close (0x1c)
    server.close(0, Some(0), "");
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client_tx.sent(), 5);
    assert_eq!(server_tx.sent(), 5);
    assert_eq!(client.state(), State::Draining);
    assert_eq!(server.state(), State::Draining);
}

#[test]
fn handle_connection_close_app_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());

    let (client_tx, server_tx) = create_transport(&client, &server);

    // application-flavored close (0x1d)
    server.close(0, None, "done");
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client_tx.sent(), 5);
    assert_eq!(server_tx.sent(), 5);
    assert_eq!(client.state(), State::Draining);
}

#[test]
fn close_is_idempotent_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    server.close(0, None, "");
    server.close(0, None, "");
    assert_eq!(server_tx.sent(), 5);

    // draining endpoints ignore everything
    pump(&client, &client_tx, &server, &server_tx);
    let after = client_tx.sent();
    client.datagram_received(&[0u8; 32], None);
    assert_eq!(client_tx.sent(), after);
}

#[test]
fn handle_max_data_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    // 12345 is below the handshake-granted limit and is discarded
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x10, 0x70, 0x39]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client.inner.borrow().remote_max_data, 1_048_576);

    // 2_000_000 raises it
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x10, 0x80, 0x1e, 0x84, 0x80]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client.inner.borrow().remote_max_data, 2_000_000);
}

#[test]
fn handle_max_streams_bidi_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client.inner.borrow().remote_max_streams_bidi, 100);

    // MAX_STREAMS_BIDI: 101
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x12, 0x40, 0x65]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client.inner.borrow().remote_max_streams_bidi, 101);

    // MAX_STREAMS_BIDI: 99 is smaller and discarded
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x12, 0x40, 0x63]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client.inner.borrow().remote_max_streams_bidi, 101);
}

#[test]
fn handle_max_streams_uni_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client.inner.borrow().remote_max_streams_uni, 100);

    // MAX_STREAMS_UNI: 300
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x13, 0x41, 0x2c]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client.inner.borrow().remote_max_streams_uni, 300);

    // MAX_STREAMS_UNI: 1 is smaller and discarded
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x13, 0x01]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert_eq!(client.inner.borrow().remote_max_streams_uni, 300);
}

#[test]
fn handle_max_stream_data_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    // client opens bidirectional stream 0
    let _ = client.create_stream(false).expect("credit");

    let mut inner = client.inner.borrow_mut();
    inner
        .handle_max_stream_data(&frame::MaxStreamData {
            stream_id: VarInt::ZERO,
            maximum_stream_data: VarInt::from_u32(9_000_000),
        })
        .expect("send credit raised");
    assert_eq!(inner.streams[&0].max_data_remote, 9_000_000);

    // a smaller value is discarded
    inner
        .handle_max_stream_data(&frame::MaxStreamData {
            stream_id: VarInt::ZERO,
            maximum_stream_data: VarInt::from_u8(1),
        })
        .expect("smaller value ignored");
    assert_eq!(inner.streams[&0].max_data_remote, 9_000_000);
}

#[test]
fn handle_max_stream_data_receive_only_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    // server opens unidirectional stream 3
    let _ = server.create_stream(true).expect("credit");

    // client receives MAX_STREAM_DATA for a stream it can only read
    let error = client
        .inner
        .borrow_mut()
        .handle_max_stream_data(&frame::MaxStreamData {
            stream_id: VarInt::from_u8(3),
            maximum_stream_data: VarInt::from_u8(1),
        })
        .unwrap_err();
    assert_eq!(error.code, TransportError::STREAM_STATE_ERROR.code);
    assert_eq!(error.frame_type, Some(VarInt::from_u8(0x11)));
    assert_eq!(error.reason, "Stream is receive-only");
}

#[test]
fn handle_new_connection_id_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    // the post-handshake pass already exchanged one id each way
    assert_eq!(client.inner.borrow().peer_cids.len(), 1);

    let mut frame_bytes = vec![0x18, 0x02, 0x00, 0x08];
    frame_bytes.extend_from_slice(&[0x78, 0x13, 0xf3, 0xd9, 0xe4, 0x5e, 0x0c, 0xac]);
    frame_bytes.extend_from_slice(&[0xf2; 16]);
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(frame_bytes.into());
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);

    let inner = client.inner.borrow();
    assert_eq!(inner.peer_cids.len(), 2);
    let added = inner.peer_cids.iter().find(|c| c.sequence == 2).expect("sequence 2");
    assert_eq!(added.cid, [0x78, 0x13, 0xf3, 0xd9, 0xe4, 0x5e, 0x0c, 0xac]);
    assert_eq!(added.stateless_reset_token, [0xf2; 16]);
}

#[test]
fn handle_retire_connection_id_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    // the client issued sequence 1 at handshake completion
    assert!(client
        .inner
        .borrow()
        .issued_cids
        .iter()
        .any(|issued| issued.sequence == 1));

    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x19, 0x01]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);

    assert!(client.inner.borrow().issued_cids.is_empty());
}

#[test]
fn handle_new_token_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x07, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);

    assert_eq!(client.inner.borrow().peer_token, [1, 2, 3, 4, 5, 6, 7, 8]);

    // a server receiving NEW_TOKEN reports a protocol violation
    let error = server
        .inner
        .borrow_mut()
        .handle_new_token(&frame::NewToken { token: &[1, 2, 3] })
        .unwrap_err();
    assert_eq!(error.code, TransportError::PROTOCOL_VIOLATION.code);
}

#[test]
fn path_challenge_round_trip_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    server.send_path_challenge();
    pump(&client, &client_tx, &server, &server_tx);

    // the client echoed the token; the response resolved the challenge
    assert!(server.inner.borrow().challenges_sent.is_empty());
    assert_eq!(server_tx.sent(), 6);
    assert_eq!(client_tx.sent(), 5);
}

#[test]
fn handle_path_response_unsolicited_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    let error = server
        .inner
        .borrow_mut()
        .handle_path_response(&frame::PathResponse {
            data: &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
        })
        .unwrap_err();
    assert_eq!(error.code, TransportError::PROTOCOL_VIOLATION.code);
    assert_eq!(error.frame_type, Some(VarInt::from_u8(0x1b)));
}

#[test]
fn handle_reset_stream_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    let (reader, _writer) = client.create_stream(false).expect("credit");

    client
        .inner
        .borrow_mut()
        .handle_reset_stream(&frame::ResetStream {
            stream_id: VarInt::ZERO,
            application_error_code: 0x1122,
            final_size: VarInt::ZERO,
        })
        .expect("reset accepted");

    assert_eq!(
        client.inner.borrow().streams[&0].reset_received,
        Some(0x1122)
    );

    // a reset reads as end of stream, not an error
    assert_eq!(block_on(reader.read(1024)), b"");
}

#[test]
fn handle_reset_stream_send_only_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    // client opens unidirectional stream 2
    let _ = client.create_stream(true).expect("credit");

    let error = client
        .inner
        .borrow_mut()
        .handle_reset_stream(&frame::ResetStream {
            stream_id: VarInt::from_u8(2),
            application_error_code: 0x1122,
            final_size: VarInt::from_u8(1),
        })
        .unwrap_err();
    assert_eq!(error.code, TransportError::STREAM_STATE_ERROR.code);
    assert_eq!(error.frame_type, Some(VarInt::from_u8(0x04)));
    assert_eq!(error.reason, "Stream is send-only");
}

#[test]
fn handle_stop_sending_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    let _ = client.create_stream(false).expect("credit");

    client
        .inner
        .borrow_mut()
        .handle_stop_sending(&frame::StopSending {
            stream_id: VarInt::ZERO,
            application_error_code: 0x1122,
        })
        .expect("stop sending accepted");
    assert_eq!(
        client.inner.borrow().streams[&0].stop_sending_received,
        Some(0x1122)
    );
}

#[test]
fn handle_stop_sending_receive_only_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    let _ = server.create_stream(true).expect("credit");

    let error = client
        .inner
        .borrow_mut()
        .handle_stop_sending(&frame::StopSending {
            stream_id: VarInt::from_u8(3),
            application_error_code: 0x1122,
        })
        .unwrap_err();
    assert_eq!(error.code, TransportError::STREAM_STATE_ERROR.code);
    assert_eq!(error.frame_type, Some(VarInt::from_u8(0x05)));
    assert_eq!(error.reason, "Stream is receive-only");
}

#[test]
fn handle_stream_frame_send_only_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    // client opens unidirectional stream 2
    let _ = client.create_stream(true).expect("credit");

    let error = client
        .inner
        .borrow_mut()
        .handle_stream(&frame::Stream {
            stream_id: VarInt::from_u8(2),
            offset: VarInt::ZERO,
            is_last_frame: true,
            is_fin: false,
            data: &[],
        })
        .unwrap_err();
    assert_eq!(error.code, TransportError::STREAM_STATE_ERROR.code);
    assert_eq!(error.frame_type, Some(VarInt::from_u8(0x08)));
    assert_eq!(error.reason, "Stream is send-only");
}

#[test]
fn handle_stream_data_blocked_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    let _ = client.create_stream(false).expect("credit");

    client
        .inner
        .borrow_mut()
        .handle_stream_data_blocked(&frame::StreamDataBlocked {
            stream_id: VarInt::ZERO,
            stream_data_limit: VarInt::from_u8(1),
        })
        .expect("advisory frame");
}

#[test]
fn handle_stream_data_blocked_send_only_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (_client_tx, _server_tx) = create_transport(&client, &server);

    let _ = client.create_stream(true).expect("credit");

    let error = client
        .inner
        .borrow_mut()
        .handle_stream_data_blocked(&frame::StreamDataBlocked {
            stream_id: VarInt::from_u8(2),
            stream_data_limit: VarInt::from_u8(1),
        })
        .unwrap_err();
    assert_eq!(error.code, TransportError::STREAM_STATE_ERROR.code);
    assert_eq!(error.frame_type, Some(VarInt::from_u8(0x15)));
    assert_eq!(error.reason, "Stream is send-only");
}

#[test]
fn handle_streams_blocked_uni_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    // STREAMS_BLOCKED_UNI: 0 is advisory and harmless
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x17, 0x00]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert!(client.is_established());
}

#[test]
fn handle_unknown_frame_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    // a zero-length unknown frame at the end of the payload is tolerated
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x1e]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);
    assert!(client.is_established());
}

#[test]
fn handle_unknown_frame_strict_test() {
    let client = Connection::new(ConnectionConfig::client().with_strict_frames(true));
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);
    assert_eq!(client_tx.sent(), 4);

    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x1e]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);

    // strict mode closes with PROTOCOL_VIOLATION
    assert_eq!(client_tx.sent(), 5);
    assert_eq!(client.state(), State::Draining);
    assert_eq!(server.state(), State::Draining);
}

#[test]
fn handle_unknown_frame_with_body_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    // an unknown frame that is not at the end cannot be skipped
    server
        .inner
        .borrow_mut()
        .pending_control
        .push_back(bytes::Bytes::from(vec![0x1e, 0xaa, 0xbb]));
    server.send_pending();
    pump(&client, &client_tx, &server, &server_tx);

    assert_eq!(client.state(), State::Draining);
}

#[test]
fn stream_round_trip_large_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

    let (_reader, writer) = client.create_stream(false).expect("credit");
    writer.write(&payload);
    writer.write_eof();
    pump(&client, &client_tx, &server, &server_tx);

    let server_reader = remote_reader(&server, 0);
    let received = block_on(server_reader.read_to_end());
    assert_eq!(received, payload);
}

#[test]
fn write_after_eof_is_ignored_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    let (_reader, writer) = client.create_stream(false).expect("credit");
    writer.write(b"data");
    writer.write_eof();
    writer.write(b"late");
    pump(&client, &client_tx, &server, &server_tx);

    let server_reader = remote_reader(&server, 0);
    assert_eq!(block_on(server_reader.read_to_end()), b"data");
}

#[test]
fn writer_drain_test() {
    let client = Connection::new(ConnectionConfig::client());
    let server = Connection::new(server_config());
    let (client_tx, server_tx) = create_transport(&client, &server);

    let (_reader, writer) = client.create_stream(false).expect("credit");
    writer.write(b"flush me");
    pump(&client, &client_tx, &server, &server_tx);

    // the build pass drained the buffer below the high-water mark
    block_on(writer.drain());
}

#[test]
fn shutdown_terminates_test() {
    let client = Connection::new(ConnectionConfig::client());
    client.shutdown();
    assert_eq!(client.state(), State::Terminated);
    client.datagram_received(&[0u8; 16], None);
    assert_eq!(client.state(), State::Terminated);
}
