// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! rustls session wrapper.
//!
//! The connection drives the handshake through [`Session`]: crypto
//! stream bytes go in through [`Session::read`], and [`Session::events`]
//! drains the resulting transmissions, key installations, and the
//! handshake-complete signal. Traffic secrets reported through the
//! keylog callback are buffered and flushed to the configured sink in a
//! fixed label order once the handshake finishes.

use crate::config::ConnectionConfig;
use cinder_quic_core::{
    crypto::{packet_protection, Open, Seal},
    endpoint,
    epoch::Epoch,
    transport::TransportError,
    varint::VarInt,
    version::Version,
};
use rustls::quic::{
    ClientConnection, Connection as HandshakeConnection, DirectionalKeys, KeyChange,
    ServerConnection, Version as TlsWireVersion,
};
use std::{
    io,
    sync::{Arc, Mutex},
};

/// What the TLS engine produced after consuming crypto stream bytes
pub(crate) enum Event {
    /// Handshake bytes to carry in CRYPTO frames on `epoch`
    Transmit { epoch: Epoch, data: Vec<u8> },
    /// Keys for both directions of `epoch` are ready
    Keys { epoch: Epoch, keys: rustls::quic::Keys },
    HandshakeComplete,
}

pub(crate) struct Session {
    inner: HandshakeConnection,
    write_epoch: Epoch,
    complete_reported: bool,
    secrets: Arc<SecretsBuffer>,
}

impl Session {
    pub fn new_client(
        config: &ConnectionConfig,
        version: Version,
        transport_parameters: Vec<u8>,
    ) -> Result<Self, TransportError> {
        let secrets = Arc::new(SecretsBuffer::default());

        let mut crypto = rustls::ClientConfig::builder()
            .with_cipher_suites(&config.cipher_suites)
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|_| internal("no usable TLS protocol versions"))?
            // certificate chain validation policy is out of scope here
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_no_client_auth();
        crypto.alpn_protocols = config.alpn_for(version);
        crypto.key_log = secrets.clone();
        crypto.enable_early_data = false;

        let server_name = rustls::ServerName::try_from(config.server_name.as_str())
            .map_err(|_| internal("invalid server name"))?;

        let session = ClientConnection::new(
            Arc::new(crypto),
            TlsWireVersion::V1Draft,
            server_name,
            transport_parameters,
        )
        .map_err(|_| internal("TLS client setup failed"))?;

        Ok(Self {
            inner: HandshakeConnection::Client(session),
            write_epoch: Epoch::Initial,
            complete_reported: false,
            secrets,
        })
    }

    pub fn new_server(
        config: &ConnectionConfig,
        version: Version,
        transport_parameters: Vec<u8>,
    ) -> Result<Self, TransportError> {
        let secrets = Arc::new(SecretsBuffer::default());

        let certs = config
            .certificate_chain
            .iter()
            .map(|der| rustls::Certificate(der.clone()))
            .collect::<Vec<_>>();
        let key = config
            .private_key
            .clone()
            .map(rustls::PrivateKey)
            .ok_or_else(|| internal("server role requires a private key"))?;

        let mut crypto = rustls::ServerConfig::builder()
            .with_cipher_suites(&config.cipher_suites)
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|_| internal("no usable TLS protocol versions"))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|_| internal("invalid server certificate or key"))?;
        crypto.alpn_protocols = config.alpn_for(version);
        crypto.key_log = secrets.clone();
        crypto.max_early_data_size = 0;
        // session tickets would show up as post-handshake crypto data
        crypto.session_storage = Arc::new(rustls::server::NoServerSessionStorage {});

        let session = ServerConnection::new(
            Arc::new(crypto),
            TlsWireVersion::V1Draft,
            transport_parameters,
        )
        .map_err(|_| internal("TLS server setup failed"))?;

        Ok(Self {
            inner: HandshakeConnection::Server(session),
            write_epoch: Epoch::Initial,
            complete_reported: false,
            secrets,
        })
    }

    /// Feeds contiguous crypto stream bytes to the handshake engine.
    ///
    /// TLS alerts surface as crypto-range transport errors, which the
    /// connection turns into CONNECTION_CLOSE.
    pub fn read(&mut self, data: &[u8]) -> Result<(), TransportError> {
        // CRYPTO frame type, for the CONNECTION_CLOSE this turns into
        const CRYPTO_FRAME_TYPE: VarInt = VarInt::from_u8(0x06);

        self.inner.read_hs(data).map_err(|_| match self.inner.alert() {
            Some(alert) => TransportError::crypto_error(alert.get_u8())
                .with_reason("TLS alert")
                .with_frame_type(CRYPTO_FRAME_TYPE),
            None => internal("TLS handshake failure"),
        })
    }

    /// Drains pending transmissions and key changes
    pub fn events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();

        loop {
            let mut data = Vec::new();
            let key_change = self.inner.write_hs(&mut data);

            if !data.is_empty() {
                events.push(Event::Transmit {
                    epoch: self.write_epoch,
                    data,
                });
            }

            match key_change {
                Some(KeyChange::Handshake { keys }) => {
                    events.push(Event::Keys {
                        epoch: Epoch::Handshake,
                        keys,
                    });
                    self.write_epoch = Epoch::Handshake;
                }
                Some(KeyChange::OneRtt { keys, .. }) => {
                    events.push(Event::Keys {
                        epoch: Epoch::OneRtt,
                        keys,
                    });
                    self.write_epoch = Epoch::OneRtt;
                }
                None => break,
            }
        }

        if !self.complete_reported && !self.inner.is_handshaking() {
            self.complete_reported = true;
            events.push(Event::HandshakeComplete);
        }

        events
    }

    /// The peer's transport parameters, once its hello flight is read
    pub fn peer_transport_parameters(&self) -> Option<Vec<u8>> {
        self.inner.quic_transport_parameters().map(<[u8]>::to_vec)
    }

    /// Writes the four traffic secret lines to `sink` in the keylog
    /// order the rest of the tooling expects
    pub fn flush_secrets(&self, sink: &mut dyn io::Write) {
        self.secrets.flush_to(sink);
    }
}

fn internal(reason: &'static str) -> TransportError {
    TransportError::INTERNAL_ERROR.with_reason(reason)
}

/// Collects traffic secrets from rustls until the handshake completes
#[derive(Debug, Default)]
struct SecretsBuffer {
    entries: Mutex<Vec<(String, Vec<u8>, Vec<u8>)>>,
}

const SECRET_LABELS: [&str; 4] = [
    "SERVER_HANDSHAKE_TRAFFIC_SECRET",
    "CLIENT_HANDSHAKE_TRAFFIC_SECRET",
    "SERVER_TRAFFIC_SECRET_0",
    "CLIENT_TRAFFIC_SECRET_0",
];

impl SecretsBuffer {
    fn flush_to(&self, sink: &mut dyn io::Write) {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for label in SECRET_LABELS {
            if let Some((_, random, secret)) = entries.iter().find(|(l, _, _)| l == label) {
                let _ = writeln!(sink, "QUIC_{} {} {}", label, hex(random), hex(secret));
            }
        }
    }
}

impl rustls::KeyLog for SecretsBuffer {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((label.to_string(), client_random.to_vec(), secret.to_vec()));
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    use core::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Certificate chain validation policy lives outside this stack, so the
/// client accepts whatever the server presents.
struct AcceptAnyServerCert;

impl rustls::client::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// Packet protection over the keys rustls installs for an epoch
pub(crate) struct TlsSeal(DirectionalKeys);

pub(crate) struct TlsOpen(DirectionalKeys);

pub(crate) fn split_keys(keys: rustls::quic::Keys) -> (TlsSeal, TlsOpen) {
    (TlsSeal(keys.local), TlsOpen(keys.remote))
}

impl Seal for TlsSeal {
    fn seal_in_place(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &mut Vec<u8>,
    ) -> Result<(), packet_protection::Error> {
        let tag = self
            .0
            .packet
            .encrypt_in_place(packet_number, header, payload.as_mut_slice())
            .map_err(|_| packet_protection::Error::INTERNAL_ERROR)?;
        payload.extend_from_slice(tag.as_ref());
        Ok(())
    }

    fn protect_header(
        &self,
        sample: &[u8],
        first_byte: &mut u8,
        packet_number_bytes: &mut [u8],
    ) -> Result<(), packet_protection::Error> {
        self.0
            .header
            .encrypt_in_place(
                &sample[..self.0.header.sample_len()],
                first_byte,
                packet_number_bytes,
            )
            .map_err(|_| packet_protection::Error::INTERNAL_ERROR)
    }

    fn tag_len(&self) -> usize {
        self.0.packet.tag_len()
    }

    fn sample_len(&self) -> usize {
        self.0.header.sample_len()
    }
}

impl Open for TlsOpen {
    fn open_in_place<'a>(
        &self,
        packet_number: u64,
        header: &[u8],
        payload: &'a mut [u8],
    ) -> Result<&'a [u8], packet_protection::Error> {
        self.0
            .packet
            .decrypt_in_place(packet_number, header, payload)
            .map_err(|_| packet_protection::Error::DECRYPT_ERROR)
    }

    fn unprotect_header(
        &self,
        sample: &[u8],
        first_byte: &mut u8,
        packet_number_bytes: &mut [u8],
    ) -> Result<(), packet_protection::Error> {
        self.0
            .header
            .decrypt_in_place(
                &sample[..self.0.header.sample_len()],
                first_byte,
                packet_number_bytes,
            )
            .map_err(|_| packet_protection::Error::DECRYPT_ERROR)
    }

    fn sample_len(&self) -> usize {
        self.0.header.sample_len()
    }
}

pub(crate) fn local_endpoint_label(endpoint_type: endpoint::Type) -> &'static str {
    match endpoint_type {
        endpoint::Type::Client => "client",
        endpoint::Type::Server => "server",
    }
}
