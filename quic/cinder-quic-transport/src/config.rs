// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use cinder_quic_core::{
    endpoint,
    version::{Version, SUPPORTED_VERSIONS},
};
use std::io;

/// Per-connection configuration, fixed at construction.
///
/// The handshake surface (TLS cipher suites, ALPN, certificates, the
/// secrets sink) is part of the builder so that nothing about a
/// connection's handshake is mutated after the object exists.
pub struct ConnectionConfig {
    pub(crate) endpoint_type: endpoint::Type,
    pub(crate) version: Version,
    pub(crate) supported_versions: Vec<Version>,
    pub(crate) certificate_chain: Vec<Vec<u8>>,
    pub(crate) private_key: Option<Vec<u8>>,
    pub(crate) cipher_suites: Vec<rustls::SupportedCipherSuite>,
    pub(crate) alpn_protocols: Option<Vec<Vec<u8>>>,
    pub(crate) server_name: String,
    pub(crate) secrets_log: Option<Box<dyn io::Write + Send>>,
    pub(crate) strict_frames: bool,
}

impl ConnectionConfig {
    /// Configuration for a client connection
    pub fn client() -> Self {
        Self::new(endpoint::Type::Client, Vec::new(), None)
    }

    /// Configuration for a server connection.
    ///
    /// The certificate and private key are DER encoded; the server role
    /// requires both, and the client role carries neither.
    pub fn server(certificate_der: Vec<u8>, private_key_der: Vec<u8>) -> Self {
        Self::new(
            endpoint::Type::Server,
            vec![certificate_der],
            Some(private_key_der),
        )
    }

    fn new(
        endpoint_type: endpoint::Type,
        certificate_chain: Vec<Vec<u8>>,
        private_key: Option<Vec<u8>>,
    ) -> Self {
        Self {
            endpoint_type,
            version: SUPPORTED_VERSIONS[0],
            supported_versions: SUPPORTED_VERSIONS.to_vec(),
            certificate_chain,
            private_key,
            cipher_suites: default_cipher_suites(),
            alpn_protocols: None,
            server_name: "localhost".to_string(),
            secrets_log: None,
            strict_frames: false,
        }
    }

    /// Restricts the QUIC versions this endpoint will negotiate; the
    /// first entry is offered initially.
    pub fn with_versions(mut self, versions: Vec<Version>) -> Self {
        debug_assert!(!versions.is_empty());
        if let Some(first) = versions.first() {
            self.version = *first;
        }
        self.supported_versions = versions;
        self
    }

    /// Overrides the TLS cipher suites offered or accepted
    pub fn with_cipher_suites(mut self, suites: Vec<rustls::SupportedCipherSuite>) -> Self {
        self.cipher_suites = suites;
        self
    }

    /// Overrides the ALPN protocols; the default is `hq-<draft>` for the
    /// negotiated draft
    pub fn with_alpn_protocols(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.alpn_protocols = Some(protocols);
        self
    }

    /// The server name a client puts in its ClientHello
    pub fn with_server_name(mut self, server_name: &str) -> Self {
        self.server_name = server_name.to_string();
        self
    }

    /// Attaches an NSS-keylog sink; it receives the four traffic secret
    /// lines once the handshake completes
    pub fn with_secrets_log(mut self, sink: Box<dyn io::Write + Send>) -> Self {
        self.secrets_log = Some(sink);
        self
    }

    /// Treats even zero-length unknown frames as a protocol violation
    pub fn with_strict_frames(mut self, strict: bool) -> Self {
        self.strict_frames = strict;
        self
    }

    /// The ALPN protocols in effect for `version`
    pub(crate) fn alpn_for(&self, version: Version) -> Vec<Vec<u8>> {
        match &self.alpn_protocols {
            Some(protocols) => protocols.clone(),
            None => {
                let draft = version.draft().unwrap_or(0);
                vec![format!("hq-{draft}").into_bytes()]
            }
        }
    }
}

fn default_cipher_suites() -> Vec<rustls::SupportedCipherSuite> {
    vec![
        rustls::cipher_suite::TLS13_AES_128_GCM_SHA256,
        rustls::cipher_suite::TLS13_AES_256_GCM_SHA384,
        rustls::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
    ]
}
