// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Connection state machine for the cinder QUIC stack.
//!
//! A [`Connection`] multiplexes three packet-number spaces, sequences a
//! TLS 1.3 handshake across them, frames and encrypts outbound datagrams,
//! and exposes ordered byte streams with flow control. The datagram
//! socket and the TLS engine are collaborators: the first is any
//! [`DatagramTransport`] sink, the second is rustls driven through an
//! internal session wrapper.

#![forbid(unsafe_code)]

mod buffer;
pub mod config;
pub mod connection;
mod space;
pub mod stream;
mod tls;

pub use config::ConnectionConfig;
pub use connection::{Connection, DatagramTransport, State};
pub use stream::{StreamReader, StreamWriter};

pub use cinder_quic_core::{
    transport::TransportError,
    version::{Version, SUPPORTED_VERSIONS},
};
