// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{transport::TransportError, varint::VarInt};
use s2n_codec::{DecoderBuffer, DecoderError, Encoder, EncoderBuffer};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-18
//# The format of the transport parameters is the TransportParameters
//# struct from Figure 15.

const IDLE_TIMEOUT: u16 = 0x0001;
const MAX_PACKET_SIZE: u16 = 0x0003;
const INITIAL_MAX_DATA: u16 = 0x0004;
const INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: u16 = 0x0005;
const INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: u16 = 0x0006;
const INITIAL_MAX_STREAM_DATA_UNI: u16 = 0x0007;
const INITIAL_MAX_STREAMS_BIDI: u16 = 0x0008;
const INITIAL_MAX_STREAMS_UNI: u16 = 0x0009;

/// The transport parameters exchanged inside the TLS handshake.
///
/// A single stream-data limit is advertised for all three stream-data
/// parameter ids; the distinction is not needed by this stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportParameters {
    pub idle_timeout: VarInt,
    pub max_packet_size: VarInt,
    pub initial_max_data: VarInt,
    pub initial_max_stream_data: VarInt,
    pub initial_max_streams_bidi: VarInt,
    pub initial_max_streams_uni: VarInt,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            idle_timeout: VarInt::from_u32(60_000),
            max_packet_size: VarInt::from_u16(1452),
            initial_max_data: VarInt::from_u32(1_048_576),
            initial_max_stream_data: VarInt::from_u32(1_048_576),
            initial_max_streams_bidi: VarInt::from_u8(100),
            initial_max_streams_uni: VarInt::ZERO,
        }
    }
}

impl TransportParameters {
    /// Encodes the parameter list, prefixed with its 16-bit total length
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut scratch = [0u8; 128];
        let mut encoder = EncoderBuffer::new(&mut scratch);

        for (id, value) in [
            (IDLE_TIMEOUT, self.idle_timeout),
            (MAX_PACKET_SIZE, self.max_packet_size),
            (INITIAL_MAX_DATA, self.initial_max_data),
            (INITIAL_MAX_STREAM_DATA_BIDI_LOCAL, self.initial_max_stream_data),
            (INITIAL_MAX_STREAM_DATA_BIDI_REMOTE, self.initial_max_stream_data),
            (INITIAL_MAX_STREAM_DATA_UNI, self.initial_max_stream_data),
            (INITIAL_MAX_STREAMS_BIDI, self.initial_max_streams_bidi),
            (INITIAL_MAX_STREAMS_UNI, self.initial_max_streams_uni),
        ] {
            encoder.encode(&id);
            encoder.encode(&(value.encoded_size() as u16));
            encoder.encode(&value);
        }

        let len = encoder.len();
        let mut out = Vec::with_capacity(len + 2);
        out.extend_from_slice(&(len as u16).to_be_bytes());
        out.extend_from_slice(&scratch[..len]);
        out
    }

    /// Decodes a parameter list; unknown ids are skipped
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, TransportError> {
        let buffer = DecoderBuffer::new(bytes);
        let (list, remaining) = buffer
            .decode_slice_with_len_prefix::<u16>()
            .map_err(malformed)?;
        remaining.ensure_empty().map_err(malformed)?;

        let mut params = Self::default();
        let mut buffer = list;
        while !buffer.is_empty() {
            let (id, rest) = buffer.decode::<u16>().map_err(malformed)?;
            let (value, rest) = rest
                .decode_slice_with_len_prefix::<u16>()
                .map_err(malformed)?;

            let field = match id {
                IDLE_TIMEOUT => Some(&mut params.idle_timeout),
                MAX_PACKET_SIZE => Some(&mut params.max_packet_size),
                INITIAL_MAX_DATA => Some(&mut params.initial_max_data),
                INITIAL_MAX_STREAM_DATA_BIDI_LOCAL
                | INITIAL_MAX_STREAM_DATA_BIDI_REMOTE
                | INITIAL_MAX_STREAM_DATA_UNI => Some(&mut params.initial_max_stream_data),
                INITIAL_MAX_STREAMS_BIDI => Some(&mut params.initial_max_streams_bidi),
                INITIAL_MAX_STREAMS_UNI => Some(&mut params.initial_max_streams_uni),
                _ => None,
            };

            if let Some(field) = field {
                let (decoded, value_rest) = value.decode::<VarInt>().map_err(malformed)?;
                value_rest.ensure_empty().map_err(malformed)?;
                *field = decoded;
            }

            buffer = rest;
        }

        Ok(params)
    }
}

fn malformed(_: DecoderError) -> TransportError {
    TransportError::TRANSPORT_PARAMETER_ERROR.with_reason("malformed transport parameters")
}
