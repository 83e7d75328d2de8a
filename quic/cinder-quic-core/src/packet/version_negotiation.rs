// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection::id::{decode_cid_len, encode_cid_len},
    packet::LONG_HEADER_TAG,
    version::Version,
};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderBuffer};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-17.2.1
//# A Version Negotiation packet is inherently not version-specific.
//# Upon receipt by a client, it will be identified as a Version
//# Negotiation packet based on the Version field having a value of 0.

#[derive(Debug, PartialEq, Eq)]
pub struct VersionNegotiation<'a> {
    pub dcid: &'a [u8],
    pub scid: &'a [u8],
    pub supported_versions: Vec<Version>,
}

impl<'a> VersionNegotiation<'a> {
    /// Decodes the packet body following the first byte and the zero
    /// version field.
    pub fn decode(buffer: DecoderBuffer<'a>) -> DecoderBufferResult<'a, Self> {
        let (cid_lens, buffer) = buffer.decode::<u8>()?;
        let (dcid, buffer) = buffer.decode_slice(decode_cid_len(cid_lens >> 4))?;
        let (scid, buffer) = buffer.decode_slice(decode_cid_len(cid_lens & 0x0f))?;

        let mut supported_versions = Vec::new();
        let mut buffer = buffer;
        while !buffer.is_empty() {
            let (version, rest) = buffer.decode::<Version>()?;
            supported_versions.push(version);
            buffer = rest;
        }

        let packet = VersionNegotiation {
            dcid: dcid.into_less_safe_slice(),
            scid: scid.into_less_safe_slice(),
            supported_versions,
        };

        Ok((packet, buffer))
    }

    /// Builds a complete Version Negotiation datagram
    pub fn encode_to_vec(dcid: &[u8], scid: &[u8], versions: &[Version]) -> Vec<u8> {
        let mut bytes = vec![0u8; 7 + dcid.len() + scid.len() + versions.len() * 4];
        let mut encoder = EncoderBuffer::new(&mut bytes);

        encoder.encode(&LONG_HEADER_TAG);
        encoder.encode(&Version::NEGOTIATION);
        encoder.encode(&((encode_cid_len(dcid.len()) << 4) | encode_cid_len(scid.len())));
        encoder.write_slice(dcid);
        encoder.write_slice(scid);
        for version in versions {
            encoder.encode(version);
        }

        let len = encoder.len();
        bytes.truncate(len);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_test() {
        let dcid = [1u8; 8];
        let scid = [2u8; 8];
        let versions = [Version::DRAFT_18, Version::new(0x1a2a_3a4a)];

        let bytes = VersionNegotiation::encode_to_vec(&dcid, &scid, &versions);
        assert!(super::super::is_long_header(bytes[0]));

        // skip the first byte and the version field
        let buffer = DecoderBuffer::new(&bytes[5..]);
        let (packet, remaining) = VersionNegotiation::decode(buffer).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(packet.dcid, dcid);
        assert_eq!(packet.scid, scid);
        assert_eq!(packet.supported_versions, versions);
    }
}
