// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection::id::{decode_cid_len, encode_cid_len},
    packet::{LongType, FIXED_BIT, LONG_HEADER_TAG},
    version::Version,
};
use s2n_codec::{DecoderBuffer, DecoderBufferResult, Encoder, EncoderBuffer};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-17.2.5
//# A Retry packet uses a long packet header with a type value of 0x3.
//# It carries an "unused" field and the connection ID of the packet that
//# triggered the Retry, the Original Destination Connection ID.

/// A Retry packet.
///
/// These drafts carry the ODCID length in the low four bits of the first
/// byte and have no integrity tag; the token runs to the end of the
/// datagram.
#[derive(Debug, PartialEq, Eq)]
pub struct Retry<'a> {
    pub version: Version,
    pub dcid: &'a [u8],
    pub scid: &'a [u8],
    pub odcid: &'a [u8],
    pub token: &'a [u8],
}

impl<'a> Retry<'a> {
    /// Decodes the packet following the first byte, which carries the
    /// ODCID length nibble.
    pub fn decode(first_byte: u8, buffer: DecoderBuffer<'a>) -> DecoderBufferResult<'a, Self> {
        let (version, buffer) = buffer.decode::<Version>()?;
        let (cid_lens, buffer) = buffer.decode::<u8>()?;
        let (dcid, buffer) = buffer.decode_slice(decode_cid_len(cid_lens >> 4))?;
        let (scid, buffer) = buffer.decode_slice(decode_cid_len(cid_lens & 0x0f))?;
        let (odcid, buffer) = buffer.decode_slice(decode_cid_len(first_byte & 0x0f))?;
        let token_len = buffer.len();
        let (token, buffer) = buffer.decode_slice(token_len)?;

        let packet = Retry {
            version,
            dcid: dcid.into_less_safe_slice(),
            scid: scid.into_less_safe_slice(),
            odcid: odcid.into_less_safe_slice(),
            token: token.into_less_safe_slice(),
        };

        Ok((packet, buffer))
    }

    /// Builds a complete Retry datagram
    pub fn encode_to_vec(
        version: Version,
        dcid: &[u8],
        scid: &[u8],
        odcid: &[u8],
        token: &[u8],
    ) -> Vec<u8> {
        let capacity = 6 + dcid.len() + scid.len() + odcid.len() + token.len();
        let mut bytes = vec![0u8; capacity];
        let mut encoder = EncoderBuffer::new(&mut bytes);

        let first_byte = LONG_HEADER_TAG
            | FIXED_BIT
            | ((LongType::Retry as u8) << 4)
            | encode_cid_len(odcid.len());
        encoder.encode(&first_byte);
        encoder.encode(&version);
        encoder.encode(&((encode_cid_len(dcid.len()) << 4) | encode_cid_len(scid.len())));
        encoder.write_slice(dcid);
        encoder.write_slice(scid);
        encoder.write_slice(odcid);
        encoder.write_slice(token);

        let len = encoder.len();
        bytes.truncate(len);
        bytes
    }
}
