// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection::id::encode_cid_len,
    packet::{number, LongType, FIXED_BIT, LONG_HEADER_TAG},
    varint::VarInt,
    version::Version,
};
use core::convert::TryFrom;
use s2n_codec::Encoder;

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-17.2
//# Long Header Packet {
//#   Header Form (1) = 1,
//#   Fixed Bit (1) = 1,
//#   Long Packet Type (2),
//#   Type-Specific Bits (4),
//#   Version (32),
//#   DCID Len (4),
//#   SCID Len (4),
//#   Destination Connection ID (0..144),
//#   Source Connection ID (0..144),
//# }

/// Encodes a long header through the packet number.
///
/// `payload_len` is the sealed payload length (including the AEAD tag);
/// the Length field covers it plus the packet number bytes. The token is
/// only written for Initial packets.
pub fn encode<E: Encoder>(
    encoder: &mut E,
    packet_type: LongType,
    version: Version,
    dcid: &[u8],
    scid: &[u8],
    token: &[u8],
    payload_len: usize,
    packet_number: u64,
) {
    debug_assert!(!matches!(packet_type, LongType::Retry));

    let first_byte = LONG_HEADER_TAG
        | FIXED_BIT
        | ((packet_type as u8) << 4)
        | (number::SEND_LEN as u8 - 1);
    encoder.encode(&first_byte);
    encoder.encode(&version);
    encoder.encode(&((encode_cid_len(dcid.len()) << 4) | encode_cid_len(scid.len())));
    encoder.write_slice(dcid);
    encoder.write_slice(scid);

    if matches!(packet_type, LongType::Initial) {
        encoder.encode_with_len_prefix::<VarInt, _>(&token);
    }

    let length = VarInt::try_from(number::SEND_LEN + payload_len)
        .expect("packet length always fits in a varint");
    encoder.encode(&length);
    encoder.encode(&number::truncate(packet_number));
}
