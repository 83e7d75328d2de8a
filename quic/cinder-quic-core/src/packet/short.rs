// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::{number, FIXED_BIT};
use s2n_codec::Encoder;

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-17.3
//# Short Header Packet {
//#   Header Form (1) = 0,
//#   Fixed Bit (1) = 1,
//#   Spin Bit (1),
//#   Reserved Bits (2),
//#   Key Phase (1),
//#   Packet Number Length (2),
//#   Destination Connection ID (0..160),
//#   Packet Number (8..32),
//#   Packet Payload (..),
//# }

/// Encodes a short header through the packet number.
///
/// The destination connection id is written without a length; the
/// receiver knows the ids it issued. Spin bit and key phase stay zero.
pub fn encode<E: Encoder>(encoder: &mut E, dcid: &[u8], packet_number: u64) {
    let first_byte = FIXED_BIT | (number::SEND_LEN as u8 - 1);
    encoder.encode(&first_byte);
    encoder.write_slice(dcid);
    encoder.encode(&number::truncate(packet_number));
}
