// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{
    convert::{TryFrom, TryInto},
    fmt,
    ops::Deref,
};
use s2n_codec::{decoder_value, Encoder, EncoderValue};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-16
//# QUIC packets and frames commonly use a variable-length encoding for
//# non-negative integer values.  This encoding ensures that smaller
//# integer values need fewer bytes to encode.
//#
//# The QUIC variable-length integer encoding reserves the two most
//# significant bits of the first byte to encode the base 2 logarithm of
//# the integer encoding length in bytes.  The integer value is encoded
//# on the remaining bits, in network byte order.

pub const MAX_VARINT_VALUE: u64 = 4_611_686_018_427_387_903;

#[derive(Debug)]
pub struct VarIntError;

impl fmt::Display for VarIntError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "varint range exceeded")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VarIntError {}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct VarInt(u64);

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl VarInt {
    pub const MAX: Self = Self(MAX_VARINT_VALUE);

    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn new(v: u64) -> Result<Self, VarIntError> {
        if v > MAX_VARINT_VALUE {
            return Err(VarIntError);
        }
        Ok(Self(v))
    }

    pub const fn from_u8(v: u8) -> Self {
        Self(v as u64)
    }

    pub const fn from_u16(v: u16) -> Self {
        Self(v as u64)
    }

    pub const fn from_u32(v: u32) -> Self {
        Self(v as u64)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn checked_add(self, value: Self) -> Option<Self> {
        Self::new(self.0.checked_add(value.0)?).ok()
    }

    #[inline]
    pub fn checked_add_usize(self, value: usize) -> Option<Self> {
        let value: Self = value.try_into().ok()?;
        self.checked_add(value)
    }

    #[inline]
    #[must_use]
    pub fn saturating_add(self, value: Self) -> Self {
        Self::new(self.0.saturating_add(value.0)).unwrap_or(Self::MAX)
    }

    #[inline]
    pub fn checked_sub(self, value: Self) -> Option<Self> {
        Some(Self(self.0.checked_sub(value.0)?))
    }

    #[inline]
    #[must_use]
    pub fn saturating_sub(self, value: Self) -> Self {
        Self(self.0.saturating_sub(value.0))
    }

    /// Returns the number of bytes the value occupies on the wire
    #[inline]
    pub fn encoded_size(self) -> usize {
        match self.0 {
            0..=63 => 1,
            64..=16_383 => 2,
            16_384..=1_073_741_823 => 4,
            _ => 8,
        }
    }
}

impl Deref for VarInt {
    type Target = u64;

    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl From<VarInt> for u64 {
    fn from(v: VarInt) -> u64 {
        v.0
    }
}

impl From<u8> for VarInt {
    fn from(v: u8) -> Self {
        Self(v as u64)
    }
}

impl From<u16> for VarInt {
    fn from(v: u16) -> Self {
        Self(v as u64)
    }
}

impl From<u32> for VarInt {
    fn from(v: u32) -> Self {
        Self(v as u64)
    }
}

impl TryFrom<u64> for VarInt {
    type Error = VarIntError;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl TryFrom<usize> for VarInt {
    type Error = VarIntError;

    fn try_from(v: usize) -> Result<Self, Self::Error> {
        Self::new(v as u64)
    }
}

impl TryFrom<VarInt> for usize {
    type Error = VarIntError;

    fn try_from(v: VarInt) -> Result<Self, Self::Error> {
        v.0.try_into().map_err(|_| VarIntError)
    }
}

impl PartialEq<u64> for VarInt {
    fn eq(&self, other: &u64) -> bool {
        self.0.eq(other)
    }
}

impl PartialOrd<u64> for VarInt {
    fn partial_cmp(&self, other: &u64) -> Option<core::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl core::ops::Add for VarInt {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.checked_add(rhs).expect("varint add overflow")
    }
}

impl core::ops::Sub for VarInt {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.checked_sub(rhs).expect("varint sub underflow")
    }
}

decoder_value!(
    impl<'a> VarInt {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (first, buffer) = buffer.decode::<u8>()?;
            let length = 1usize << (first >> 6);
            let mut value = (first & 0b0011_1111) as u64;
            let (rest, buffer) = buffer.decode_slice(length - 1)?;
            let rest: &[u8] = rest.into_less_safe_slice();
            for byte in rest {
                value = (value << 8) | *byte as u64;
            }
            Ok((VarInt(value), buffer))
        }
    }
);

impl EncoderValue for VarInt {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let v = self.0;
        match self.encoded_size() {
            1 => encoder.write_slice(&[v as u8]),
            2 => encoder.write_slice(&((v as u16) | (0b01 << 14)).to_be_bytes()),
            4 => encoder.write_slice(&((v as u32) | (0b10 << 30)).to_be_bytes()),
            _ => encoder.write_slice(&(v | (0b11 << 62)).to_be_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;
    use s2n_codec::{DecoderBuffer, EncoderBuffer};

    fn round_trip(value: u64) {
        let value = match VarInt::new(value) {
            Ok(value) => value,
            Err(_) => return,
        };

        let mut bytes = [0u8; 8];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        encoder.encode(&value);
        let len = encoder.len();
        assert_eq!(len, value.encoded_size());

        let buffer = DecoderBuffer::new(&bytes[..len]);
        let (decoded, remaining) = buffer.decode::<VarInt>().unwrap();
        assert!(remaining.is_empty());
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trip_test() {
        check!().with_type::<u64>().cloned().for_each(round_trip);
    }

    #[test]
    fn boundary_test() {
        for value in [
            0,
            63,
            64,
            16_383,
            16_384,
            1_073_741_823,
            1_073_741_824,
            MAX_VARINT_VALUE,
        ] {
            round_trip(value);
        }
        assert!(VarInt::new(MAX_VARINT_VALUE + 1).is_err());
    }

    #[test]
    fn known_encodings_test() {
        // examples from the transport draft
        let cases: &[(&[u8], u64)] = &[
            (&[0x25], 37),
            (&[0x40, 0x25], 37),
            (&[0x7b, 0xbd], 15_293),
            (&[0x9d, 0x7f, 0x3e, 0x7d], 494_878_333),
            (
                &[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c],
                151_288_809_941_952_652,
            ),
        ];

        for (bytes, expected) in cases {
            let (value, _) = DecoderBuffer::new(bytes).decode::<VarInt>().unwrap();
            assert_eq!(value.as_u64(), *expected);
        }
    }
}
