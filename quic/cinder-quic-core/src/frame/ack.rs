// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{ack::AckRanges, frame::Tag, varint::VarInt};
use core::{convert::TryFrom, ops::RangeInclusive};
use s2n_codec::{
    decoder_invariant, decoder_parameterized_value, decoder_value, Encoder, EncoderValue,
};

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-19.3
//# Receivers send ACK frames (types 0x02 and 0x03) to inform senders of
//# packets they have received and processed.  The ACK frame contains one
//# or more ACK Ranges.  ACK Ranges identify acknowledged packets.  If
//# the frame type is 0x03, ACK frames also contain the sum of QUIC
//# packets with associated ECN marks received on the connection up until
//# this point.

const ACK_TAG: Tag = 0x02;
const ACK_ECN_TAG: Tag = 0x03;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    /// The acknowledgement delay in microseconds, before scaling
    pub ack_delay: VarInt,

    /// Acknowledged runs of packet numbers, largest first
    pub ranges: Vec<RangeInclusive<u64>>,

    /// ECN counts, present only for the 0x03 variant
    pub ecn_counts: Option<EcnCounts>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect_0: VarInt,
    pub ect_1: VarInt,
    pub ce: VarInt,
}

impl Ack {
    pub fn tag(&self) -> Tag {
        if self.ecn_counts.is_some() {
            ACK_ECN_TAG
        } else {
            ACK_TAG
        }
    }

    pub fn largest_acknowledged(&self) -> u64 {
        self.ranges.first().map(|r| *r.end()).unwrap_or(0)
    }

    /// Builds an ACK frame from the receive-side range set
    pub fn from_ack_ranges(ranges: &AckRanges, ack_delay: VarInt) -> Option<Self> {
        if ranges.is_empty() {
            return None;
        }
        Some(Self {
            ack_delay,
            ranges: ranges.iter_descending().collect(),
            ecn_counts: None,
        })
    }
}

decoder_value!(
    impl<'a> EcnCounts {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (ect_0, buffer) = buffer.decode()?;
            let (ect_1, buffer) = buffer.decode()?;
            let (ce, buffer) = buffer.decode()?;
            Ok((EcnCounts { ect_0, ect_1, ce }, buffer))
        }
    }
);

impl EncoderValue for EcnCounts {
    #[inline]
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.ect_0);
        buffer.encode(&self.ect_1);
        buffer.encode(&self.ce);
    }
}

decoder_parameterized_value!(
    impl<'a> Ack {
        fn decode(tag: Tag, buffer: Buffer) -> Result<Self> {
            let (largest_acknowledged, buffer) = buffer.decode::<VarInt>()?;
            let (ack_delay, buffer) = buffer.decode::<VarInt>()?;
            let (range_count, buffer) = buffer.decode::<VarInt>()?;
            let (first_range, buffer) = buffer.decode::<VarInt>()?;

            let largest = largest_acknowledged.as_u64();
            let smallest = largest.checked_sub(first_range.as_u64());
            decoder_invariant!(smallest.is_some(), "invalid first ACK range");
            let mut smallest = smallest.unwrap_or_default();

            // the count is unvalidated; each claimed range still costs at
            // least two bytes of frame, so cap the pre-allocation
            let capacity = (range_count.as_u64() as usize).min(buffer.len() / 2) + 1;
            let mut ranges = Vec::with_capacity(capacity);
            ranges.push(smallest..=largest);

            let mut buffer = buffer;
            for _ in 0..range_count.as_u64() {
                let (gap, rest) = buffer.decode::<VarInt>()?;
                let (length, rest) = rest.decode::<VarInt>()?;

                // gap and length count packets below the previous range
                let end = smallest
                    .checked_sub(gap.as_u64())
                    .and_then(|v| v.checked_sub(2));
                decoder_invariant!(end.is_some(), "invalid ACK range gap");
                let end = end.unwrap_or_default();

                let start = end.checked_sub(length.as_u64());
                decoder_invariant!(start.is_some(), "invalid ACK range length");
                smallest = start.unwrap_or_default();

                ranges.push(smallest..=end);
                buffer = rest;
            }

            let (ecn_counts, buffer) = if tag == ACK_ECN_TAG {
                let (ecn_counts, buffer) = buffer.decode()?;
                (Some(ecn_counts), buffer)
            } else {
                (None, buffer)
            };

            let frame = Ack {
                ack_delay,
                ranges,
                ecn_counts,
            };

            Ok((frame, buffer))
        }
    }
);

impl EncoderValue for Ack {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        debug_assert!(!self.ranges.is_empty(), "ACK frames require a range");

        buffer.encode(&self.tag());

        let mut iter = self.ranges.iter();
        let first = iter.next().expect("at least one ack range is required");
        let (mut smallest, largest) = (*first.start(), *first.end());

        buffer.encode(&VarInt::try_from(largest).unwrap_or(VarInt::MAX));
        buffer.encode(&self.ack_delay);
        buffer.encode(&VarInt::try_from(self.ranges.len() - 1).unwrap_or(VarInt::MAX));
        buffer.encode(&VarInt::try_from(largest - smallest).unwrap_or(VarInt::MAX));

        for range in iter {
            let gap = smallest - *range.end() - 2;
            let length = *range.end() - *range.start();
            buffer.encode(&VarInt::try_from(gap).unwrap_or(VarInt::MAX));
            buffer.encode(&VarInt::try_from(length).unwrap_or(VarInt::MAX));
            smallest = *range.start();
        }

        if let Some(ecn_counts) = self.ecn_counts.as_ref() {
            buffer.encode(ecn_counts);
        }
    }
}
