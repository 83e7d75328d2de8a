// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::ops::RangeInclusive;

/// A set of received packet numbers, kept as sorted disjoint runs.
///
/// Contiguous packet numbers compress to a single range, which maps
/// directly onto the ACK frame's First ACK Range / Gap / Range encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AckRanges {
    // ascending order, disjoint, never adjacent
    ranges: Vec<RangeInclusive<u64>>,
}

impl AckRanges {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[inline]
    pub fn largest(&self) -> Option<u64> {
        self.ranges.last().map(|r| *r.end())
    }

    #[inline]
    pub fn contains(&self, packet_number: u64) -> bool {
        self.ranges.iter().any(|r| r.contains(&packet_number))
    }

    /// Number of distinct runs
    #[inline]
    pub fn interval_len(&self) -> usize {
        self.ranges.len()
    }

    /// Inserts a packet number, merging adjacent runs
    pub fn insert(&mut self, packet_number: u64) {
        let pn = packet_number;
        let pos = self.ranges.partition_point(|r| *r.end() < pn);

        // the run at `pos` is the first one ending at or after pn
        if let Some(range) = self.ranges.get(pos) {
            if range.contains(&pn) {
                return;
            }
        }

        let merges_prev = pos > 0 && *self.ranges[pos - 1].end() + 1 == pn;
        let merges_next = self
            .ranges
            .get(pos)
            .map_or(false, |r| pn + 1 == *r.start());

        match (merges_prev, merges_next) {
            (true, true) => {
                let end = *self.ranges[pos].end();
                self.ranges[pos - 1] = *self.ranges[pos - 1].start()..=end;
                self.ranges.remove(pos);
            }
            (true, false) => {
                self.ranges[pos - 1] = *self.ranges[pos - 1].start()..=pn;
            }
            (false, true) => {
                self.ranges[pos] = pn..=*self.ranges[pos].end();
            }
            (false, false) => {
                self.ranges.insert(pos, pn..=pn);
            }
        }
    }

    /// Iterates runs from the largest packet number down, the order the
    /// ACK frame encodes them in
    pub fn iter_descending(&self) -> impl Iterator<Item = RangeInclusive<u64>> + '_ {
        self.ranges.iter().rev().cloned()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(ranges: &AckRanges) -> Vec<(u64, u64)> {
        ranges
            .iter_descending()
            .map(|r| (*r.start(), *r.end()))
            .collect()
    }

    #[test]
    fn run_compression_test() {
        let mut ranges = AckRanges::new();
        for pn in [0, 1, 2, 5, 6, 9] {
            ranges.insert(pn);
        }
        assert_eq!(collect(&ranges), [(9, 9), (5, 6), (0, 2)]);
        assert_eq!(ranges.largest(), Some(9));

        // filling a gap merges the neighbors
        ranges.insert(7);
        ranges.insert(8);
        assert_eq!(collect(&ranges), [(5, 9), (0, 2)]);
        ranges.insert(3);
        ranges.insert(4);
        assert_eq!(collect(&ranges), [(0, 9)]);
    }

    #[test]
    fn duplicate_insert_test() {
        let mut ranges = AckRanges::new();
        ranges.insert(4);
        ranges.insert(4);
        assert_eq!(collect(&ranges), [(4, 4)]);
        assert!(ranges.contains(4));
        assert!(!ranges.contains(5));
    }

    #[test]
    fn out_of_order_insert_test() {
        let mut ranges = AckRanges::new();
        for pn in [9, 0, 4, 2, 1, 3] {
            ranges.insert(pn);
        }
        assert_eq!(collect(&ranges), [(9, 9), (0, 4)]);
    }
}
