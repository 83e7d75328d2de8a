// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Offset-addressed reassembly for CRYPTO and STREAM data.
//!
//! Fragments may arrive out of order and overlapping; duplicate bytes
//! are discarded silently, while overlapping bytes that disagree are a
//! protocol error. A FIN fixes the final size.

use cinder_quic_core::transport::TransportError;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct Reassembler {
    /// Bytes already handed to the consumer
    delivered: u64,

    /// Out-of-order fragments, keyed by absolute offset; entries never
    /// start below `delivered`
    fragments: BTreeMap<u64, Vec<u8>>,

    /// Highest offset seen, for flow control accounting
    highest: u64,

    final_size: Option<u64>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highest_offset(&self) -> u64 {
        self.highest
    }

    pub fn final_size(&self) -> Option<u64> {
        self.final_size
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// All bytes through the final size have been delivered
    pub fn is_complete(&self) -> bool {
        self.final_size == Some(self.delivered)
    }

    /// Number of contiguous bytes available at the read offset
    pub fn contiguous_len(&self) -> usize {
        let mut cursor = self.delivered;
        for (offset, fragment) in &self.fragments {
            if *offset > cursor {
                break;
            }
            cursor = cursor.max(*offset + fragment.len() as u64);
        }
        (cursor - self.delivered) as usize
    }

    /// Contiguous bytes are ready at the read offset
    pub fn has_data(&self) -> bool {
        self.fragments
            .first_key_value()
            .map_or(false, |(offset, fragment)| {
                *offset <= self.delivered && *offset + fragment.len() as u64 > self.delivered
            })
    }

    /// Accepts a fragment at `offset`, optionally fixing the final size
    pub fn write_at(
        &mut self,
        offset: u64,
        data: &[u8],
        fin: bool,
    ) -> Result<(), TransportError> {
        let end = offset + data.len() as u64;

        if fin {
            match self.final_size {
                Some(final_size) if final_size != end => {
                    return Err(TransportError::FINAL_SIZE_ERROR
                        .with_reason("conflicting final size"));
                }
                _ => {
                    if end < self.highest {
                        return Err(TransportError::FINAL_SIZE_ERROR
                            .with_reason("final size below received data"));
                    }
                    self.final_size = Some(end);
                }
            }
        }

        if let Some(final_size) = self.final_size {
            if end > final_size {
                return Err(
                    TransportError::FINAL_SIZE_ERROR.with_reason("data beyond final size")
                );
            }
        }

        self.highest = self.highest.max(end);

        // trim the prefix the consumer already has
        let (offset, data) = if offset < self.delivered {
            let skip = (self.delivered - offset) as usize;
            if skip >= data.len() {
                return Ok(());
            }
            (self.delivered, &data[skip..])
        } else {
            (offset, data)
        };
        let end = offset + data.len() as u64;

        // compare against buffered fragments and collect the gaps
        let mut inserts: Vec<(u64, Vec<u8>)> = Vec::new();
        let mut cursor = offset;

        let overlapping: Vec<u64> = self
            .fragments
            .range(..end)
            .filter(|(frag_offset, fragment)| **frag_offset + fragment.len() as u64 > offset)
            .map(|(frag_offset, _)| *frag_offset)
            .collect();

        for frag_offset in overlapping {
            let fragment = &self.fragments[&frag_offset];
            let frag_end = frag_offset + fragment.len() as u64;

            let overlap_start = cursor.max(frag_offset);
            let overlap_end = end.min(frag_end);
            if overlap_start < overlap_end {
                let new_bytes =
                    &data[(overlap_start - offset) as usize..(overlap_end - offset) as usize];
                let old_bytes = &fragment
                    [(overlap_start - frag_offset) as usize..(overlap_end - frag_offset) as usize];
                if new_bytes != old_bytes {
                    return Err(TransportError::PROTOCOL_VIOLATION
                        .with_reason("overlapping stream data does not match"));
                }
            }

            if frag_offset > cursor {
                let gap_end = frag_offset.min(end);
                if cursor < gap_end {
                    inserts.push((
                        cursor,
                        data[(cursor - offset) as usize..(gap_end - offset) as usize].to_vec(),
                    ));
                }
            }

            cursor = cursor.max(frag_end);
        }

        if cursor < end {
            inserts.push((cursor, data[(cursor - offset) as usize..].to_vec()));
        }

        for (insert_offset, bytes) in inserts {
            self.fragments.insert(insert_offset, bytes);
        }

        Ok(())
    }

    /// Pops up to `max` contiguous bytes from the read offset
    pub fn pop(&mut self, max: Option<usize>) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        let limit = max.unwrap_or(usize::MAX);

        while out.len() < limit {
            let (frag_offset, fragment) = match self.fragments.pop_first() {
                Some(entry) => entry,
                None => break,
            };

            if frag_offset > self.delivered {
                self.fragments.insert(frag_offset, fragment);
                break;
            }

            let skip = (self.delivered - frag_offset) as usize;
            if skip >= fragment.len() {
                continue;
            }

            let available = &fragment[skip..];
            let take = available.len().min(limit - out.len());
            out.extend_from_slice(&available[..take]);
            self.delivered += take as u64;

            if take < available.len() {
                // keep the tail for the next read
                let rest = available[take..].to_vec();
                self.fragments.insert(self.delivered, rest);
                break;
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}
