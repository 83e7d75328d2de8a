// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Types and utilities around the QUIC Stream identifier

pub mod id;

pub use id::StreamId;

/// The type of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

impl StreamType {
    #[inline]
    pub fn is_bidirectional(self) -> bool {
        matches!(self, StreamType::Bidirectional)
    }
}
