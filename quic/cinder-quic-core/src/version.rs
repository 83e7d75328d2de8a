// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use s2n_codec::{decoder_value, Encoder, EncoderValue};

/// A QUIC protocol version
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    pub const DRAFT_17: Self = Self(0xff00_0011);
    pub const DRAFT_18: Self = Self(0xff00_0012);
    pub const DRAFT_19: Self = Self(0xff00_0013);
    pub const DRAFT_20: Self = Self(0xff00_0014);

    /// Marker version used by Version Negotiation packets
    pub const NEGOTIATION: Self = Self(0);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_supported(self) -> bool {
        SUPPORTED_VERSIONS.contains(&self)
    }

    /// The draft number, for versions in the draft range
    #[inline]
    pub fn draft(self) -> Option<u32> {
        if (self.0 & 0xff00_0000) == 0xff00_0000 {
            Some(self.0 & 0x00ff_ffff)
        } else {
            None
        }
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.draft() {
            Some(draft) => write!(f, "draft-{draft}"),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

/// Versions this stack implements, in preference order
pub const SUPPORTED_VERSIONS: [Version; 4] = [
    Version::DRAFT_20,
    Version::DRAFT_19,
    Version::DRAFT_18,
    Version::DRAFT_17,
];

decoder_value!(
    impl<'a> Version {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (version, buffer) = buffer.decode::<u32>()?;
            Ok((Version(version), buffer))
        }
    }
);

impl EncoderValue for Version {
    #[inline]
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        encoder.encode(&self.0);
    }
}
