// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::varint::{VarInt, VarIntError};
use core::fmt;
use s2n_codec::DecoderError;

//= https://tools.ietf.org/html/draft-ietf-quic-transport-20#section-20
//# QUIC error codes are 62-bit unsigned integers.
//#
//# This section lists the defined QUIC transport error codes that may be
//# used in a CONNECTION_CLOSE frame.  These errors apply to the entire
//# connection.

/// A connection-level protocol error, surfaced to the peer as
/// CONNECTION_CLOSE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransportError {
    pub code: VarInt,
    pub frame_type: Option<VarInt>,
    pub reason: &'static str,
}

/// Internal convenience macro for defining standard error codes
macro_rules! def_error {
    ($doc:expr, $name:ident, $code:expr) => {
        impl TransportError {
            #[doc = $doc]
            pub const $name: Self = Self::from_code(VarInt::from_u16($code));
        }
    };
}

def_error!(
    "An endpoint uses this with CONNECTION_CLOSE to signal that the connection is being closed abruptly in the absence of any error.",
    NO_ERROR,
    0x0
);
def_error!(
    "The endpoint encountered an internal error and cannot continue with the connection.",
    INTERNAL_ERROR,
    0x1
);
def_error!(
    "An endpoint received more data than it permitted in its advertised data limits.",
    FLOW_CONTROL_ERROR,
    0x3
);
def_error!(
    "An endpoint received a frame for a stream identifier that exceeded its advertised stream limit for the corresponding stream type.",
    STREAM_LIMIT_ERROR,
    0x4
);
def_error!(
    "An endpoint received a frame for a stream that was not in a state that permitted that frame.",
    STREAM_STATE_ERROR,
    0x5
);
def_error!(
    "An endpoint received a STREAM frame containing data that exceeded the previously established final size.",
    FINAL_SIZE_ERROR,
    0x6
);
def_error!(
    "An endpoint received a frame that was badly formatted.",
    FRAME_ENCODING_ERROR,
    0x7
);
def_error!(
    "An endpoint received transport parameters that were badly formatted.",
    TRANSPORT_PARAMETER_ERROR,
    0x8
);
def_error!(
    "An endpoint detected an error with protocol compliance that was not covered by more specific error codes.",
    PROTOCOL_VIOLATION,
    0xA
);

impl TransportError {
    pub const fn from_code(code: VarInt) -> Self {
        Self {
            code,
            frame_type: None,
            reason: "",
        }
    }

    /// Creates a crypto-level error from a TLS alert code
    #[inline]
    pub fn crypto_error(alert: u8) -> Self {
        Self::from_code(VarInt::from_u16(0x100 | alert as u16))
    }

    pub const fn with_frame_type(mut self, frame_type: VarInt) -> Self {
        self.frame_type = Some(frame_type);
        self
    }

    pub const fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = reason;
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "TransportError({})", self.code)
        } else {
            f.write_str(self.reason)
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

impl From<DecoderError> for TransportError {
    fn from(decoder_error: DecoderError) -> Self {
        match decoder_error {
            DecoderError::InvariantViolation(reason) => {
                Self::PROTOCOL_VIOLATION.with_reason(reason)
            }
            _ => Self::FRAME_ENCODING_ERROR.with_reason("malformed frame"),
        }
    }
}

impl From<VarIntError> for TransportError {
    fn from(_: VarIntError) -> Self {
        Self::INTERNAL_ERROR.with_reason("varint encoding limit exceeded")
    }
}
