//! Protocol errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while framing or (de)serializing protocol messages.
///
/// All of these are fatal for the offending frame only. The runtime drops the
/// stream that produced it; other sessions are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than the length prefix (or the prefix itself) requires
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Declared or actual payload exceeds the configured limit
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size in bytes
        size: usize,
        /// Limit in effect
        max: usize,
    },

    /// Payload is not a valid CBOR encoding of the expected message
    #[error("CBOR error: {0}")]
    Cbor(String),
}
