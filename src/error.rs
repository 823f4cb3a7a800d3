//! Error types
//!
//! Internal causes stay typed so they can be logged locally, but everything
//! that crosses the protocol boundary collapses into [`RmaError`]. An operator
//! probing the device learns "rate limited", "internal error" or "denied" and
//! nothing about which step failed.

use thiserror::Error;

/// Errors returned by the challenge/response core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RmaError {
    /// A challenge was requested before the minimum interval elapsed.
    #[error("challenge requested too soon")]
    RateLimited,

    /// Identity lookup, key exchange or encoding failed.
    #[error("internal error")]
    Internal,

    /// Wrong authcode, or no redeemable challenge.
    #[error("access denied")]
    AccessDenied,
}

/// Base32 encoding/decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The destination cannot hold the encoded or decoded output.
    #[error("destination too small: need {needed}, have {capacity}")]
    DestinationTooSmall {
        /// Required size (characters when encoding, bytes when decoding).
        needed: usize,
        /// Size of the destination buffer.
        capacity: usize,
    },

    /// The source holds fewer bits than requested.
    #[error("source too short: need {needed_bits} bits, have {available_bits}")]
    SourceTooShort {
        /// Bits requested.
        needed_bits: usize,
        /// Bits actually present in the source.
        available_bits: usize,
    },

    /// A character outside the base32 alphabet.
    #[error("invalid character {0:#04x}")]
    InvalidCharacter(u8),

    /// Text carries a different number of symbols than the record needs.
    #[error("expected {expected} symbols, got {actual}")]
    SymbolCount { expected: usize, actual: usize },

    /// The challenge record could not be laid out or parsed.
    #[error("malformed challenge record")]
    Layout,
}

/// Failures of the external identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The board id has not been provisioned.
    #[error("board id unavailable")]
    BoardIdUnavailable,
}

/// Result alias for the protocol core.
pub type RmaResult<T> = Result<T, RmaError>;
