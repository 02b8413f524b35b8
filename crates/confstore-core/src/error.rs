//! Error types for Confstore Core.

use thiserror::Error;

/// Core errors raised while decoding primitive types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid version id: {0}")]
    InvalidVersion(String),

    #[error("invalid content hash: {0}")]
    InvalidContentHash(String),

    #[error("unknown value kind: {0}")]
    UnknownKind(String),
}

/// Validation errors for keys, values, and identifiers.
///
/// These are raised before any store call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum length of {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} contains invalid character {ch:?} at position {position}")]
    InvalidCharacter {
        field: &'static str,
        ch: char,
        position: usize,
    },

    #[error("invalid version id: {0}")]
    InvalidVersion(String),
}

