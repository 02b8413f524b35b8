//! Error types for the sync module.

use thiserror::Error;

/// Errors reported by a value source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The service could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The service rejected our credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The service answered with an error.
    #[error("source error: {0}")]
    Source(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
