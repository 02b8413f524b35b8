//! Storage errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row could not be encoded to or decoded from CBOR.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A row decoded but breaks an invariant of its table.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Poisoned lock or closed connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("migration error: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
