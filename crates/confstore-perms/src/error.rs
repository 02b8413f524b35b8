//! Permission and secret protection errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermsError {
    /// A protected secret could not be decoded or decrypted.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// The vault has no secret under this reference.
    #[error("secret not found: {0}")]
    SecretNotFound(String),

    /// The vault rejected our credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The vault could not be reached.
    #[error("vault unavailable: {0}")]
    VaultUnavailable(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Key material is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("store error: {0}")]
    Store(#[from] confstore_store::StoreError),
}

pub type Result<T> = std::result::Result<T, PermsError>;
