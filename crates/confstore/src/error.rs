//! Error types for the service.

use confstore_core::{CoreError, ValidationError};
use confstore_perms::PermsError;
use confstore_store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A key, value, identifier, or version was malformed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The caller could not be identified.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller lacks the capability for this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The addressed record does not exist or is not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// A protected secret could not be recovered.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// The vault has no secret under the stored reference.
    #[error("secret not found: {0}")]
    SecretNotFound(String),

    /// The vault could not be reached.
    #[error("vault unavailable: {0}")]
    VaultUnavailable(String),

    /// A client with this id is already registered.
    #[error("client already exists: {0}")]
    ClientExists(String),

    /// Deployment configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A token could not be produced.
    #[error("token error: {0}")]
    Token(String),
}

impl From<PermsError> for Error {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::InvalidSecret(msg) => Error::InvalidSecret(msg),
            PermsError::SecretNotFound(name) => Error::SecretNotFound(name),
            PermsError::Unauthenticated(msg) => Error::Unauthenticated(msg),
            PermsError::VaultUnavailable(msg) => Error::VaultUnavailable(msg),
            PermsError::EncryptionError(msg) | PermsError::InvalidKey(msg) => Error::Config(msg),
            PermsError::Store(e) => Error::Store(e),
        }
    }
}

impl From<CoreError> for Error {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidVersion(v) => Error::Validation(ValidationError::InvalidVersion(v)),
            CoreError::InvalidContentHash(h) => {
                Error::Store(StoreError::InvalidData(format!("content hash {}", h)))
            }
            CoreError::UnknownKind(kind) => Error::NotFound(format!("value kind {}", kind)),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, Error>;
