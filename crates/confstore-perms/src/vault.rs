//! Managed secret vault boundary.
//!
//! The vault is an external collaborator. [`SecretVault`] is the contract
//! the vault-based protector relies on; [`MemoryVault`] backs tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PermsError;

/// Errors reported by a vault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("secret {0} not found")]
    NotFound(String),

    #[error("access denied: {0}")]
    Unauthorized(String),

    #[error("vault unavailable: {0}")]
    Unavailable(String),
}

impl From<VaultError> for PermsError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::NotFound(name) => PermsError::SecretNotFound(name),
            VaultError::Unauthorized(msg) => PermsError::Unauthenticated(msg),
            VaultError::Unavailable(msg) => PermsError::VaultUnavailable(msg),
        }
    }
}

/// A named secret store.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Create or replace the secret stored under `name`.
    async fn set_secret(&self, name: &str, value: &str) -> Result<(), VaultError>;

    /// Fetch the secret stored under `name`.
    async fn get_secret(&self, name: &str) -> Result<String, VaultError>;

    /// Remove the secret stored under `name`. Removing a missing secret
    /// succeeds.
    async fn delete_secret(&self, name: &str) -> Result<(), VaultError>;
}

/// In-memory vault for tests.
#[derive(Debug, Default)]
pub struct MemoryVault {
    secrets: RwLock<HashMap<String, String>>,
    denied: AtomicBool,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as unauthorized.
    pub fn deny_access(&self) {
        self.denied.store(true, Ordering::Release);
    }

    /// Number of stored secrets.
    pub fn len(&self) -> usize {
        self.secrets.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_access(&self) -> Result<(), VaultError> {
        if self.denied.load(Ordering::Acquire) {
            return Err(VaultError::Unauthorized("vault credentials rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn set_secret(&self, name: &str, value: &str) -> Result<(), VaultError> {
        self.check_access()?;
        self.secrets
            .write()
            .map_err(|e| VaultError::Unavailable(e.to_string()))?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn get_secret(&self, name: &str) -> Result<String, VaultError> {
        self.check_access()?;
        self.secrets
            .read()
            .map_err(|e| VaultError::Unavailable(e.to_string()))?
            .get(name)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(name.to_string()))
    }

    async fn delete_secret(&self, name: &str) -> Result<(), VaultError> {
        self.check_access()?;
        self.secrets
            .write()
            .map_err(|e| VaultError::Unavailable(e.to_string()))?
            .remove(name);
        Ok(())
    }
}
