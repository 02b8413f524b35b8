//! Secret protection strategies.
//!
//! A [`SecretProtector`] turns a client secret into the opaque string that
//! is persisted, and back. The protected form is meaningless without the
//! deployment's key or vault access.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptionKey;
use crate::error::{PermsError, Result};
use crate::vault::SecretVault;

/// Converts secrets to and from their persisted form.
#[async_trait]
pub trait SecretProtector: Send + Sync {
    /// Produce the persisted form of `plaintext`.
    async fn protect(&self, plaintext: &str) -> Result<String>;

    /// Recover the plaintext from a value produced by [`protect`](Self::protect).
    async fn unprotect(&self, protected: &str) -> Result<String>;

    /// Release whatever backs a protected value that is no longer stored.
    async fn discard(&self, _protected: &str) -> Result<()> {
        Ok(())
    }
}

/// Protects secrets by authenticated encryption under a deployment key.
///
/// The persisted form is `base64(nonce || ciphertext)`.
#[derive(Debug, Clone)]
pub struct EncryptionProtector {
    key: EncryptionKey,
}

impl EncryptionProtector {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl SecretProtector for EncryptionProtector {
    async fn protect(&self, plaintext: &str) -> Result<String> {
        Ok(STANDARD.encode(self.key.seal(plaintext.as_bytes())?))
    }

    async fn unprotect(&self, protected: &str) -> Result<String> {
        let sealed = STANDARD
            .decode(protected)
            .map_err(|e| PermsError::InvalidSecret(e.to_string()))?;
        let plaintext = self.key.open(&sealed)?;
        String::from_utf8(plaintext).map_err(|e| PermsError::InvalidSecret(e.to_string()))
    }
}

/// Protects secrets by storing them in a [`SecretVault`].
///
/// The persisted form is the name of the vault entry.
pub struct VaultProtector {
    vault: Arc<dyn SecretVault>,
    name_prefix: String,
}

impl VaultProtector {
    pub fn new(vault: Arc<dyn SecretVault>, name_prefix: impl Into<String>) -> Self {
        Self {
            vault,
            name_prefix: name_prefix.into(),
        }
    }

    fn fresh_name(&self) -> String {
        let mut suffix = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut suffix);
        format!("{}-{}", self.name_prefix, hex::encode(suffix))
    }
}

#[async_trait]
impl SecretProtector for VaultProtector {
    async fn protect(&self, plaintext: &str) -> Result<String> {
        let name = self.fresh_name();
        self.vault.set_secret(&name, plaintext).await?;
        tracing::debug!(name = %name, "secret stored in vault");
        Ok(name)
    }

    async fn unprotect(&self, protected: &str) -> Result<String> {
        Ok(self.vault.get_secret(protected).await?)
    }

    async fn discard(&self, protected: &str) -> Result<()> {
        self.vault.delete_secret(protected).await?;
        tracing::debug!(name = %protected, "secret removed from vault");
        Ok(())
    }
}

/// Which protection strategy a deployment uses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum ProtectionConfig {
    /// Encrypt under a base64-encoded 32-byte key.
    Encryption { key: String },
    /// Keep secrets in the vault under names starting with `name_prefix`.
    Vault { name_prefix: String },
}

impl std::fmt::Debug for ProtectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionConfig::Encryption { .. } => f.write_str("Encryption { .. }"),
            ProtectionConfig::Vault { name_prefix } => f
                .debug_struct("Vault")
                .field("name_prefix", name_prefix)
                .finish(),
        }
    }
}

impl ProtectionConfig {
    /// Check that the configuration can be turned into a protector.
    pub fn validate(&self) -> Result<()> {
        match self {
            ProtectionConfig::Encryption { key } => EncryptionKey::from_base64(key).map(|_| ()),
            ProtectionConfig::Vault { name_prefix } if name_prefix.is_empty() => Err(
                PermsError::InvalidKey("vault name prefix must not be empty".into()),
            ),
            ProtectionConfig::Vault { .. } => Ok(()),
        }
    }

    /// Build the configured protector. The vault strategy needs `vault`.
    pub fn build(&self, vault: Option<Arc<dyn SecretVault>>) -> Result<Arc<dyn SecretProtector>> {
        match self {
            ProtectionConfig::Encryption { key } => Ok(Arc::new(EncryptionProtector::new(
                EncryptionKey::from_base64(key)?,
            ))),
            ProtectionConfig::Vault { name_prefix } => {
                let vault = vault.ok_or_else(|| {
                    PermsError::VaultUnavailable("no vault client configured".into())
                })?;
                Ok(Arc::new(VaultProtector::new(vault, name_prefix.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_encryption_roundtrip() {
        let protector = EncryptionProtector::new(EncryptionKey::generate());
        let protected = protector.protect("hunter2").await.unwrap();
        assert!(!protected.contains("hunter2"));
        assert_eq!(protector.unprotect(&protected).await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn test_encryption_is_randomized() {
        let protector = EncryptionProtector::new(EncryptionKey::generate());
        let a = protector.protect("same").await.unwrap();
        let b = protector.protect("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_encryption_detects_tampering() {
        let protector = EncryptionProtector::new(EncryptionKey::generate());
        let protected = protector.protect("hunter2").await.unwrap();

        let mut blob = STANDARD.decode(&protected).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = STANDARD.encode(blob);

        assert!(matches!(
            protector.unprotect(&tampered).await,
            Err(PermsError::InvalidSecret(_))
        ));
        assert!(matches!(
            protector.unprotect("%%%").await,
            Err(PermsError::InvalidSecret(_))
        ));
        assert!(matches!(
            protector.unprotect("AAAA").await,
            Err(PermsError::InvalidSecret(_))
        ));
    }

    #[tokio::test]
    async fn test_encryption_wrong_key() {
        let a = EncryptionProtector::new(EncryptionKey::generate());
        let b = EncryptionProtector::new(EncryptionKey::generate());
        let protected = a.protect("hunter2").await.unwrap();
        assert!(matches!(
            b.unprotect(&protected).await,
            Err(PermsError::InvalidSecret(_))
        ));
    }

    #[tokio::test]
    async fn test_vault_roundtrip() {
        let vault = Arc::new(MemoryVault::new());
        let protector = VaultProtector::new(vault.clone(), "clients");

        let reference = protector.protect("hunter2").await.unwrap();
        assert!(reference.starts_with("clients-"));
        assert!(!reference.contains("hunter2"));
        assert_eq!(protector.unprotect(&reference).await.unwrap(), "hunter2");
        assert_eq!(vault.len(), 1);
    }

    #[tokio::test]
    async fn test_vault_discard_removes_entry() {
        let vault = Arc::new(MemoryVault::new());
        let protector = VaultProtector::new(vault.clone(), "clients");

        let reference = protector.protect("hunter2").await.unwrap();
        protector.discard(&reference).await.unwrap();
        assert!(vault.is_empty());
        assert!(matches!(
            protector.unprotect(&reference).await,
            Err(PermsError::SecretNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_vault_errors_map() {
        let vault = Arc::new(MemoryVault::new());
        let protector = VaultProtector::new(vault.clone(), "clients");

        assert!(matches!(
            protector.unprotect("clients-missing").await,
            Err(PermsError::SecretNotFound(_))
        ));

        vault.deny_access();
        assert!(matches!(
            protector.protect("x").await,
            Err(PermsError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_config_json_shape() {
        let json = r#"{"strategy":"vault","name_prefix":"clients"}"#;
        let config: ProtectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config,
            ProtectionConfig::Vault {
                name_prefix: "clients".into()
            }
        );
        assert!(config.build(None).is_err());
        assert!(config.build(Some(Arc::new(MemoryVault::new()))).is_ok());
    }

    #[test]
    fn test_config_validates_key() {
        let good = ProtectionConfig::Encryption {
            key: EncryptionKey::generate().to_base64(),
        };
        assert!(good.validate().is_ok());

        let bad = ProtectionConfig::Encryption {
            key: STANDARD.encode([0u8; 8]),
        };
        assert!(matches!(bad.validate(), Err(PermsError::InvalidKey(_))));
    }

    proptest! {
        #[test]
        fn prop_encryption_roundtrip(secret in ".{0,200}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let protector = EncryptionProtector::new(EncryptionKey::from_bytes([9u8; 32]));
            let out = rt.block_on(async {
                let protected = protector.protect(&secret).await.unwrap();
                protector.unprotect(&protected).await.unwrap()
            });
            prop_assert_eq!(out, secret);
        }
    }
}
