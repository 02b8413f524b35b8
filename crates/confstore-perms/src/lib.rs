//! # Confstore Permissions
//!
//! Ownership permissions and secret protection.
//!
//! ## Overview
//!
//! Permissions record which owner may act on which key of a value kind.
//! Each logical permission is stored twice: once in an owner index
//! (partitioned by `owner|type`, for "everything I own") and once in a
//! target index (partitioned by `type|target`, for "who owns this"). Both
//! projections are written only through
//! [`PermissionService::set_permission`], so no caller can update one
//! without the other.
//!
//! A target with no permission records is unclaimed: anyone may write it,
//! and the first writer becomes its owner.
//!
//! ## Secret Protection
//!
//! Client secrets are never stored in the clear. A [`SecretProtector`]
//! turns a plaintext secret into an opaque string and back:
//!
//! 1. **Encryption**: ChaCha20-Poly1305 under a key supplied at deployment
//! 2. **Vault**: the plaintext lives in an external [`SecretVault`]; only a
//!    reference is stored
//!
//! Exactly one strategy is active per deployment, chosen by
//! [`ProtectionConfig`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use confstore_perms::{EncryptionKey, EncryptionProtector, SecretProtector};
//!
//! async fn example() {
//!     let protector = EncryptionProtector::new(EncryptionKey::generate());
//!     let stored = protector.protect("client secret").await.unwrap();
//!     let plain = protector.unprotect(&stored).await.unwrap();
//!     assert_eq!(plain, "client secret");
//! }
//! ```

pub mod crypto;
pub mod error;
pub mod permission;
pub mod protect;
pub mod vault;

pub use crypto::EncryptionKey;
pub use error::{PermsError, Result};
pub use permission::{Permission, PermissionService};
pub use protect::{EncryptionProtector, ProtectionConfig, SecretProtector, VaultProtector};
pub use vault::{MemoryVault, SecretVault, VaultError};
