//! # Confstore
//!
//! Multi-tenant distribution of configuration, settings, and secrets.
//!
//! ## Overview
//!
//! Clients push key/value entries of three kinds and pull the latest or
//! historical values back, scoped by per-key ownership. The first client to
//! write a key owns it; nobody else can write it until the owner grants
//! them access.
//!
//! The pieces:
//!
//! - [`ValueService`] - versioned, content-deduplicated value storage
//! - [`ChangeLogService`] - append-only change log behind diff queries
//! - [`ClientService`] - client registry with protected secrets
//! - [`TokenIssuer`] / [`TokenValidator`] - per-client HS256 bearer tokens
//! - [`Confstore`] - the service facade, one method per route
//! - [`LocalSource`] - in-process source for `confstore_sync`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::TryStreamExt;
//! use confstore::{Confstore, NewValue, ServiceConfig, SqliteStore, ValueKind};
//!
//! async fn example(config: ServiceConfig, token: &str) -> confstore::Result<()> {
//!     let store = Arc::new(SqliteStore::open("confstore.db")?);
//!     let service = Confstore::open(config, store).await?;
//!
//!     let caller = service.authenticate(token).await?;
//!     service
//!         .add_values(&caller, ValueKind::Configuration, &[NewValue::new("db.host", "localhost")])
//!         .await?;
//!     let values: Vec<_> = service
//!         .get_values(&caller, ValueKind::Configuration, None)
//!         .try_collect()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod changes;
pub mod clients;
pub mod config;
pub mod error;
pub mod local;
pub mod service;
pub mod telemetry;
pub mod token;
pub mod values;

pub use changes::ChangeLogService;
pub use clients::ClientService;
pub use config::{ConnectionString, ServiceConfig, SystemClientConfig};
pub use error::{Error, Result};
pub use local::LocalSource;
pub use service::{AddReport, Confstore, SetupClientResponse};
pub use telemetry::init_tracing;
pub use token::{Claims, TokenIssuer, TokenValidator};
pub use values::{AddOutcome, ValueService};

// Re-export the types callers need alongside the service.
pub use confstore_core::{
    Capabilities, ChangeKind, ChangeRecord, Clock, ClientIdentity, ContentHash, ManualClock,
    NewValue, Principal, SystemClock, Timestamp, ValueKind, ValueRecord, VersionId,
};
pub use confstore_perms::{EncryptionKey, MemoryVault, ProtectionConfig, SecretVault};
pub use confstore_store::{MemoryStore, SqliteStore, TableStore};
pub use confstore_sync::{ChangeDetector, SyncOptions, SyncProvider, ValueSource};
