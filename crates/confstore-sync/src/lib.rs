//! # Confstore Sync
//!
//! Client-side synchronization of configuration values.
//!
//! ## Overview
//!
//! A [`SyncProvider`] keeps a local copy of every synchronized value kind.
//! Each kind is owned by a [`ChangeDetector`] that pulls from a
//! [`ValueSource`]: once in full at start, then on a fixed interval asking
//! only for keys changed since the last successful load.
//!
//! ## Key Properties
//!
//! - **Non-overlapping**: a kind never has two loads in flight
//! - **Merge-only diffs**: diff loads upsert; keys are only dropped by a full load
//! - **Failure tolerant**: failed loads keep serving the last known values
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use confstore_core::{SystemClock, ValueKind};
//! use confstore_sync::{SyncOptions, SyncProvider, ValueSource};
//!
//! async fn example(source: Arc<dyn ValueSource>) {
//!     let provider = SyncProvider::start(source, SystemClock::shared(), &SyncOptions::default()).await;
//!     let host = provider.get(ValueKind::Configuration, "db.host");
//! }
//! ```

pub mod cache;
pub mod detector;
pub mod error;
pub mod provider;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::SyncCache;
pub use detector::{ChangeDetector, DetectorHandle};
pub use error::{Result, SyncError};
pub use provider::{SyncOptions, SyncProvider, DEFAULT_SETTINGS_REFRESH};
pub use source::{SyncEntry, ValueSource};
