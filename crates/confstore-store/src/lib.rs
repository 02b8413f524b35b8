//! # Confstore Store
//!
//! Storage abstraction for Confstore. Provides a trait-based interface over
//! a partitioned table store with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! Every service persists its records through the [`TableStore`] trait,
//! which models a partitioned key-value table: rows are addressed by a
//! `(partition_key, row_key)` pair inside a named table. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`TableStore`] - The async trait for all storage operations
//! - [`StoreExt`] - Typed entity access and lazy paged scans
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`RowQuery`] - Partition filter plus optional row-key lower bound
//!
//! ## Usage
//!
//! ```rust,no_run
//! use confstore_store::{MemoryStore, RowQuery, StoreExt};
//! use futures::TryStreamExt;
//!
//! async fn example() {
//!     let store = MemoryStore::new();
//!
//!     // Rows are pulled one page at a time as the stream is polled.
//!     let rows: Vec<_> = store
//!         .scan("values", RowQuery::partition("db.host"), 100)
//!         .try_collect()
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Insert never overwrites**: inserting an existing row returns `AlreadyExists`
//! - **Upsert always overwrites**: used for mutable pointers and permission rows
//! - **Ordered scans**: rows come back ordered by `(partition_key, row_key)`
//! - **Paged queries**: a continuation marks where the next page starts

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    Continuation, Entity, InsertResult, PartitionFilter, RowPage, RowQuery, StoreExt, TableRow,
    TableStore, DEFAULT_PAGE_SIZE,
};
