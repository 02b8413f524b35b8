//! In-memory implementation of the TableStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::{Continuation, InsertResult, RowPage, RowQuery, TableRow, TableStore};

type Rows = BTreeMap<(String, String), Vec<u8>>;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Rows>>,
    /// Number of `get` and `query` calls served, for tests that assert
    /// how many round trips an operation made.
    reads: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of read round trips served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.read_tables()
            .map(|tables| tables.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn read_tables(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Rows>>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write_tables(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Rows>>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableRow>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let tables = self.read_tables()?;

        let row = tables.get(table).and_then(|rows| {
            rows.get(&(partition_key.to_string(), row_key.to_string()))
                .map(|data| TableRow {
                    partition_key: partition_key.to_string(),
                    row_key: row_key.to_string(),
                    data: data.clone(),
                })
        });

        Ok(row)
    }

    async fn query(
        &self,
        table: &str,
        query: &RowQuery,
        continuation: Option<&Continuation>,
        limit: usize,
    ) -> Result<RowPage> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let tables = self.read_tables()?;

        let Some(rows) = tables.get(table) else {
            return Ok(RowPage::default());
        };

        let start = (query.partition.lower_bound().to_string(), String::new());
        let mut matched: Vec<TableRow> = rows
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|((pk, _), _)| query.partition.matches(pk))
            .filter(|((pk, rk), _)| continuation.map_or(true, |c| c.is_before(pk, rk)))
            .filter(|((pk, rk), _)| query.matches(pk, rk))
            .take(limit + 1)
            .map(|((pk, rk), data)| TableRow {
                partition_key: pk.clone(),
                row_key: rk.clone(),
                data: data.clone(),
            })
            .collect();

        let continuation = if matched.len() > limit {
            matched.truncate(limit);
            matched.last().map(|last| Continuation {
                partition_key: last.partition_key.clone(),
                row_key: last.row_key.clone(),
            })
        } else {
            None
        };

        Ok(RowPage {
            rows: matched,
            continuation,
        })
    }

    async fn insert(&self, table: &str, row: TableRow) -> Result<InsertResult> {
        let mut tables = self.write_tables()?;
        let rows = tables.entry(table.to_string()).or_default();

        let address = (row.partition_key, row.row_key);
        if rows.contains_key(&address) {
            return Ok(InsertResult::AlreadyExists);
        }
        rows.insert(address, row.data);

        Ok(InsertResult::Inserted)
    }

    async fn upsert(&self, table: &str, row: TableRow) -> Result<()> {
        let mut tables = self.write_tables()?;
        tables
            .entry(table.to_string())
            .or_default()
            .insert((row.partition_key, row.row_key), row.data);
        Ok(())
    }
}
