//! TableStore trait: the abstract interface over the backing table store.
//!
//! This trait allows the services to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Rows fetched per round trip when a caller has no preference.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One raw row of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    /// CBOR-encoded entity.
    pub data: Vec<u8>,
}

impl TableRow {
    /// Encode an entity into a row.
    pub fn encode<E: Entity>(entity: &E) -> Result<Self> {
        let mut data = Vec::new();
        ciborium::into_writer(entity, &mut data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            partition_key: entity.partition_key(),
            row_key: entity.row_key(),
            data,
        })
    }

    /// Decode the entity stored in this row.
    pub fn decode<E: Entity>(&self) -> Result<E> {
        ciborium::from_reader(&self.data[..]).map_err(|e| {
            StoreError::Serialization(format!(
                "row ({}, {}): {}",
                self.partition_key, self.row_key, e
            ))
        })
    }
}

/// A record type that knows its own address.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    fn partition_key(&self) -> String;
    fn row_key(&self) -> String;
}

/// Which partitions a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionFilter {
    /// A single partition.
    Exact(String),
    /// Every partition whose key starts with the prefix.
    Prefix(String),
}

impl PartitionFilter {
    /// Whether a partition key is covered by this filter.
    pub fn matches(&self, partition_key: &str) -> bool {
        match self {
            PartitionFilter::Exact(pk) => partition_key == pk,
            PartitionFilter::Prefix(prefix) => partition_key.starts_with(prefix.as_str()),
        }
    }

    /// The smallest partition key this filter can match.
    pub fn lower_bound(&self) -> &str {
        match self {
            PartitionFilter::Exact(pk) | PartitionFilter::Prefix(pk) => pk,
        }
    }
}

/// A range query over one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub partition: PartitionFilter,
    /// Only rows with `row_key >= row_key_from`.
    pub row_key_from: Option<String>,
}

impl RowQuery {
    /// All rows of one partition.
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition: PartitionFilter::Exact(partition_key.into()),
            row_key_from: None,
        }
    }

    /// All rows of every partition starting with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            partition: PartitionFilter::Prefix(prefix.into()),
            row_key_from: None,
        }
    }

    /// Restrict to rows whose row key is at least `row_key`.
    pub fn from_row(mut self, row_key: impl Into<String>) -> Self {
        self.row_key_from = Some(row_key.into());
        self
    }

    /// Whether a row is covered by this query.
    pub fn matches(&self, partition_key: &str, row_key: &str) -> bool {
        self.partition.matches(partition_key)
            && self
                .row_key_from
                .as_deref()
                .map_or(true, |from| row_key >= from)
    }
}

/// Position after which the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub partition_key: String,
    pub row_key: String,
}

impl Continuation {
    /// Whether a row lies strictly after this position.
    pub fn is_before(&self, partition_key: &str, row_key: &str) -> bool {
        (partition_key, row_key) > (self.partition_key.as_str(), self.row_key.as_str())
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct RowPage {
    pub rows: Vec<TableRow>,
    /// Present when more rows may follow.
    pub continuation: Option<Continuation>,
}

/// Result of inserting a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// A row with the same address already exists; nothing was written.
    AlreadyExists,
}

/// The TableStore trait: async interface for a partitioned table store.
///
/// # Design Notes
///
/// - Tables are created on first write; reading an unknown table yields nothing.
/// - Queries return rows ordered by `(partition_key, row_key)` in byte order.
/// - No multi-row transactions are offered; callers that write several rows
///   accept that a crash may leave only some of them written.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Point lookup by partition and row key.
    async fn get(&self, table: &str, partition_key: &str, row_key: &str)
        -> Result<Option<TableRow>>;

    /// Fetch one page of rows matching `query`, starting after `continuation`.
    async fn query(
        &self,
        table: &str,
        query: &RowQuery,
        continuation: Option<&Continuation>,
        limit: usize,
    ) -> Result<RowPage>;

    /// Insert a row unless one with the same address exists.
    async fn insert(&self, table: &str, row: TableRow) -> Result<InsertResult>;

    /// Insert or replace a row.
    async fn upsert(&self, table: &str, row: TableRow) -> Result<()>;
}

/// Extension trait for typed access and lazy scans.
pub trait StoreExt: TableStore {
    /// Point lookup decoded into an entity.
    fn get_entity<E: Entity>(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<E>>> + Send;

    /// Insert an entity at its own address.
    fn insert_entity<E: Entity>(
        &self,
        table: &str,
        entity: &E,
    ) -> impl std::future::Future<Output = Result<InsertResult>> + Send;

    /// Upsert an entity at its own address.
    fn upsert_entity<E: Entity>(
        &self,
        table: &str,
        entity: &E,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Lazily scan all rows matching `query`, one page per round trip.
    ///
    /// Dropping the stream stops further round trips.
    fn scan<'a>(
        &'a self,
        table: &'a str,
        query: RowQuery,
        page_size: usize,
    ) -> BoxStream<'a, Result<TableRow>>;

    /// Lazily scan and decode entities.
    fn scan_entities<'a, E: Entity + 'a>(
        &'a self,
        table: &'a str,
        query: RowQuery,
        page_size: usize,
    ) -> BoxStream<'a, Result<E>>;
}

impl<S: TableStore + ?Sized> StoreExt for S {
    async fn get_entity<E: Entity>(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<E>> {
        match self.get(table, partition_key, row_key).await? {
            Some(row) => Ok(Some(row.decode()?)),
            None => Ok(None),
        }
    }

    async fn insert_entity<E: Entity>(&self, table: &str, entity: &E) -> Result<InsertResult> {
        let row = TableRow::encode(entity)?;
        self.insert(table, row).await
    }

    async fn upsert_entity<E: Entity>(&self, table: &str, entity: &E) -> Result<()> {
        let row = TableRow::encode(entity)?;
        self.upsert(table, row).await
    }

    fn scan<'a>(
        &'a self,
        table: &'a str,
        query: RowQuery,
        page_size: usize,
    ) -> BoxStream<'a, Result<TableRow>> {
        let page_size = page_size.max(1);
        let stream = async_stream::stream! {
            let mut continuation: Option<Continuation> = None;
            loop {
                let page = match self
                    .query(table, &query, continuation.as_ref(), page_size)
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };
                for row in page.rows {
                    yield Ok(row);
                }
                match page.continuation {
                    Some(next) => continuation = Some(next),
                    None => break,
                }
            }
        };
        Box::pin(stream)
    }

    fn scan_entities<'a, E: Entity + 'a>(
        &'a self,
        table: &'a str,
        query: RowQuery,
        page_size: usize,
    ) -> BoxStream<'a, Result<E>> {
        self.scan(table, query, page_size)
            .map(|row| row.and_then(|row| row.decode::<E>()))
            .boxed()
    }
}
