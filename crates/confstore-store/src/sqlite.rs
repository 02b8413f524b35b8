//! SQLite implementation of the TableStore trait.
//!
//! This is the primary storage backend for Confstore. It uses rusqlite
//! with bundled SQLite, run on tokio's blocking pool. All logical tables
//! live in one physical table keyed by `(table_name, partition_key, row_key)`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{Continuation, InsertResult, PartitionFilter, RowPage, RowQuery, TableRow, TableStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. Every call runs under `spawn_blocking`
/// so the async runtime's workers never wait on SQLite.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn row_to_table_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TableRow> {
    Ok(TableRow {
        partition_key: row.get("partition_key")?,
        row_key: row.get("row_key")?,
        data: row.get("data")?,
    })
}

/// Build the WHERE clause and parameters for a page query.
fn page_sql(
    table: &str,
    query: &RowQuery,
    continuation: Option<&Continuation>,
    limit: usize,
) -> (String, Vec<String>) {
    let mut args = vec![table.to_string()];
    let mut sql = String::from(
        "SELECT partition_key, row_key, data FROM table_rows WHERE table_name = ?1",
    );

    match &query.partition {
        PartitionFilter::Exact(pk) => {
            args.push(pk.clone());
            sql.push_str(&format!(" AND partition_key = ?{}", args.len()));
        }
        PartitionFilter::Prefix(prefix) => {
            args.push(prefix.clone());
            let n = args.len();
            sql.push_str(&format!(
                " AND partition_key >= ?{n} AND substr(partition_key, 1, length(?{n})) = ?{n}"
            ));
        }
    }

    if let Some(from) = &query.row_key_from {
        args.push(from.clone());
        sql.push_str(&format!(" AND row_key >= ?{}", args.len()));
    }

    if let Some(c) = continuation {
        args.push(c.partition_key.clone());
        args.push(c.row_key.clone());
        let (p, r) = (args.len() - 1, args.len());
        sql.push_str(&format!(" AND (partition_key, row_key) > (?{p}, ?{r})"));
    }

    sql.push_str(&format!(
        " ORDER BY partition_key, row_key LIMIT {}",
        limit.saturating_add(1)
    ));

    (sql, args)
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn get(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableRow>> {
        let (table, partition_key, row_key) =
            (table.to_string(), partition_key.to_string(), row_key.to_string());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT partition_key, row_key, data FROM table_rows
                     WHERE table_name = ?1 AND partition_key = ?2 AND row_key = ?3",
                    params![table, partition_key, row_key],
                    row_to_table_row,
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn query(
        &self,
        table: &str,
        query: &RowQuery,
        continuation: Option<&Continuation>,
        limit: usize,
    ) -> Result<RowPage> {
        let (sql, args) = page_sql(table, query, continuation, limit);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut rows = stmt
                .query_map(params_from_iter(args.iter()), row_to_table_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let continuation = if rows.len() > limit {
                rows.truncate(limit);
                rows.last().map(|last| Continuation {
                    partition_key: last.partition_key.clone(),
                    row_key: last.row_key.clone(),
                })
            } else {
                None
            };

            Ok(RowPage { rows, continuation })
        })
        .await
    }

    async fn insert(&self, table: &str, row: TableRow) -> Result<InsertResult> {
        let table = table.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO table_rows
                 (table_name, partition_key, row_key, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![table, row.partition_key, row.row_key, row.data, now_millis()],
            )?;

            if changed == 0 {
                Ok(InsertResult::AlreadyExists)
            } else {
                Ok(InsertResult::Inserted)
            }
        })
        .await
    }

    async fn upsert(&self, table: &str, row: TableRow) -> Result<()> {
        let table = table.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO table_rows
                 (table_name, partition_key, row_key, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(table_name, partition_key, row_key) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                params![table, row.partition_key, row.row_key, row.data, now_millis()],
            )?;
            Ok(())
        })
        .await
    }
}
