//! Append-only change log.
//!
//! Every write and tag appends one entry to the log of its kind. Entries
//! are partitioned by kind and keyed by zero-padded ticks, so a row-key
//! range scan from a timestamp yields exactly the changes at or after it,
//! oldest first.

use std::collections::HashMap;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use confstore_core::{normalize_key, ChangeKind, ChangeRecord, Clock, Timestamp, ValueKind};
use confstore_store::{Entity, InsertResult, RowQuery, StoreError, StoreExt, TableStore, DEFAULT_PAGE_SIZE};

use crate::error::Result;

/// Row key of the change logged at `ticks`.
fn tick_key(ticks: i64) -> String {
    format!("{:019}", ticks.max(0))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChangeEntry {
    ticks: i64,
    change: ChangeRecord,
}

impl Entity for ChangeEntry {
    fn partition_key(&self) -> String {
        self.change.target_type.tag().to_string()
    }

    fn row_key(&self) -> String {
        tick_key(self.ticks)
    }
}

/// Records and queries changes to values.
pub struct ChangeLogService<S: TableStore + ?Sized> {
    store: Arc<S>,
    table: String,
    clock: Arc<dyn Clock>,
    page_size: usize,
}

impl<S: TableStore + ?Sized> ChangeLogService<S> {
    pub fn new(store: Arc<S>, system_id: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            table: format!("{}Changes", system_id),
            clock,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Append a change of `key`.
    pub async fn log_change(
        &self,
        kind: ValueKind,
        key: &str,
        change_kind: ChangeKind,
        owner: &str,
    ) -> Result<ChangeRecord> {
        let ticks = self.clock.next_ticks();
        let entry = ChangeEntry {
            ticks,
            change: ChangeRecord {
                target_type: kind,
                key: key.to_string(),
                kind: change_kind,
                owner: owner.to_string(),
                at: Timestamp::from_ticks(ticks),
            },
        };

        match self.store.insert_entity(&self.table, &entry).await? {
            InsertResult::Inserted => Ok(entry.change),
            InsertResult::AlreadyExists => Err(StoreError::InvalidData(format!(
                "change log entry {} already exists",
                tick_key(ticks)
            ))
            .into()),
        }
    }

    /// Latest change of every key changed at or after `since`, oldest first.
    pub async fn get_changes_since(
        &self,
        kind: ValueKind,
        since: Timestamp,
    ) -> Result<Vec<ChangeRecord>> {
        let query = RowQuery::partition(kind.tag()).from_row(tick_key(since.as_ticks()));

        let latest: HashMap<String, ChangeEntry> = self
            .store
            .scan_entities::<ChangeEntry>(&self.table, query, self.page_size)
            .try_fold(HashMap::new(), |mut latest, entry| async move {
                latest.insert(normalize_key(&entry.change.key), entry);
                Ok(latest)
            })
            .await?;

        let mut changes: Vec<ChangeEntry> = latest.into_values().collect();
        changes.sort_by_key(|e| e.ticks);
        Ok(changes.into_iter().map(|e| e.change).collect())
    }
}
