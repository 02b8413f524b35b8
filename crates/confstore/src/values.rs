//! Versioned value store.
//!
//! Each key owns one partition of its kind's table. The row addressed by
//! [`VersionId::current`] is the mutable pointer to the latest content;
//! every other row is an immutable snapshot whose version encodes
//! `i64::MAX - ticks`, so an ascending row-key scan returns the newest
//! snapshot first.
//!
//! Writes are deduplicated by content hash: writing the content the current
//! pointer already holds touches nothing.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use confstore_core::{
    normalize_key, validate_identifier, Capabilities, ChangeKind, Clock, ContentHash, Timestamp,
    ValueKind, ValueKindDescriptor, ValueRecord, VersionId,
};
use confstore_perms::PermissionService;
use confstore_store::{
    Entity, InsertResult, RowQuery, StoreError, StoreExt, TableStore, DEFAULT_PAGE_SIZE,
};

use crate::changes::ChangeLogService;
use crate::error::{Error, Result};

/// Maximum tag length in characters.
pub const MAX_TAG_LEN: usize = 64;

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct StoredValue(ValueRecord);

impl Entity for StoredValue {
    fn partition_key(&self) -> String {
        self.0.storage_key()
    }

    fn row_key(&self) -> String {
        self.0.version.as_str().to_string()
    }
}

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddOutcome {
    /// The key did not exist; the writer now owns it.
    Created,
    /// A new version was written.
    Updated,
    /// The current content already had this hash; nothing was written.
    Unchanged,
}

/// Stores and reads the values of one kind.
pub struct ValueService<S: TableStore + ?Sized> {
    descriptor: ValueKindDescriptor,
    store: Arc<S>,
    permissions: Arc<PermissionService<S>>,
    changes: Arc<ChangeLogService<S>>,
    clock: Arc<dyn Clock>,
    page_size: usize,
}

impl<S: TableStore + ?Sized> ValueService<S> {
    pub fn new(
        descriptor: ValueKindDescriptor,
        store: Arc<S>,
        permissions: Arc<PermissionService<S>>,
        changes: Arc<ChangeLogService<S>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            descriptor,
            store,
            permissions,
            changes,
            clock,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn kind(&self) -> ValueKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &ValueKindDescriptor {
        &self.descriptor
    }

    fn table(&self) -> &str {
        &self.descriptor.table
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Write `value` under `key` on behalf of `owner`.
    ///
    /// The caller has already checked that `owner` may write the key. The
    /// snapshot, current pointer, change entry and first-writer permission
    /// are separate writes; two first writers racing on a new key may both
    /// end up owning it.
    pub async fn add_value(
        &self,
        owner: &str,
        key: &str,
        value: &str,
        content_hash: ContentHash,
    ) -> Result<AddOutcome> {
        let kind = self.kind();
        let storage_key = normalize_key(key);
        let current = self.get_latest_value(key).await?;

        if let Some(current) = &current {
            if current.content_hash == content_hash {
                tracing::debug!(kind = %kind, key, "value unchanged");
                return Ok(AddOutcome::Unchanged);
            }
        }

        let ticks = self.clock.next_ticks();
        let snapshot = ValueRecord {
            key: key.to_string(),
            value: value.to_string(),
            version: VersionId::encode(ticks),
            created_at: Timestamp::from_ticks(ticks),
            content_hash,
            tag: None,
        };

        self.insert_snapshot(&snapshot).await?;
        self.store
            .upsert_entity(
                self.table(),
                &StoredValue(snapshot.with_version(VersionId::current())),
            )
            .await?;

        self.changes
            .log_change(kind, key, ChangeKind::Add, owner)
            .await?;

        let outcome = if current.is_none() {
            self.permissions
                .set_permission(kind, owner, &storage_key, Capabilities::ALL)
                .await?;
            AddOutcome::Created
        } else {
            AddOutcome::Updated
        };

        tracing::debug!(
            kind = %kind,
            key,
            owner,
            version = %snapshot.version,
            outcome = ?outcome,
            "value written"
        );
        Ok(outcome)
    }

    /// Label an existing version with `tag`.
    ///
    /// The labelled content is stored as a new snapshot; the current
    /// pointer does not move.
    pub async fn tag_value(
        &self,
        owner: &str,
        key: &str,
        version: &VersionId,
        tag: &str,
    ) -> Result<ValueRecord> {
        validate_identifier("tag", tag, MAX_TAG_LEN)?;

        let source = self.get_value(key, version).await?.ok_or_else(|| {
            Error::NotFound(format!("{} {} version {}", self.kind(), key, version))
        })?;

        let ticks = self.clock.next_ticks();
        let tagged = ValueRecord {
            version: VersionId::encode(ticks),
            created_at: Timestamp::from_ticks(ticks),
            tag: Some(tag.to_string()),
            ..source
        };

        self.insert_snapshot(&tagged).await?;
        self.changes
            .log_change(self.kind(), &tagged.key, ChangeKind::Tag, owner)
            .await?;

        tracing::debug!(kind = %self.kind(), key, tag, version = %tagged.version, "value tagged");
        Ok(tagged)
    }

    async fn insert_snapshot(&self, record: &ValueRecord) -> Result<()> {
        match self
            .store
            .insert_entity(self.table(), &StoredValue(record.clone()))
            .await?
        {
            InsertResult::Inserted => Ok(()),
            InsertResult::AlreadyExists => Err(StoreError::InvalidData(format!(
                "snapshot {} of {} already exists",
                record.version,
                record.storage_key()
            ))
            .into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Point reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The record of `key` at exactly `version`. No permission check.
    pub async fn get_value(&self, key: &str, version: &VersionId) -> Result<Option<ValueRecord>> {
        let stored: Option<StoredValue> = self
            .store
            .get_entity(self.table(), &normalize_key(key), version.as_str())
            .await?;
        Ok(stored.map(|s| s.0))
    }

    /// The current record of `key`. No permission check.
    pub async fn get_latest_value(&self, key: &str) -> Result<Option<ValueRecord>> {
        self.get_value(key, &VersionId::current()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enumeration
    // ─────────────────────────────────────────────────────────────────────────

    /// Current records of every key `owner` can read.
    ///
    /// Permissions are pulled page by page and each key is fetched only
    /// when the consumer polls for it.
    pub fn get_values<'a>(&'a self, owner: &'a str) -> BoxStream<'a, Result<ValueRecord>> {
        let stream = async_stream::stream! {
            let mut permissions = self.permissions.get_permissions(self.kind(), owner);
            while let Some(permission) = permissions.next().await {
                let permission = match permission {
                    Ok(p) => p,
                    Err(e) => {
                        yield Err(Error::from(e));
                        break;
                    }
                };
                if !permission.capabilities.contains(Capabilities::READ) {
                    continue;
                }
                match self.get_latest_value(&permission.target_id).await {
                    Ok(Some(record)) => yield Ok(record),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(stream)
    }

    /// Current records of keys changed at or after `since` that `owner`
    /// can read.
    pub fn get_values_since<'a>(
        &'a self,
        owner: &'a str,
        since: Timestamp,
    ) -> BoxStream<'a, Result<ValueRecord>> {
        let stream = async_stream::stream! {
            let changes = match self.changes.get_changes_since(self.kind(), since).await {
                Ok(changes) => changes,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for change in changes {
                match self.readable_current(owner, &change.key).await {
                    Ok(Some(record)) => yield Ok(record),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Box::pin(stream)
    }

    /// Every snapshot of `key`, newest first. The current pointer is not
    /// included.
    pub fn get_history<'a>(&'a self, key: &str) -> BoxStream<'a, Result<ValueRecord>> {
        self.store
            .scan_entities::<StoredValue>(
                self.table(),
                RowQuery::partition(normalize_key(key)),
                self.page_size,
            )
            .map_ok(|s| s.0)
            .try_filter(|record| futures::future::ready(!record.is_current()))
            .map_err(Error::from)
            .boxed()
    }

    async fn readable_current(&self, owner: &str, key: &str) -> Result<Option<ValueRecord>> {
        if !self
            .permissions
            .has_capability(self.kind(), owner, key, Capabilities::READ)
            .await?
        {
            return Ok(None);
        }
        self.get_latest_value(key).await
    }
}
