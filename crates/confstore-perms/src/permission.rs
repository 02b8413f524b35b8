//! Dual-indexed ownership permissions.
//!
//! One logical [`Permission`] is persisted as two rows:
//!
//! - owner index: partition `owner|type`, row key = lowercase target
//! - target index: partition `type|lowercase target`, row key = owner
//!
//! The owner index answers "what does this owner hold", the target index
//! answers "who holds this target". Both rows are written by
//! [`PermissionService::set_permission`] and nowhere else.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use confstore_core::{normalize_key, Capabilities, ValueKind};
use confstore_store::{Entity, RowQuery, StoreExt, TableStore, DEFAULT_PAGE_SIZE};

use crate::error::{PermsError, Result};

/// Separator between the parts of a composite partition key.
const SEPARATOR: char = '|';

/// Capabilities held by one owner over one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub owner: String,
    /// Target key in its canonical (lowercase) form.
    pub target_id: String,
    pub target_type: ValueKind,
    pub capabilities: Capabilities,
}

impl Permission {
    fn owner_partition(owner: &str, kind: ValueKind) -> String {
        format!("{}{}{}", owner, SEPARATOR, kind.tag())
    }

    fn target_partition(kind: ValueKind, target: &str) -> String {
        format!("{}{}{}", kind.tag(), SEPARATOR, normalize_key(target))
    }
}

/// Owner-index projection of a permission.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct OwnerIndexEntry(Permission);

impl Entity for OwnerIndexEntry {
    fn partition_key(&self) -> String {
        Permission::owner_partition(&self.0.owner, self.0.target_type)
    }

    fn row_key(&self) -> String {
        normalize_key(&self.0.target_id)
    }
}

/// Target-index projection of a permission.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct TargetIndexEntry(Permission);

impl Entity for TargetIndexEntry {
    fn partition_key(&self) -> String {
        Permission::target_partition(self.0.target_type, &self.0.target_id)
    }

    fn row_key(&self) -> String {
        self.0.owner.clone()
    }
}

/// Reads and writes ownership permissions.
pub struct PermissionService<S: TableStore + ?Sized> {
    store: Arc<S>,
    owner_table: String,
    target_table: String,
    page_size: usize,
}

impl<S: TableStore + ?Sized> PermissionService<S> {
    /// Create a service over the permission tables of a deployment.
    pub fn new(store: Arc<S>, system_id: &str) -> Self {
        Self {
            store,
            owner_table: format!("{}Permissions", system_id),
            target_table: format!("{}PermissionsMirrored", system_id),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the number of rows fetched per round trip.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether `owner` is named on `target` at all.
    ///
    /// True when the target has no permission records (unclaimed) or when
    /// one of its records names `owner`, whatever capabilities it carries.
    pub async fn is_permitted(&self, kind: ValueKind, owner: &str, target: &str) -> Result<bool> {
        let partition = Permission::target_partition(kind, target);

        if self
            .store
            .get(&self.target_table, &partition, owner)
            .await?
            .is_some()
        {
            return Ok(true);
        }
        Ok(!self.is_claimed(kind, target).await?)
    }

    /// Whether any permission record exists for `target`.
    pub async fn is_claimed(&self, kind: ValueKind, target: &str) -> Result<bool> {
        let page = self
            .store
            .query(
                &self.target_table,
                &RowQuery::partition(Permission::target_partition(kind, target)),
                None,
                1,
            )
            .await?;
        Ok(!page.rows.is_empty())
    }

    /// Whether `owner` may write a new value of `target`: the target is
    /// unclaimed, or `owner` holds `WRITE` on it.
    pub async fn can_write(&self, kind: ValueKind, owner: &str, target: &str) -> Result<bool> {
        if self
            .has_capability(kind, owner, target, Capabilities::WRITE)
            .await?
        {
            return Ok(true);
        }
        Ok(!self.is_claimed(kind, target).await?)
    }

    /// Capabilities `owner` holds over `target`, if any.
    pub async fn get_permission(
        &self,
        kind: ValueKind,
        owner: &str,
        target: &str,
    ) -> Result<Option<Capabilities>> {
        let entry: Option<OwnerIndexEntry> = self
            .store
            .get_entity(
                &self.owner_table,
                &Permission::owner_partition(owner, kind),
                &normalize_key(target),
            )
            .await?;
        Ok(entry.map(|e| e.0.capabilities))
    }

    /// Whether `owner` holds every capability in `required` over `target`.
    pub async fn has_capability(
        &self,
        kind: ValueKind,
        owner: &str,
        target: &str,
        required: Capabilities,
    ) -> Result<bool> {
        Ok(self
            .get_permission(kind, owner, target)
            .await?
            .is_some_and(|caps| caps.contains(required)))
    }

    /// Lazily list every permission `owner` holds for `kind`, ordered by
    /// target.
    pub fn get_permissions(
        &self,
        kind: ValueKind,
        owner: &str,
    ) -> BoxStream<'_, Result<Permission>> {
        self.store
            .scan_entities::<OwnerIndexEntry>(
                &self.owner_table,
                RowQuery::partition(Permission::owner_partition(owner, kind)),
                self.page_size,
            )
            .map_ok(|e| e.0)
            .map_err(PermsError::from)
            .boxed()
    }

    /// Every permission record on `target`, ordered by owner.
    pub async fn get_owners(&self, kind: ValueKind, target: &str) -> Result<Vec<Permission>> {
        let owners: Vec<TargetIndexEntry> = self
            .store
            .scan_entities(
                &self.target_table,
                RowQuery::partition(Permission::target_partition(kind, target)),
                self.page_size,
            )
            .try_collect()
            .await?;
        Ok(owners.into_iter().map(|e| e.0).collect())
    }

    /// Grant `owner` exactly `capabilities` over `target`.
    ///
    /// Idempotent but not atomic: a failure between the two writes leaves
    /// the indexes out of step until the call is retried.
    pub async fn set_permission(
        &self,
        kind: ValueKind,
        owner: &str,
        target: &str,
        capabilities: Capabilities,
    ) -> Result<()> {
        let permission = Permission {
            owner: owner.to_string(),
            target_id: normalize_key(target),
            target_type: kind,
            capabilities,
        };

        self.store
            .upsert_entity(&self.owner_table, &OwnerIndexEntry(permission.clone()))
            .await?;
        self.store
            .upsert_entity(&self.target_table, &TargetIndexEntry(permission))
            .await?;

        tracing::debug!(
            kind = %kind,
            owner,
            target,
            capabilities = ?capabilities,
            "permission set"
        );
        Ok(())
    }
}
