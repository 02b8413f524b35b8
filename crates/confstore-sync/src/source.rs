//! The service as seen by a synchronizing client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use confstore_core::{Timestamp, ValueKind};

use crate::error::Result;

/// A key and its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub key: String,
    pub value: String,
}

impl SyncEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where a detector pulls values from.
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Current values of `kind` readable by this client.
    ///
    /// With `since`, only keys changed at or after that time are returned.
    async fn fetch_values(
        &self,
        kind: ValueKind,
        since: Option<Timestamp>,
    ) -> Result<Vec<SyncEntry>>;
}
