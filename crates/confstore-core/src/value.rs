//! Value records and change-log records.

use serde::{Deserialize, Serialize};

use crate::kind::ValueKind;
use crate::types::{ContentHash, Timestamp, VersionId};
use crate::validation::normalize_key;

/// A stored value.
///
/// The record addressed by [`VersionId::current`] is the mutable current
/// pointer for its key; every other record is an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    /// The key as supplied by the writer (casing preserved).
    pub key: String,
    pub value: String,
    pub version: VersionId,
    pub created_at: Timestamp,
    pub content_hash: ContentHash,
    /// Label attached by a tag operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ValueRecord {
    /// Canonical storage form of this record's key.
    pub fn storage_key(&self) -> String {
        normalize_key(&self.key)
    }

    /// Whether this is the current record of its key.
    pub fn is_current(&self) -> bool {
        self.version.is_current()
    }

    /// The same content re-addressed under another version.
    pub fn with_version(&self, version: VersionId) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }
}

/// A key/value pair submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewValue {
    pub key: String,
    pub value: String,
}

impl NewValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// What kind of change a change-log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Tag,
}

/// One entry in the append-only change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub target_type: ValueKind,
    pub key: String,
    pub kind: ChangeKind,
    pub owner: String,
    pub at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ValueRecord {
        ValueRecord {
            key: "Db.Host".into(),
            value: "localhost".into(),
            version: VersionId::current(),
            created_at: Timestamp::from_millis(1),
            content_hash: ContentHash::of("localhost"),
            tag: None,
        }
    }

    #[test]
    fn test_storage_key_lowercases() {
        assert_eq!(record().storage_key(), "db.host");
        assert_eq!(record().key, "Db.Host");
    }

    #[test]
    fn test_with_version_keeps_content() {
        let r = record();
        let h = r.with_version(VersionId::encode(7));
        assert!(!h.is_current());
        assert_eq!(h.value, r.value);
        assert_eq!(h.content_hash, r.content_hash);
    }

    #[test]
    fn test_json_omits_missing_tag() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("tag").is_none());
        assert_eq!(json["version"], "CURRENT");
    }
}
