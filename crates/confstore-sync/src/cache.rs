//! Local copy of synchronized values.
//!
//! Keys are looked up case-insensitively, matching how the service
//! addresses them. Each entry keeps the casing of its latest write.

use std::collections::HashMap;

use confstore_core::{normalize_key, Timestamp};

use crate::source::SyncEntry;

/// Key/value map plus the time of the last successful load.
#[derive(Debug, Clone, Default)]
pub struct SyncCache {
    /// Indexed by normalized key.
    entries: HashMap<String, SyncEntry>,
    last_detection_at: Option<Timestamp>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&normalize_key(key))
            .map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start time of the last load that succeeded.
    pub fn last_detection_at(&self) -> Option<Timestamp> {
        self.last_detection_at
    }

    /// Every value, keyed by the casing of its latest write.
    pub fn values(&self) -> HashMap<String, String> {
        self.entries
            .values()
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    /// Replace everything with the result of a full load.
    ///
    /// Returns whether the visible values changed.
    pub fn replace(&mut self, entries: Vec<SyncEntry>, loaded_at: Timestamp) -> bool {
        let entries: HashMap<String, SyncEntry> = entries
            .into_iter()
            .map(|e| (normalize_key(&e.key), e))
            .collect();
        let changed = entries != self.entries;
        self.entries = entries;
        self.last_detection_at = Some(loaded_at);
        changed
    }

    /// Upsert the result of a diff load. Keys absent from `entries` are kept.
    ///
    /// Returns whether the visible values changed.
    pub fn merge(&mut self, entries: Vec<SyncEntry>, loaded_at: Timestamp) -> bool {
        let mut changed = false;
        for entry in entries {
            let normalized = normalize_key(&entry.key);
            let previous = self.entries.insert(normalized, entry.clone());
            changed |= previous.as_ref() != Some(&entry);
        }
        self.last_detection_at = Some(loaded_at);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_drops_missing_keys() {
        let mut cache = SyncCache::new();
        cache.replace(
            vec![SyncEntry::new("a", "1"), SyncEntry::new("b", "2")],
            Timestamp::from_millis(1),
        );
        let changed = cache.replace(vec![SyncEntry::new("a", "1")], Timestamp::from_millis(2));

        assert!(changed);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.last_detection_at(), Some(Timestamp::from_millis(2)));
    }

    #[test]
    fn test_merge_upserts_and_keeps() {
        let mut cache = SyncCache::new();
        cache.replace(
            vec![SyncEntry::new("a", "1"), SyncEntry::new("b", "2")],
            Timestamp::from_millis(1),
        );

        let changed = cache.merge(
            vec![SyncEntry::new("b", "3"), SyncEntry::new("c", "4")],
            Timestamp::from_millis(2),
        );
        assert!(changed);
        assert_eq!(cache.get("a"), Some("1"));
        assert_eq!(cache.get("b"), Some("3"));
        assert_eq!(cache.get("c"), Some("4"));
    }

    #[test]
    fn test_merge_same_values_is_not_a_change() {
        let mut cache = SyncCache::new();
        cache.replace(vec![SyncEntry::new("a", "1")], Timestamp::from_millis(1));

        assert!(!cache.merge(vec![SyncEntry::new("a", "1")], Timestamp::from_millis(2)));
        assert!(!cache.merge(vec![], Timestamp::from_millis(3)));
        assert_eq!(cache.last_detection_at(), Some(Timestamp::from_millis(3)));
    }

    #[test]
    fn test_recased_key_replaces_entry() {
        let mut cache = SyncCache::new();
        cache.replace(vec![SyncEntry::new("Db.Host", "one")], Timestamp::from_millis(1));

        assert!(cache.merge(vec![SyncEntry::new("db.host", "two")], Timestamp::from_millis(2)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("Db.Host"), Some("two"));
        assert_eq!(cache.get("DB.HOST"), Some("two"));

        let values = cache.values();
        assert_eq!(values.get("db.host").map(String::as_str), Some("two"));
        assert!(!values.contains_key("Db.Host"));
    }
}
