//! Proptest generators for property-based testing.

use proptest::prelude::*;

use confstore_core::{NewValue, ValueKind};

/// Generate a valid key.
pub fn key() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9._:-]{0,40}"
}

/// Generate a value within the default length limit.
pub fn value() -> impl Strategy<Value = String> {
    "[ -~]{0,64}"
}

/// Generate a value kind.
pub fn value_kind() -> impl Strategy<Value = ValueKind> {
    prop_oneof![
        Just(ValueKind::Configuration),
        Just(ValueKind::Setting),
        Just(ValueKind::Secret),
    ]
}

/// Generate a key/value pair.
pub fn new_value() -> impl Strategy<Value = NewValue> {
    (key(), value()).prop_map(|(k, v)| NewValue::new(k, v))
}

/// Generate a batch of entries with distinct (case-insensitive) keys.
pub fn new_values(max_len: usize) -> impl Strategy<Value = Vec<NewValue>> {
    prop::collection::btree_map(key().prop_map(|k| k.to_ascii_lowercase()), value(), 1..=max_len.max(1))
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(k, v)| NewValue::new(k, v))
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use confstore_core::{validate_key, validate_value, MAX_KEY_LEN, MAX_VALUE_LEN};

    proptest! {
        #[test]
        fn generated_entries_are_valid(entry in new_value()) {
            prop_assert!(validate_key(&entry.key, MAX_KEY_LEN).is_ok());
            prop_assert!(validate_value(&entry.value, MAX_VALUE_LEN).is_ok());
        }

        #[test]
        fn batches_have_distinct_keys(batch in new_values(8)) {
            let mut keys: Vec<String> = batch.iter().map(|e| e.key.to_ascii_lowercase()).collect();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), batch.len());
        }
    }
}
