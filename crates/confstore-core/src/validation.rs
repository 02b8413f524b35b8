//! Key, value, and identifier validation.
//!
//! Keys are technical identifiers: ASCII alphanumerics plus `.`, `_`, `-`
//! and `:`. Storage addressing is case-insensitive, so keys are lowercased
//! for partition keys while the stored record keeps the caller's casing.
//! The separator `|` used in composite partition keys can never appear in
//! a valid identifier.

use crate::error::ValidationError;

/// Maximum key length in characters.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum value length in characters.
pub const MAX_VALUE_LEN: usize = 1024;

/// Punctuation allowed in identifiers besides ASCII alphanumerics.
const IDENTIFIER_PUNCTUATION: &[char] = &['.', '_', '-', ':'];

/// Validate a technical identifier (keys, client ids, tags).
pub fn validate_identifier(
    field: &'static str,
    s: &str,
    max_len: usize,
) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    let len = s.chars().count();
    if len > max_len {
        return Err(ValidationError::TooLong {
            field,
            len,
            max: max_len,
        });
    }

    if let Some((position, ch)) = s
        .chars()
        .enumerate()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || IDENTIFIER_PUNCTUATION.contains(c)))
    {
        return Err(ValidationError::InvalidCharacter {
            field,
            ch,
            position,
        });
    }

    Ok(())
}

/// Validate a value key.
pub fn validate_key(key: &str, max_len: usize) -> Result<(), ValidationError> {
    validate_identifier("key", key, max_len)
}

/// Validate a value body. Any characters are allowed; only length is bounded.
pub fn validate_value(value: &str, max_len: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max_len {
        return Err(ValidationError::TooLong {
            field: "value",
            len,
            max: max_len,
        });
    }
    Ok(())
}

/// Canonical storage form of a key.
pub fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}
