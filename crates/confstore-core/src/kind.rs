//! Value kinds and their runtime descriptors.
//!
//! The three kinds share one record shape. A [`ValueKindDescriptor`] carries
//! everything a service needs to handle one kind: where its records live
//! and which limits its keys and values obey.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, ValidationError};
use crate::validation::{validate_key, validate_value, MAX_KEY_LEN, MAX_VALUE_LEN};

/// The namespace a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Configuration,
    Setting,
    Secret,
}

impl ValueKind {
    /// All kinds, in a stable order.
    pub const ALL: [ValueKind; 3] = [ValueKind::Configuration, ValueKind::Setting, ValueKind::Secret];

    /// The type tag used in permission and change-log keys.
    pub const fn tag(&self) -> &'static str {
        match self {
            ValueKind::Configuration => "configuration",
            ValueKind::Setting => "setting",
            ValueKind::Secret => "secret",
        }
    }

    /// The collection name used by the service routes (`/configuration`,
    /// `/settings`, `/secrets`).
    pub const fn route(&self) -> &'static str {
        match self {
            ValueKind::Configuration => "configuration",
            ValueKind::Setting => "settings",
            ValueKind::Secret => "secrets",
        }
    }

    /// Suffix of the value table name.
    const fn table_suffix(&self) -> &'static str {
        match self {
            ValueKind::Configuration => "Configuration",
            ValueKind::Setting => "Setting",
            ValueKind::Secret => "Secret",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ValueKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "configuration" => Ok(ValueKind::Configuration),
            "setting" | "settings" => Ok(ValueKind::Setting),
            "secret" | "secrets" => Ok(ValueKind::Secret),
            _ => Err(CoreError::UnknownKind(s.to_string())),
        }
    }
}

/// Runtime description of one value kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueKindDescriptor {
    pub kind: ValueKind,
    /// Table holding this kind's records.
    pub table: String,
    pub max_key_len: usize,
    pub max_value_len: usize,
}

impl ValueKindDescriptor {
    /// Descriptor with the default limits, tables prefixed by `system_id`.
    pub fn new(kind: ValueKind, system_id: &str) -> Self {
        Self {
            kind,
            table: format!("{}{}", system_id, kind.table_suffix()),
            max_key_len: MAX_KEY_LEN,
            max_value_len: MAX_VALUE_LEN,
        }
    }

    /// Check a key/value pair against this kind's rules.
    pub fn validate(&self, key: &str, value: &str) -> Result<(), ValidationError> {
        validate_key(key, self.max_key_len)?;
        validate_value(value, self.max_value_len)
    }
}
