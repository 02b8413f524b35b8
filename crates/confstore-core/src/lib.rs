//! # Confstore Core
//!
//! Pure primitives for Confstore: value records, version identifiers,
//! capabilities, change records, and key/value validation.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ValueRecord`] - A stored configuration, setting, or secret value
//! - [`VersionId`] - The `CURRENT` sentinel or a time-derived historical id
//! - [`ValueKind`] - Which namespace a value lives in
//! - [`Capabilities`] - Read/Write/Delete/Permit bitset
//! - [`ChangeRecord`] - One entry of the append-only change log
//!
//! ## Version Ordering
//!
//! Historical versions encode `i64::MAX - ticks` as a zero-padded decimal,
//! so an ascending scan over version ids yields the newest value first.

pub mod capabilities;
pub mod client;
pub mod clock;
pub mod error;
pub mod kind;
pub mod types;
pub mod validation;
pub mod value;

pub use capabilities::Capabilities;
pub use client::{ClientIdentity, Principal};
pub use clock::{Clock, ManualClock, SystemClock, TICKS_PER_MILLI};
pub use error::{CoreError, ValidationError};
pub use kind::{ValueKind, ValueKindDescriptor};
pub use types::{ContentHash, Timestamp, VersionId};
pub use validation::{
    normalize_key, validate_identifier, validate_key, validate_value, MAX_KEY_LEN, MAX_VALUE_LEN,
};
pub use value::{ChangeKind, ChangeRecord, NewValue, ValueRecord};
