//! Strong type definitions for Confstore.
//!
//! Identifiers are newtypes so that a version id cannot be passed where a
//! key is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::TICKS_PER_MILLI;
use crate::error::CoreError;

/// A point in time as Unix milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Create from Unix milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Unix milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Whole seconds since the epoch (truncating).
    pub const fn as_secs(&self) -> i64 {
        self.0.div_euclid(1000)
    }

    /// The first tick belonging to this millisecond.
    pub const fn as_ticks(&self) -> i64 {
        self.0.saturating_mul(TICKS_PER_MILLI)
    }

    /// The millisecond a tick belongs to.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks.div_euclid(TICKS_PER_MILLI))
    }

    /// Add a number of milliseconds.
    pub const fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Width of an encoded historical version id (`i64::MAX` has 19 digits).
const VERSION_WIDTH: usize = 19;

/// A version identifier: the `CURRENT` sentinel or a historical id.
///
/// Historical ids are `i64::MAX - ticks` rendered as a zero-padded decimal,
/// so lexicographic order equals numeric order and later writes sort first.
/// The sentinel contains letters and can never be produced by [`VersionId::encode`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// The reserved sentinel addressing the current record of a key.
    pub const CURRENT_STR: &'static str = "CURRENT";

    /// The current-record sentinel.
    pub fn current() -> Self {
        Self(Self::CURRENT_STR.to_string())
    }

    /// Encode a tick count as a historical version id.
    pub fn encode(ticks: i64) -> Self {
        let inverted = i64::MAX - ticks.max(0);
        Self(format!("{:0width$}", inverted, width = VERSION_WIDTH))
    }

    /// Recover the tick count from a historical id.
    pub fn ticks(&self) -> Option<i64> {
        if self.is_current() {
            return None;
        }
        self.0.parse::<i64>().ok().map(|inverted| i64::MAX - inverted)
    }

    /// Parse a version id from its string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s == Self::CURRENT_STR {
            return Ok(Self::current());
        }
        if s.len() != VERSION_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidVersion(s.to_string()));
        }
        s.parse::<i64>()
            .map_err(|_| CoreError::InvalidVersion(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    /// Whether this is the `CURRENT` sentinel.
    pub fn is_current(&self) -> bool {
        self.0 == Self::CURRENT_STR
    }

    /// The string form, used as the row key in storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionId> for String {
    fn from(v: VersionId) -> Self {
        v.0
    }
}

/// A content hash: lowercase hex Blake3 digest of a value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a value.
    pub fn of(value: &str) -> Self {
        Self(blake3::hash(value.as_bytes()).to_hex().to_string())
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidContentHash(s.to_string()))?;
        if bytes.len() != blake3::OUT_LEN {
            return Err(CoreError::InvalidContentHash(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.0[..self.0.len().min(16)])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ContentHash> for String {
    fn from(h: ContentHash) -> Self {
        h.0
    }
}
