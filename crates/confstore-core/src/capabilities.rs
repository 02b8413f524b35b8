//! Capability bitset granted to an owner over a target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of Read/Write/Delete/Permit capabilities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1 << 0);
    pub const WRITE: Self = Self(1 << 1);
    pub const DELETE: Self = Self(1 << 2);
    pub const PERMIT: Self = Self(1 << 3);

    /// Everything a first writer receives.
    pub const ALL: Self = Self(Self::READ.0 | Self::WRITE.0 | Self::DELETE.0 | Self::PERMIT.0);

    /// Create from raw bits, dropping unknown bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// The raw bits.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether every capability in `other` is present.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ, "Read"),
            (Self::WRITE, "Write"),
            (Self::DELETE, "Delete"),
            (Self::PERMIT, "Permit"),
        ]
        .iter()
        .filter(|(cap, _)| self.contains(*cap))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "Capabilities({})", names.join("|"))
    }
}
