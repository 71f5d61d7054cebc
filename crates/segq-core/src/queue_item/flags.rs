//! Item-level flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// What kind of item this is and how it should be fetched.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemFlags(u32);

impl ItemFlags {
    pub const NONE: Self = Self(0);
    /// A peer's file list rather than a shared file.
    pub const USER_LIST: Self = Self(0x01);
    /// Partial file list (one directory of a peer's share).
    pub const PARTIAL_LIST: Self = Self(0x02);
    /// Fetch the end of the file early (media containers with a trailing index).
    pub const WANT_END: Self = Self(0x04);
    /// Opened for viewing once complete.
    pub const CLIENT_VIEW: Self = Self(0x08);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// File lists are always fetched whole.
    pub const fn is_list(self) -> bool {
        self.0 & (Self::USER_LIST.0 | Self::PARTIAL_LIST.0) != 0
    }
}

impl BitOr for ItemFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ItemFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ItemFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ItemFlags, &str); 4] = [
            (ItemFlags::USER_LIST, "USER_LIST"),
            (ItemFlags::PARTIAL_LIST, "PARTIAL_LIST"),
            (ItemFlags::WANT_END, "WANT_END"),
            (ItemFlags::CLIENT_VIEW, "CLIENT_VIEW"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("ItemFlags(NONE)")
        } else {
            write!(f, "ItemFlags({})", set.join(" | "))
        }
    }
}
