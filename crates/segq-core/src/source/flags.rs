//! Source flag bits: exclusion reasons plus a few descriptive markers.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Bitmask of source flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceFlags(u32);

impl SourceFlags {
    pub const NONE: Self = Self(0);
    /// Peer answered that it does not have the file.
    pub const FILE_NOT_AVAILABLE: Self = Self(0x01);
    /// Both sides are passive; no connection possible.
    pub const PASSIVE: Self = Self(0x02);
    /// Removed by the user.
    pub const REMOVED: Self = Self(0x04);
    /// Peer does not support hash-based file requests.
    pub const NO_TTHF: Self = Self(0x08);
    /// Peer sent a hash tree that did not match.
    pub const BAD_TREE: Self = Self(0x10);
    /// Peer could not provide a hash tree.
    pub const NO_TREE: Self = Self(0x20);
    /// Disconnected for being too slow.
    pub const SLOW_SOURCE: Self = Self(0x40);
    /// Partial source with no block we still need.
    pub const NO_NEED_PARTS: Self = Self(0x80);
    /// Peer holds only part of the file.
    pub const PARTIAL: Self = Self(0x100);
    /// Data from this peer failed verification.
    pub const TTH_INCONSISTENCY: Self = Self(0x200);
    /// Connection could not be authenticated.
    pub const UNTRUSTED: Self = Self(0x400);

    /// Every reason that can move a source into the bad partition.
    pub const EXCLUSION_MASK: Self = Self(
        Self::FILE_NOT_AVAILABLE.0
            | Self::PASSIVE.0
            | Self::REMOVED.0
            | Self::NO_TTHF.0
            | Self::BAD_TREE.0
            | Self::NO_TREE.0
            | Self::SLOW_SOURCE.0
            | Self::NO_NEED_PARTS.0
            | Self::TTH_INCONSISTENCY.0
            | Self::UNTRUSTED.0,
    );

    /// Exclusion reasons after which a partial source is still worth re-querying:
    /// it may have gained new blocks since.
    pub const PFS_RETRY_REASONS: Self = Self(Self::NO_NEED_PARTS.0 | Self::TTH_INCONSISTENCY.0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Exclusion reasons only.
    pub const fn reasons(self) -> Self {
        Self(self.0 & Self::EXCLUSION_MASK.0)
    }
}

impl BitOr for SourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SourceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SourceFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for SourceFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for SourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceFlags({:#x})", self.0)
    }
}
