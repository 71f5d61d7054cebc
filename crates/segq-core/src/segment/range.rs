//! Segment type and block rounding helpers.

use serde::{Deserialize, Serialize};

/// A byte range `[start, start + size)` (half-open).
///
/// `overlapped` marks a speculative duplicate request for a range another peer
/// is already fetching; such a segment is never authoritative and must not be
/// recorded as done. Equality only looks at the range.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Segment {
    start: u64,
    size: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    overlapped: bool,
}

impl Segment {
    /// Size used for a stream whose total length is unknown.
    pub const UNBOUNDED: u64 = u64::MAX;

    pub const fn new(start: u64, size: u64) -> Self {
        Self {
            start,
            size,
            overlapped: false,
        }
    }

    /// The whole stream from offset 0, length unknown.
    pub const fn unbounded() -> Self {
        Self::new(0, Self::UNBOUNDED)
    }

    /// Build from half-open bounds; `end < start` yields an empty segment.
    pub fn from_bounds(start: u64, end: u64) -> Self {
        Self::new(start, end.saturating_sub(start))
    }

    pub fn with_overlapped(mut self, overlapped: bool) -> Self {
        self.overlapped = overlapped;
        self
    }

    pub const fn start(&self) -> u64 {
        self.start
    }

    pub const fn size(&self) -> u64 {
        self.size
    }

    /// End offset (exclusive). Saturates for unbounded segments.
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub const fn is_unbounded(&self) -> bool {
        self.size == Self::UNBOUNDED
    }

    pub const fn is_overlapped(&self) -> bool {
        self.overlapped
    }

    pub(crate) fn set_overlapped(&mut self, overlapped: bool) {
        self.overlapped = overlapped;
    }

    /// Shrink to at most `max` bytes, keeping the start.
    pub fn clip(mut self, max: u64) -> Self {
        self.size = self.size.min(max);
        self
    }

    /// True if the two ranges share at least one byte. Touching ranges do not overlap.
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// True if `other` lies entirely inside this segment.
    pub fn contains(&self, other: &Segment) -> bool {
        self.start <= other.start && other.end() <= self.end()
    }

    /// True if `pos` falls inside this segment.
    pub fn contains_pos(&self, pos: u64) -> bool {
        self.start <= pos && pos < self.end()
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.size == other.size
    }
}

impl Eq for Segment {}

/// Round `value` down to a multiple of `block`. A zero block leaves the value unchanged.
pub fn round_down(value: u64, block: u64) -> u64 {
    if block == 0 {
        return value;
    }
    value - value % block
}

/// Round `value` up to a multiple of `block`, saturating at `u64::MAX`.
pub fn round_up(value: u64, block: u64) -> u64 {
    if block == 0 {
        return value;
    }
    match value % block {
        0 => value,
        rem => value.saturating_add(block - rem),
    }
}
