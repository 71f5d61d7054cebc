//! Source record and the partial-availability state of a PFS peer.

use crate::parts::PartsInfo;

use super::SourceFlags;

/// A partial source stops being queried after this many unanswered requests.
pub const MAX_PENDING_QUERIES: u8 = 10;

/// What a partial-file peer told us about the blocks it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialSource {
    /// Block size the peer's bitmap is expressed in.
    pub block_size: u64,
    /// Advertised available blocks.
    pub parts: PartsInfo,
    /// Earliest time (ms, caller's clock) the peer may be queried again.
    pub next_query_time: u64,
    /// Queries sent without a reply.
    pub pending_query_count: u8,
}

impl PartialSource {
    pub fn new(block_size: u64, parts: PartsInfo, next_query_time: u64) -> Self {
        Self {
            block_size,
            parts,
            next_query_time,
            pending_query_count: 0,
        }
    }

    /// Due for a PFS query at `now`.
    pub fn is_candidate(&self, now: u64) -> bool {
        self.pending_query_count < MAX_PENDING_QUERIES && self.next_query_time <= now
    }

    /// Record an outgoing query and schedule the next one.
    pub fn mark_queried(&mut self, next_query_time: u64) {
        self.pending_query_count = self.pending_query_count.saturating_add(1);
        self.next_query_time = next_query_time;
    }

    /// Replace the advertised bitmap after a reply.
    pub fn update_parts(&mut self, block_size: u64, parts: PartsInfo) {
        self.block_size = block_size;
        self.parts = parts;
        self.pending_query_count = 0;
    }
}

/// Per-peer source record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    flags: SourceFlags,
    partial: Option<PartialSource>,
}

impl Source {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> SourceFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: SourceFlags) {
        self.flags |= flags;
    }

    pub fn clear_flags(&mut self, flags: SourceFlags) {
        self.flags.remove(flags);
    }

    pub fn partial_source(&self) -> Option<&PartialSource> {
        self.partial.as_ref()
    }

    pub fn partial_source_mut(&mut self) -> Option<&mut PartialSource> {
        self.partial.as_mut()
    }

    /// Attach (or replace) partial availability; marks the source `PARTIAL`.
    pub fn set_partial_source(&mut self, partial: PartialSource) {
        self.flags |= SourceFlags::PARTIAL;
        self.partial = Some(partial);
    }

    /// Drop partial state, e.g. once the peer turns out to have the full file.
    pub fn clear_partial_source(&mut self) {
        self.flags.remove(SourceFlags::PARTIAL);
        self.partial = None;
    }

    /// Eligible for PFS queries given the partition it sits in. Timing is
    /// checked separately by [`PartialSource::is_candidate`].
    pub fn is_pfs_eligible(&self, is_bad: bool) -> bool {
        if !self.flags.contains(SourceFlags::PARTIAL) || self.partial.is_none() {
            return false;
        }
        if !is_bad {
            return true;
        }
        let reasons = self.flags.reasons();
        (reasons & !SourceFlags::PFS_RETRY_REASONS).is_empty()
    }
}
