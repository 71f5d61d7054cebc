//! One downloadable file shared by many peer connections.
//!
//! A [`QueueItem`] aggregates the completed ranges, the in-flight ranges, the
//! source table and the priority attributes of a file behind two locks:
//!
//! - the segment lock guards block size, done and running ranges, sources and
//!   the downloaded-bytes/speed counters. Allocation and completion both run
//!   under it, so two callers are never handed overlapping ranges;
//! - the attribute lock guards priority, auto flag, segment limit and queue
//!   bucket.
//!
//! The two are never held together. Operations needing both copy what they
//! need out of one guard, drop it, then take the other.

mod flags;
mod progress;
mod segments;
mod snapshot;

pub use flags::ItemFlags;
pub use progress::ItemProgress;
pub use snapshot::{ChunksView, QueueItemSnapshot, RunningChunk};

use std::fmt;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::block::tree_block_size;
use crate::config::SegqConfig;
use crate::priority::{self, Priority};
use crate::segment::{DoneSegments, RunningSegments};
use crate::source::{PartialSource, PfsCandidate, SourceFlags, SourceTable};
use crate::transfer::Transfer;

/// State guarded by the segment lock.
struct SegmentState<P: Ord, T> {
    block_size: u64,
    done: DoneSegments,
    running: RunningSegments<T>,
    sources: SourceTable<P>,
    downloaded_bytes: u64,
    average_speed: u64,
}

/// State guarded by the attribute lock.
#[derive(Debug, Clone, Copy)]
struct Attributes {
    priority: Priority,
    auto_priority: bool,
    max_segments: usize,
    /// Priority bucket the queue manager filed the item under; `None` while
    /// the item has no active sources.
    queue_bucket: Option<Priority>,
}

/// A queued file: what is done, what is running, who has it.
///
/// `P` is the peer identity, `T` the connection layer's transfer handle.
pub struct QueueItem<P: Ord, T> {
    target: PathBuf,
    total_size: Option<u64>,
    flags: ItemFlags,
    /// Unix seconds when the item was queued.
    added: u64,
    segments: Mutex<SegmentState<P, T>>,
    attribs: Mutex<Attributes>,
    sources_version: AtomicU64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl<P, T> QueueItem<P, T>
where
    P: Ord + Clone + Debug,
    T: Transfer<Peer = P>,
{
    /// New item with the tree-derived block size, normal priority and a single
    /// segment.
    pub fn new(target: impl Into<PathBuf>, total_size: Option<u64>, flags: ItemFlags) -> Self {
        let target = target.into();
        let block_size = tree_block_size(total_size);
        tracing::debug!(path = %target.display(), ?total_size, block_size, ?flags, "queue item created");
        Self {
            target,
            total_size,
            flags,
            added: unix_now(),
            segments: Mutex::new(SegmentState {
                block_size,
                done: DoneSegments::new(),
                running: RunningSegments::new(),
                sources: SourceTable::new(),
                downloaded_bytes: 0,
                average_speed: 0,
            }),
            attribs: Mutex::new(Attributes {
                priority: Priority::default(),
                auto_priority: false,
                max_segments: 1,
                queue_bucket: None,
            }),
            sources_version: AtomicU64::new(0),
        }
    }

    /// New item using the configured segment limit and auto-priority default.
    /// File lists always use one segment.
    pub fn from_config(
        target: impl Into<PathBuf>,
        total_size: Option<u64>,
        flags: ItemFlags,
        cfg: &SegqConfig,
    ) -> Self {
        let item = Self::new(target, total_size, flags);
        {
            let mut attribs = item.attribs();
            attribs.auto_priority = cfg.auto_priority;
            if !flags.is_list() {
                attribs.max_segments = cfg.default_max_segments.max(1);
            }
        }
        item
    }

    fn state(&self) -> MutexGuard<'_, SegmentState<P, T>> {
        self.segments.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attribs(&self) -> MutexGuard<'_, Attributes> {
        self.attribs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Force a block size that need not follow the tree layout.
    #[cfg(test)]
    pub(crate) fn with_block_size(mut self, block_size: u64) -> Self {
        self.segments
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .block_size = block_size;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// `None` when the size is not known yet.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    pub fn added(&self) -> u64 {
        self.added
    }

    pub fn block_size(&self) -> u64 {
        self.state().block_size
    }

    /// Same item under a new target path. Downloaded data, sources and
    /// attributes move along; the sources version restarts from zero.
    pub fn retarget(self, new_target: impl Into<PathBuf>) -> Self {
        let new_target = new_target.into();
        tracing::info!(
            from = %self.target.display(),
            to = %new_target.display(),
            "queue item moved"
        );
        Self {
            target: new_target,
            sources_version: AtomicU64::new(0),
            ..self
        }
    }

    // ---- sources ----

    fn bump_sources_version(&self) {
        self.sources_version.fetch_add(1, Ordering::Release);
    }

    /// Counter bumped on every source add/remove.
    pub fn sources_version(&self) -> u64 {
        self.sources_version.load(Ordering::Acquire)
    }

    /// Add `peer` as an active source, reviving its bad record if any.
    pub fn add_source(&self, peer: P) -> bool {
        let mut st = self.state();
        let added = st.sources.add_source(peer);
        if added {
            self.bump_sources_version();
        }
        added
    }

    /// Demote `peer` to a bad source for `reason`.
    ///
    /// When this leaves no active source the queue bucket is reset.
    pub fn remove_source(&self, peer: &P, reason: SourceFlags) -> bool {
        let (removed, now_empty) = {
            let mut st = self.state();
            let removed = st.sources.remove_source(peer, reason);
            if removed {
                self.bump_sources_version();
            }
            (removed, st.sources.is_empty())
        };
        if removed && now_empty {
            tracing::debug!(path = %self.target.display(), "last active source removed");
            self.attribs().queue_bucket = None;
        }
        removed
    }

    pub fn is_source(&self, peer: &P) -> bool {
        self.state().sources.is_source(peer)
    }

    pub fn is_bad_source(&self, peer: &P) -> bool {
        self.state().sources.is_bad_source(peer)
    }

    /// Bad for a reason other than those in `exceptions`.
    pub fn is_bad_source_except(&self, peer: &P, exceptions: SourceFlags) -> bool {
        self.state().sources.is_bad_source_except(peer, exceptions)
    }

    /// Flags of `peer` in either partition.
    pub fn source_flags(&self, peer: &P) -> Option<SourceFlags> {
        self.state().sources.any_source(peer).map(|s| s.flags())
    }

    pub fn active_source_count(&self) -> usize {
        self.state().sources.active_len()
    }

    pub fn bad_source_count(&self) -> usize {
        self.state().sources.bad_len()
    }

    pub fn online_sources<F>(&self, is_online: F) -> Vec<P>
    where
        F: Fn(&P) -> bool,
    {
        self.state().sources.online_sources(is_online)
    }

    pub fn online_source_count<F>(&self, is_online: F) -> usize
    where
        F: Fn(&P) -> bool,
    {
        self.state().sources.online_source_count(is_online)
    }

    pub fn has_online_sources<F>(&self, count: usize, is_online: F) -> bool
    where
        F: Fn(&P) -> bool,
    {
        self.state().sources.has_online_sources(count, is_online)
    }

    pub fn first_source(&self) -> Option<P> {
        self.state().sources.first_source().cloned()
    }

    /// Record what a partial peer advertised. False if `peer` is unknown.
    pub fn set_partial_source(&self, peer: &P, partial: PartialSource) -> bool {
        self.state().sources.set_partial_source(peer, partial)
    }

    /// Partial record of `peer`, if it has one.
    pub fn partial_source(&self, peer: &P) -> Option<PartialSource> {
        self.state()
            .sources
            .any_source(peer)
            .and_then(|s| s.partial_source())
            .cloned()
    }

    /// Note that a PFS query was sent to `peer`.
    pub fn mark_pfs_queried(&self, peer: &P, next_query_time: u64) -> bool {
        let mut st = self.state();
        match st
            .sources
            .any_source_mut(peer)
            .and_then(|s| s.partial_source_mut())
        {
            Some(ps) => {
                ps.mark_queried(next_query_time);
                true
            }
            None => false,
        }
    }

    /// Partial sources due for a query at `now`, earliest first.
    pub fn pfs_candidates(&self, now: u64, max_count: usize) -> Vec<PfsCandidate<P>> {
        self.state().sources.pfs_candidates(now, max_count)
    }

    // ---- priority ----

    pub fn priority(&self) -> Priority {
        self.attribs().priority
    }

    pub fn set_priority(&self, priority: Priority) {
        self.attribs().priority = priority;
    }

    pub fn is_auto_priority(&self) -> bool {
        self.attribs().auto_priority
    }

    pub fn set_auto_priority(&self, auto: bool) {
        self.attribs().auto_priority = auto;
    }

    /// Priority the scheduler should use right now.
    pub fn effective_priority(&self) -> Priority {
        let downloaded = self.state().downloaded_bytes;
        let attribs = *self.attribs();
        priority::effective_priority(
            attribs.priority,
            attribs.auto_priority,
            downloaded,
            self.total_size,
        )
    }

    pub fn max_segments(&self) -> usize {
        self.attribs().max_segments
    }

    /// Set the concurrent segment limit. Zero is raised to one.
    pub fn set_max_segments(&self, max_segments: usize) {
        if max_segments == 0 {
            tracing::warn!(path = %self.target.display(), "max_segments of 0 raised to 1");
        }
        self.attribs().max_segments = max_segments.max(1);
    }

    pub fn queue_priority(&self) -> Option<Priority> {
        self.attribs().queue_bucket
    }

    pub fn set_queue_priority(&self, bucket: Option<Priority>) {
        self.attribs().queue_bucket = bucket;
    }
}

impl<P: Ord, T> fmt::Debug for QueueItem<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("target", &self.target)
            .field("total_size", &self.total_size)
            .field("flags", &self.flags)
            .field("sources_version", &self.sources_version.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
