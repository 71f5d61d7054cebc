//! Segment operations of a queue item: allocation, completion and the
//! running-transfer bookkeeping around them.

use std::fmt::Debug;
use std::sync::Arc;

use crate::allocator::{self, AllocError, AllocationContext, SegmentParams};
use crate::block::grown_block_size;
use crate::parts::{is_needed_part, PartsInfo};
use crate::segment::Segment;
use crate::source::{PartialSource, SourceFlags};
use crate::transfer::Transfer;

use super::{ChunksView, ItemFlags, ItemProgress, QueueItem, RunningChunk, SegmentState};

/// A transfer this close to finishing is not worth dropping.
const MIN_SECONDS_LEFT_TO_DISCONNECT: u64 = 10;

impl<P, T> QueueItem<P, T>
where
    P: Ord + Clone + Debug,
    T: Transfer<Peer = P>,
{
    /// Record a completed range.
    pub fn add_segment(&self, segment: Segment) {
        tracing::trace!(?segment, "segment done");
        self.state().done.insert(segment);
    }

    /// Register an in-flight range, optionally already bound to its transfer.
    pub fn add_running_segment(&self, segment: Segment, transfer: Option<Arc<T>>) {
        self.state().running.push(segment, transfer);
    }

    /// Drop the running entry for `segment`. False if there was none.
    pub fn remove_running_segment(&self, segment: &Segment) -> bool {
        self.state().running.remove(segment).is_some()
    }

    /// Drop the first running entry whose transfer comes from `peer`.
    pub fn remove_running_for_peer(&self, peer: &P) -> bool {
        self.state()
            .running
            .remove_by_transfer(|t| t.peer() == peer)
            .is_some()
    }

    /// Bind a transfer to the running entry allocated for `segment`.
    pub fn set_transfer_for_segment(&self, segment: &Segment, transfer: Arc<T>) -> bool {
        self.state().running.bind(segment, transfer)
    }

    /// Allocate the next range and register it as running (unbound).
    ///
    /// `partial` is the requesting peer's availability bitmap, if it is a
    /// partial source.
    pub fn next_segment(
        &self,
        params: &SegmentParams,
        partial: Option<&PartialSource>,
    ) -> Result<Segment, AllocError> {
        let max_segments = self.max_segments();
        let mut st = self.state();
        self.allocate(&mut st, max_segments, params, partial)
    }

    /// [`next_segment`](Self::next_segment) for a known source, using the
    /// bitmap it advertised when it is a partial source.
    pub fn next_segment_for(
        &self,
        params: &SegmentParams,
        peer: &P,
    ) -> Result<Segment, AllocError> {
        let max_segments = self.max_segments();
        let mut st = self.state();
        let partial = st
            .sources
            .source(peer)
            .filter(|s| s.flags().contains(SourceFlags::PARTIAL))
            .and_then(|s| s.partial_source())
            .cloned();
        self.allocate(&mut st, max_segments, params, partial.as_ref())
    }

    fn allocate(
        &self,
        st: &mut SegmentState<P, T>,
        max_segments: usize,
        params: &SegmentParams,
        partial: Option<&PartialSource>,
    ) -> Result<Segment, AllocError> {
        let ctx = AllocationContext {
            total_size: self.total_size,
            block_size: st.block_size,
            max_segments,
            want_end: self.flags.contains(ItemFlags::WANT_END),
            average_speed: st.average_speed,
            done: &st.done,
            running: &st.running,
        };
        let segment = allocator::next_segment(&ctx, params, partial)?;
        st.running.push(segment, None);
        Ok(segment)
    }

    /// Forget all completed data.
    pub fn reset_downloaded(&self) {
        let mut st = self.state();
        st.done.clear();
        st.downloaded_bytes = 0;
        tracing::info!(path = %self.target.display(), "downloaded data reset");
    }

    pub fn done_segments(&self) -> Vec<Segment> {
        self.state().done.to_vec()
    }

    pub fn done_size(&self) -> u64 {
        self.state().done.size()
    }

    /// Availability bitmap in the item's own block size.
    pub fn parts(&self) -> PartsInfo {
        let st = self.state();
        self.encode_parts(&st, st.block_size)
    }

    /// Availability bitmap in `block_size` units.
    pub fn get_parts(&self, block_size: u64) -> PartsInfo {
        let st = self.state();
        self.encode_parts(&st, block_size)
    }

    fn encode_parts(&self, st: &SegmentState<P, T>, block_size: u64) -> PartsInfo {
        match self.total_size {
            Some(total) if block_size != 0 => PartsInfo::encode(&st.done, block_size, total),
            _ => PartsInfo::new(),
        }
    }

    /// A peer advertising `theirs` has something we lack.
    pub fn needs_parts_from(&self, theirs: &PartsInfo) -> bool {
        let ours = self.parts();
        if ours.is_empty() {
            return !theirs.is_empty() && theirs.is_well_formed();
        }
        is_needed_part(theirs, &ours)
    }

    pub fn is_finished(&self) -> bool {
        let Some(total) = self.total_size else {
            return false;
        };
        self.state().done.is_finished(total)
    }

    /// Downloaded contiguous bytes from `pos`, at most `max_len`.
    pub fn chunk_downloaded_at(&self, pos: u64, max_len: u64) -> Option<u64> {
        self.state().done.chunk_downloaded_at(pos, max_len)
    }

    /// Adopt a larger block size revealed by a peer's hash tree.
    pub fn update_block_size(&self, block_size: u64) -> bool {
        let mut st = self.state();
        match grown_block_size(st.block_size, block_size) {
            Some(grown) => {
                tracing::debug!(from = st.block_size, to = grown, "block size grown");
                st.block_size = grown;
                true
            }
            None => false,
        }
    }

    /// Recompute downloaded bytes (done plus running progress) and the
    /// aggregate speed of bound transfers.
    pub fn update_downloaded_bytes_and_speed(&self) {
        let mut st = self.state();
        let mut downloaded = st.done.size();
        let mut speed = 0u64;
        for entry in &st.running {
            if let Some(t) = entry.transfer() {
                downloaded = downloaded.saturating_add(t.position());
                speed = speed.saturating_add(t.running_average());
            }
        }
        st.downloaded_bytes = downloaded;
        st.average_speed = speed;
    }

    /// Reset downloaded bytes to the completed total.
    pub fn update_downloaded_bytes(&self) {
        let mut st = self.state();
        st.downloaded_bytes = st.done.size();
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.state().downloaded_bytes
    }

    pub fn average_speed(&self) -> u64 {
        self.state().average_speed
    }

    /// Flag the running entry containing `segment` as overlapped.
    pub fn set_overlapped(&self, segment: &Segment, overlapped: bool) -> bool {
        self.state().running.set_overlapped(segment, overlapped)
    }

    /// Peers with a bound running transfer.
    pub fn running_peers(&self) -> Vec<P> {
        self.state()
            .running
            .iter()
            .filter_map(|e| e.transfer().map(|t| t.peer().clone()))
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.state().running.len()
    }

    /// More than one bound transfer has started receiving data.
    pub fn is_multiple_segments(&self) -> bool {
        self.state()
            .running
            .iter()
            .filter(|e| e.transfer().is_some_and(|t| t.is_started()))
            .nth(1)
            .is_some()
    }

    /// Running ranges with their progress, and the done ranges.
    pub fn chunks_snapshot(&self) -> ChunksView {
        let st = self.state();
        let running = st
            .running
            .iter()
            .map(|e| RunningChunk {
                start: e.segment().start(),
                end: e.segment().end(),
                pos: e.transfer().map_or(0, |t| t.position()),
            })
            .collect();
        ChunksView {
            running,
            done: st.done.to_vec(),
        }
    }

    /// Disconnect every bound transfer except `keep`. Returns how many were told to drop.
    ///
    /// Runs under the segment lock: `Transfer::disconnect` must not call back
    /// into the item.
    pub fn disconnect_others(&self, keep: &Arc<T>) -> usize {
        let st = self.state();
        let mut count = 0;
        for entry in st.running.others(keep) {
            if let Some(t) = entry.transfer() {
                t.disconnect();
                count += 1;
            }
        }
        count
    }

    /// `fast` overlaps a slower transfer: disconnect the slow one unless it is
    /// about to finish. Returns true if a transfer was disconnected.
    pub fn disconnect_slow(&self, fast: &Arc<T>) -> bool {
        let st = self.state();
        let Some(fast_segment) = st.running.segment_of(fast) else {
            return false;
        };
        let Some(slow) = st
            .running
            .others(fast)
            .find(|e| e.segment().contains(&fast_segment))
        else {
            return false;
        };
        let Some(t) = slow.transfer() else {
            return false;
        };
        if t.seconds_left().is_some_and(|s| s < MIN_SECONDS_LEFT_TO_DISCONNECT) {
            return false;
        }
        tracing::debug!(peer = ?t.peer(), segment = ?slow.segment(), "disconnecting slow transfer");
        t.disconnect();
        true
    }

    pub fn progress(&self) -> ItemProgress {
        let st = self.state();
        ItemProgress {
            downloaded: st.downloaded_bytes.max(st.done.size()),
            done: st.done.size(),
            total: self.total_size,
            speed: st.average_speed,
            running_segments: st.running.len(),
            done_segments: st.done.len(),
        }
    }
}
