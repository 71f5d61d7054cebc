//! Chunk selection: which byte range to request next from a peer.
//!
//! The allocator is a pure function of the item's done and running ranges,
//! its block size and the per-call [`SegmentParams`]. It never mutates state;
//! the queue item registers the returned range under the same lock.
//!
//! Selection in multi-chunk mode:
//! 1. Size the window: large while little is done, shrinking quadratically
//!    towards a quarter of the wanted size near completion.
//! 2. Scan forward from the first gap (or backward from the end for
//!    "want end of file" items that already have a solid head).
//! 3. With a partial peer, collect the parts of free windows the peer actually
//!    has and pick one at random so concurrent requesters spread out.

mod overlap;
mod scan;
mod target;

use rand::Rng;

use crate::config::AllocationConfig;
use crate::segment::{round_down, round_up, DoneSegments, RunningSegments, Segment};
use crate::source::PartialSource;
use crate::transfer::Transfer;

pub use target::{should_search_backward, target_size, BACKWARD_MIN_HEAD, BACKWARD_TAIL_PERCENT};

/// Why no segment was handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// Single-chunk mode and a segment is already running.
    #[error("download slot already taken")]
    DownloadSlotsTaken,
    /// Segment limit reached, or the file is already fast enough.
    #[error("no free block")]
    NoFreeBlock,
    /// Nothing left that this peer can provide.
    #[error("no needed part")]
    NoNeededPart,
}

/// Per-call allocation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentParams {
    pub enable_multi_chunk: bool,
    pub overlap_chunks: bool,
    /// Preferred chunk size for this peer, in bytes.
    pub wanted_size: u64,
    /// Cap on chunk size (0 = none).
    pub max_chunk_size: u64,
    pub dont_begin_segment: bool,
    pub dont_begin_segment_speed_kib: u64,
    /// Last measured speed of the requesting peer, bytes/s.
    pub last_speed: u64,
}

impl SegmentParams {
    pub fn from_config(cfg: &AllocationConfig, wanted_size: u64, last_speed: u64) -> Self {
        Self {
            enable_multi_chunk: cfg.enable_multi_chunk,
            overlap_chunks: cfg.overlap_chunks,
            wanted_size,
            max_chunk_size: cfg.max_chunk_size,
            dont_begin_segment: cfg.dont_begin_segment,
            dont_begin_segment_speed_kib: cfg.dont_begin_segment_speed_kib,
            last_speed,
        }
    }
}

impl Default for SegmentParams {
    fn default() -> Self {
        let cfg = AllocationConfig::default();
        Self::from_config(&cfg, cfg.wanted_chunk_size, 0)
    }
}

/// Snapshot of item state the allocator reads.
#[derive(Debug)]
pub struct AllocationContext<'a, T> {
    /// `None` when the size is unknown.
    pub total_size: Option<u64>,
    pub block_size: u64,
    pub max_segments: usize,
    /// Item wants the end of the file early (e.g. media previews).
    pub want_end: bool,
    /// Aggregate speed of all running transfers, bytes/s.
    pub average_speed: u64,
    pub done: &'a DoneSegments,
    pub running: &'a RunningSegments<T>,
}

/// Pick the next range to request.
pub fn next_segment<T: Transfer>(
    ctx: &AllocationContext<'_, T>,
    params: &SegmentParams,
    partial: Option<&PartialSource>,
) -> Result<Segment, AllocError> {
    next_segment_with_rng(ctx, params, partial, &mut rand::thread_rng())
}

/// [`next_segment`] with an explicit random source for the partial-source pick.
pub fn next_segment_with_rng<T: Transfer, R: Rng + ?Sized>(
    ctx: &AllocationContext<'_, T>,
    params: &SegmentParams,
    partial: Option<&PartialSource>,
    rng: &mut R,
) -> Result<Segment, AllocError> {
    let block_size = ctx.block_size;
    let total = match ctx.total_size {
        Some(total) if block_size != 0 => total,
        _ => return Ok(Segment::unbounded()),
    };

    if !params.enable_multi_chunk {
        return single_segment(ctx, total);
    }

    if ctx.running.len() >= ctx.max_segments {
        tracing::trace!(running = ctx.running.len(), "segment limit reached");
        return Err(AllocError::NoFreeBlock);
    }
    if params.dont_begin_segment
        && params.dont_begin_segment_speed_kib.saturating_mul(1024) < ctx.average_speed
    {
        tracing::trace!(speed = ctx.average_speed, "fast enough, not opening a segment");
        return Err(AllocError::NoFreeBlock);
    }

    let positions = match partial {
        Some(ps) if ps.block_size == block_size => ps.parts.to_positions(block_size, total),
        _ => Vec::new(),
    };
    let target = target_size(params, ctx.done.size(), total, block_size);

    let mut needed: Vec<Segment> = Vec::new();
    let collect = partial.is_some().then_some(&mut needed);
    let scanner = scan::Scanner {
        total,
        block_size,
        target,
        done: ctx.done,
        running: ctx.running,
        positions: &positions,
    };
    let found = if should_search_backward(ctx.done, total, ctx.want_end) {
        scanner.backward(collect)
    } else {
        scanner.forward(collect)
    };
    if let Some(block) = found {
        tracing::debug!(?block, target, "allocated free block");
        return Ok(block);
    }

    if !needed.is_empty() {
        tracing::debug!(candidates = needed.len(), "picking a partial-source chunk");
        let pick = needed[rng.gen_range(0..needed.len())];
        return Ok(pick.clip(target));
    }

    if partial.is_none() && params.overlap_chunks {
        if let Some(seg) = overlap::overlap_slow_segment(ctx.running, block_size, params.last_speed)
        {
            tracing::debug!(segment = ?seg, "overlapping slow running segment");
            return Ok(seg);
        }
    }

    Err(AllocError::NoNeededPart)
}

/// Single-chunk mode: one segment at a time covering the next gap.
fn single_segment<T>(ctx: &AllocationContext<'_, T>, total: u64) -> Result<Segment, AllocError> {
    if !ctx.running.is_empty() {
        return Err(AllocError::DownloadSlotsTaken);
    }
    let block_size = ctx.block_size;
    let mut start = 0;
    let mut end = total;
    if let Some(first) = ctx.done.first() {
        if first.start() > 0 {
            end = round_up(first.start(), block_size);
        } else {
            start = round_down(first.end(), block_size);
            if let Some(second) = ctx.done.get(1) {
                end = round_up(second.start(), block_size);
            }
        }
    }
    let end = end.min(total);
    if start >= end || ctx.done.is_finished(total) {
        tracing::trace!(start, end, "no gap left for a single segment");
        return Err(AllocError::NoNeededPart);
    }
    Ok(Segment::from_bounds(start, end))
}
