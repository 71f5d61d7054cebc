//! Window sizing and scan direction.

use crate::segment::{round_down, DoneSegments};

use super::SegmentParams;

/// Smallest leading done range (bytes) before a want-end item scans backward.
pub const BACKWARD_MIN_HEAD: u64 = 1024 * 1204;

/// Once the tail range exceeds this share of the file, scan forward again.
pub const BACKWARD_TAIL_PERCENT: u64 = 3;

/// Window size for the next request.
///
/// `wanted * max(0.25, 1 - done_fraction^2)`, capped at `max_chunk_size`,
/// rounded down to whole blocks and never below one block.
pub fn target_size(params: &SegmentParams, done_size: u64, total: u64, block_size: u64) -> u64 {
    let done_part = if total == 0 {
        0.0
    } else {
        done_size as f64 / total as f64
    };
    let factor = f64::max(0.25, 1.0 - done_part * done_part);
    let mut target = (params.wanted_size as f64 * factor) as u64;
    if params.max_chunk_size != 0 && target > params.max_chunk_size {
        target = params.max_chunk_size;
    }
    if target > block_size {
        round_down(target, block_size)
    } else {
        block_size
    }
}

/// Scan from the end of the file instead of the start.
///
/// Only for items that want the end early, once the head is at least
/// [`BACKWARD_MIN_HEAD`] long, and while the tail range reaching EOF is still
/// below [`BACKWARD_TAIL_PERCENT`] of the file.
pub fn should_search_backward(done: &DoneSegments, total: u64, want_end: bool) -> bool {
    if !want_end {
        return false;
    }
    let Some(first) = done.first() else {
        return false;
    };
    if first.start() != 0 || first.size() < BACKWARD_MIN_HEAD {
        return false;
    }
    if let Some(last) = done.last() {
        let required = (u128::from(total) * u128::from(BACKWARD_TAIL_PERCENT) / 100) as u64;
        if last.end() == total && last.size() >= required {
            return false;
        }
    }
    true
}
