//! Speculative overlap of a slow running segment by a faster peer.

use std::time::Duration;

use crate::segment::{round_down, RunningSegments, Segment};
use crate::transfer::Transfer;

/// Requesting peer must do better than this (bytes/s) to overlap anyone.
const MIN_OVERLAP_SPEED: u64 = 10 * 1024;
/// A transfer must have run this long before it is judged slow.
const MIN_RUNNING_TIME: Duration = Duration::from_secs(2);
/// Transfers finishing sooner than this are left alone.
const MIN_SECONDS_LEFT: u64 = 10;

/// Remainder of a slow transfer, from its last block boundary, that a peer
/// running at `last_speed` would finish at least twice as fast.
pub(super) fn overlap_slow_segment<T: Transfer>(
    running: &RunningSegments<T>,
    block_size: u64,
    last_speed: u64,
) -> Option<Segment> {
    if last_speed <= MIN_OVERLAP_SPEED {
        return None;
    }
    for entry in running {
        let Some(transfer) = entry.transfer() else {
            continue;
        };
        let seg = entry.segment();
        if seg.is_overlapped() || !transfer.is_started() {
            continue;
        }
        if transfer.running_for() < MIN_RUNNING_TIME {
            continue;
        }
        let Some(seconds_left) = transfer.seconds_left() else {
            continue;
        };
        if seconds_left < MIN_SECONDS_LEFT {
            continue;
        }
        let pos = round_down(transfer.position(), block_size);
        let size = seg.size().saturating_sub(pos);
        if size == 0 {
            continue;
        }
        let new_chunk_left = size / last_speed;
        if 2 * new_chunk_left < seconds_left {
            return Some(Segment::new(seg.start() + pos, size).with_overlapped(true));
        }
    }
    None
}
