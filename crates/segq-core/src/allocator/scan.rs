//! Forward and backward window scans over the file.

use crate::segment::{round_up, DoneSegments, RunningSegments, Segment};

pub(super) struct Scanner<'a, T> {
    pub total: u64,
    pub block_size: u64,
    pub target: u64,
    pub done: &'a DoneSegments,
    pub running: &'a RunningSegments<T>,
    /// Byte offsets of the peer's available ranges, in `(start, end)` pairs.
    pub positions: &'a [u64],
}

impl<T> Scanner<'_, T> {
    /// Window `[start, end)` of `cur` bytes is unusable.
    ///
    /// Windows of at most one block only count as done when a completed range
    /// swallows them whole; larger windows are rejected on any overlap.
    fn is_taken(&self, window: &Segment, start: u64, end: u64, cur: u64) -> bool {
        let done_hit = self.done.iter().any(|d| {
            if cur <= self.block_size {
                d.start() <= start && d.end() >= end
            } else {
                window.overlaps(d)
            }
        });
        done_hit || self.running.overlaps(window)
    }

    /// Every slice of `[start, end)` the peer advertises.
    fn collect_needed(&self, start: u64, end: u64, needed: &mut Vec<Segment>) {
        for pair in self.positions.chunks_exact(2) {
            let (p_start, p_end) = (pair[0], pair[1]);
            let hit = (p_start <= start && start < p_end) || (start <= p_start && p_start < end);
            if !hit {
                continue;
            }
            let b = start.max(p_start);
            let e = end.min(p_end);
            debug_assert!(b % self.block_size == 0, "needed part not block aligned");
            debug_assert!(e % self.block_size == 0 || e == self.total);
            needed.push(Segment::from_bounds(b, e));
        }
    }

    /// Scan from the end of the leading done range towards EOF.
    ///
    /// With `needed == None` the first free window is returned. Otherwise the
    /// whole file is scanned and the peer-available slices of every free window
    /// are collected instead.
    pub fn forward(&self, mut needed: Option<&mut Vec<Segment>>) -> Option<Segment> {
        let mut start = match self.done.first() {
            Some(first) if first.start() == 0 => first.end(),
            _ => 0,
        };
        let mut cur = self.target;
        while start < self.total {
            let end = self.total.min(start.saturating_add(cur));
            let window = Segment::from_bounds(start, end);
            let taken = self.is_taken(&window, start, end, cur);
            if !taken {
                match needed.as_deref_mut() {
                    None => return Some(window),
                    Some(parts) => self.collect_needed(start, end, parts),
                }
            }
            if taken && cur > self.block_size {
                cur -= self.block_size;
            } else {
                start = end;
                cur = self.target;
            }
        }
        None
    }

    /// Scan from the start of the trailing done range (or the block-rounded
    /// EOF) towards offset 0.
    pub fn backward(&self, mut needed: Option<&mut Vec<Segment>>) -> Option<Segment> {
        let mut end = match self.done.last() {
            Some(last) if last.end() == self.total => last.start(),
            _ => 0,
        };
        if end == 0 {
            end = round_up(self.total, self.block_size);
        }
        let mut cur = self.target;
        while end > 0 {
            let start = end.saturating_sub(cur);
            let window = Segment::from_bounds(start, end.min(self.total));
            let taken = self.is_taken(&window, start, end, cur);
            if !taken {
                match needed.as_deref_mut() {
                    None => return Some(window),
                    Some(parts) => self.collect_needed(start, end, parts),
                }
            }
            if taken && cur > self.block_size {
                cur -= self.block_size;
            } else {
                end = start;
                cur = self.target;
            }
        }
        None
    }
}
