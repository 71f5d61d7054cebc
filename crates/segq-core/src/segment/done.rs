//! Sorted set of completed ranges with merge-on-insert.

use super::Segment;

/// Completed byte ranges of one file.
///
/// Entries are kept sorted by start, pairwise non-overlapping and non-adjacent:
/// any insert that touches a neighbour is merged into it immediately. `size()`
/// always equals the sum of the entry sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoneSegments {
    segments: Vec<Segment>,
    size: u64,
}

impl DoneSegments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed range.
    ///
    /// A range that partially overlaps existing entries is merged with them,
    /// so only the new bytes count towards `size()`. A range already fully
    /// covered is ignored with a warning. Overlapped (speculative) segments
    /// must not be recorded: asserted in debug builds, ignored otherwise.
    /// Empty segments are ignored.
    pub fn insert(&mut self, segment: Segment) {
        debug_assert!(
            !segment.is_overlapped(),
            "overlapped segment recorded as done: {segment:?}"
        );
        if segment.is_overlapped() {
            tracing::warn!(?segment, "ignoring overlapped segment reported as done");
            return;
        }
        if segment.is_empty() {
            return;
        }

        let idx = self
            .segments
            .partition_point(|s| s.start() < segment.start());
        let covered = (idx > 0 && self.segments[idx - 1].contains(&segment))
            || self.segments.get(idx).is_some_and(|s| s.contains(&segment));
        if covered {
            tracing::warn!(?segment, "done segment already recorded");
            return;
        }

        self.segments.insert(idx, segment);
        self.size += segment.size();
        self.merge_around(idx);
    }

    /// Merge the entry at `idx` with touching or overlapping neighbours,
    /// keeping `size` in sync.
    fn merge_around(&mut self, idx: usize) {
        let mut idx = idx;
        if idx > 0 && self.segments[idx - 1].end() >= self.segments[idx].start() {
            idx -= 1;
        }
        while idx + 1 < self.segments.len() {
            let prev = self.segments[idx];
            let next = self.segments[idx + 1];
            if prev.end() < next.start() {
                break;
            }
            let merged = Segment::from_bounds(prev.start(), prev.end().max(next.end()));
            self.size = self.size - prev.size() - next.size() + merged.size();
            self.segments[idx] = merged;
            self.segments.remove(idx + 1);
        }
    }

    /// Drop all completed ranges.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.size = 0;
    }

    /// Total number of completed bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn to_vec(&self) -> Vec<Segment> {
        self.segments.clone()
    }

    /// True iff the only entry is `[0, total_size)`.
    pub fn is_finished(&self, total_size: u64) -> bool {
        matches!(self.segments.as_slice(), [only] if only.start() == 0 && only.size() == total_size)
    }

    /// Length of already-downloaded contiguous data starting at `pos`, at most `max_len`.
    ///
    /// Returns `None` if `pos` is not inside a completed range or `max_len` is zero.
    pub fn chunk_downloaded_at(&self, pos: u64, max_len: u64) -> Option<u64> {
        if max_len == 0 {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.start() <= pos);
        let seg = self.segments.get(idx.checked_sub(1)?)?;
        seg.contains_pos(pos).then(|| max_len.min(seg.end() - pos))
    }
}

impl<'a> IntoIterator for &'a DoneSegments {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(done: &DoneSegments) {
        let sum: u64 = done.iter().map(|s| s.size()).sum();
        assert_eq!(done.size(), sum, "size must equal the sum of entries");
        for pair in done.segments.windows(2) {
            assert!(
                pair[0].end() < pair[1].start(),
                "entries must be sorted and non-adjacent: {pair:?}"
            );
        }
    }

    #[test]
    fn insert_disjoint_keeps_order() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(500, 100));
        done.insert(Segment::new(0, 100));
        done.insert(Segment::new(250, 50));
        assert_invariants(&done);
        let starts: Vec<u64> = done.iter().map(|s| s.start()).collect();
        assert_eq!(starts, vec![0, 250, 500]);
        assert_eq!(done.size(), 250);
    }

    #[test]
    fn adjacent_segments_merge() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(0, 100));
        done.insert(Segment::new(100, 100));
        assert_eq!(done.len(), 1);
        assert_eq!(done.first(), Some(&Segment::new(0, 200)));
        assert_invariants(&done);
    }

    #[test]
    fn gap_fill_merges_both_neighbours() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(0, 100));
        done.insert(Segment::new(200, 100));
        done.insert(Segment::new(400, 100));
        assert_eq!(done.len(), 3);
        done.insert(Segment::new(100, 100));
        assert_eq!(done.len(), 2);
        done.insert(Segment::new(300, 100));
        assert_eq!(done.len(), 1);
        assert_eq!(done.first(), Some(&Segment::new(0, 500)));
        assert_eq!(done.size(), 500);
        assert_invariants(&done);
    }

    #[test]
    fn random_order_inserts_keep_invariants() {
        let mut done = DoneSegments::new();
        let order = [7u64, 2, 9, 0, 5, 3, 8, 1, 6, 4];
        for (n, i) in order.iter().enumerate() {
            done.insert(Segment::new(i * 10, 10));
            assert_invariants(&done);
            assert_eq!(done.size(), (n as u64 + 1) * 10);
        }
        assert!(done.is_finished(100));
    }

    #[test]
    fn finished_only_for_single_full_range() {
        let mut done = DoneSegments::new();
        assert!(!done.is_finished(100));
        done.insert(Segment::new(0, 60));
        assert!(!done.is_finished(100));
        done.insert(Segment::new(70, 30));
        assert!(!done.is_finished(100));
        done.insert(Segment::new(60, 10));
        assert!(done.is_finished(100));
        assert!(!done.is_finished(101));
    }

    #[test]
    fn clear_resets_size() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(0, 60));
        done.clear();
        assert!(done.is_empty());
        assert_eq!(done.size(), 0);
    }

    #[test]
    fn chunk_downloaded_at_clamps_to_segment_and_max_len() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(100, 100));
        done.insert(Segment::new(300, 50));
        assert_eq!(done.chunk_downloaded_at(100, 1000), Some(100));
        assert_eq!(done.chunk_downloaded_at(150, 1000), Some(50));
        assert_eq!(done.chunk_downloaded_at(150, 20), Some(20));
        assert_eq!(done.chunk_downloaded_at(320, 1000), Some(30));
        assert_eq!(done.chunk_downloaded_at(200, 1000), None);
        assert_eq!(done.chunk_downloaded_at(50, 1000), None);
        assert_eq!(done.chunk_downloaded_at(150, 0), None);
    }

    #[test]
    fn empty_segment_is_ignored() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(10, 0));
        assert!(done.is_empty());
    }

    #[test]
    fn partial_overlap_merges_and_counts_new_bytes_once() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(0, 100));
        done.insert(Segment::new(50, 100));
        assert_eq!(done.to_vec(), vec![Segment::new(0, 150)]);
        assert_eq!(done.size(), 150);
        assert_invariants(&done);
    }

    #[test]
    fn insert_spanning_several_entries_absorbs_them() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(0, 150));
        done.insert(Segment::new(170, 10));
        done.insert(Segment::new(200, 100));
        done.insert(Segment::new(400, 50));
        done.insert(Segment::new(100, 250));
        assert_eq!(
            done.to_vec(),
            vec![Segment::new(0, 350), Segment::new(400, 50)]
        );
        assert_eq!(done.size(), 400);
        assert_invariants(&done);
    }

    #[test]
    fn same_start_longer_range_replaces_entry() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(100, 50));
        done.insert(Segment::new(100, 80));
        assert_eq!(done.to_vec(), vec![Segment::new(100, 80)]);
        assert_eq!(done.size(), 80);
        assert_invariants(&done);
    }

    #[test]
    fn covered_insert_is_ignored() {
        let mut done = DoneSegments::new();
        done.insert(Segment::new(0, 100));
        done.insert(Segment::new(20, 30));
        done.insert(Segment::new(0, 100));
        assert_eq!(done.to_vec(), vec![Segment::new(0, 100)]);
        assert_eq!(done.size(), 100);
    }
}
