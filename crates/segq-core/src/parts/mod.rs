//! Partial-availability bitmap exchanged with peers (PFS).
//!
//! A [`PartsInfo`] is a flat list of `u16` block indices, read in pairs
//! `(start_block, end_block_exclusive)`. The rounding rules in [`PartsInfo::encode`]
//! are part of the wire contract: a block only counts as available when it is
//! fully downloaded, except the trailing partial block of the file.

mod wire;

use serde::{Deserialize, Serialize};

use crate::segment::DoneSegments;

pub use wire::PartsParseError;

/// Maximum number of `u16` values sent (255 ranges), bounding message size.
pub const MAX_PARTS_VALUES: usize = 510;

/// Ordered block ranges a peer has available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartsInfo(Vec<u16>);

impl PartsInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap raw wire values. Odd lengths are kept as-is and treated as malformed
    /// by the queries below.
    pub fn from_values(values: Vec<u16>) -> Self {
        Self(values)
    }

    /// Build from `(start, end)` block pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u16, u16)>,
    {
        Self(pairs.into_iter().flat_map(|(s, e)| [s, e]).collect())
    }

    /// Encode completed ranges for advertising to peers.
    ///
    /// Each range maps to `ceil(start / block_size)` .. `floor(end / block_size)`;
    /// the range reaching EOF rounds its end up instead, so the trailing partial
    /// block counts as covered. At most [`MAX_PARTS_VALUES`] values are produced.
    pub fn encode(done: &DoneSegments, block_size: u64, total_size: u64) -> Self {
        debug_assert!(block_size != 0, "encoding parts with zero block size");
        if block_size == 0 {
            return Self::default();
        }
        let cap = (done.len() * 2).min(MAX_PARTS_VALUES);
        let mut values = Vec::with_capacity(cap);
        for seg in done.iter() {
            if values.len() >= cap {
                break;
            }
            let start = seg.start().div_ceil(block_size);
            let mut end = seg.end();
            if end >= total_size {
                end = end.saturating_add(block_size - 1);
            }
            values.push(block_index(start));
            values.push(block_index(end / block_size));
        }
        Self(values)
    }

    pub fn values(&self) -> &[u16] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of `u16` values (twice the number of ranges when well formed).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the value count is even, i.e. every range has an end.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() % 2 == 0
    }

    /// `(start, end)` pairs; a dangling odd value is skipped.
    pub fn pairs(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.0.chunks_exact(2).map(|p| (p[0], p[1]))
    }

    /// Total number of blocks advertised.
    pub fn count(&self) -> u64 {
        self.pairs()
            .map(|(s, e)| u64::from(e.saturating_sub(s)))
            .sum()
    }

    /// Block indices converted to byte offsets, clamped to the file size.
    pub fn to_positions(&self, block_size: u64, total_size: u64) -> Vec<u64> {
        self.0
            .iter()
            .map(|&b| (u64::from(b) * block_size).min(total_size))
            .collect()
    }
}

fn block_index(block: u64) -> u16 {
    u16::try_from(block).unwrap_or(u16::MAX)
}

/// True if `theirs` advertises at least one block missing from `ours`.
///
/// Both lists must be sorted and disjoint. Returns false if either is empty or
/// has an odd length.
pub fn is_needed_part(theirs: &PartsInfo, ours: &PartsInfo) -> bool {
    if !theirs.is_well_formed() || !ours.is_well_formed() {
        tracing::warn!(?theirs, ?ours, "malformed parts info");
        return false;
    }
    if theirs.is_empty() || ours.is_empty() {
        return false;
    }

    let their = theirs.values();
    let our = ours.values();
    let (mut start, mut end) = (their[0], their[1]);
    let (mut i, mut j) = (0usize, 0usize);
    while j + 2 <= our.len() {
        let (my_start, my_end) = (our[j], our[j + 1]);
        if start < my_start {
            return true;
        }
        if start >= my_end {
            j += 2;
            continue;
        }
        if end <= my_end {
            i += 2;
            if i + 2 > their.len() {
                return false;
            }
            start = their[i];
            end = their[i + 1];
        } else {
            start = my_end;
            j += 2;
        }
    }
    true
}

/// Sum of `end - start` over all pairs.
pub fn count_parts(parts: &PartsInfo) -> u64 {
    parts.count()
}

/// Exact equality of two bitmaps.
pub fn compare_parts(a: &PartsInfo, b: &PartsInfo) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    fn done(ranges: &[(u64, u64)]) -> DoneSegments {
        let mut d = DoneSegments::new();
        for &(s, e) in ranges {
            d.insert(Segment::from_bounds(s, e));
        }
        d
    }

    #[test]
    fn encode_whole_blocks() {
        let d = done(&[(0, 300_000)]);
        let pi = PartsInfo::encode(&d, 100_000, 1_000_000);
        assert_eq!(pi, PartsInfo::from_pairs([(0, 3)]));
        assert_eq!(count_parts(&pi), 3);
    }

    #[test]
    fn encode_rounds_start_up_and_end_down() {
        let d = done(&[(50_000, 350_000)]);
        let pi = PartsInfo::encode(&d, 100_000, 1_000_000);
        assert_eq!(pi.values(), &[1, 3]);
    }

    #[test]
    fn encode_counts_trailing_partial_block() {
        // 1,050,000 bytes -> 11 blocks, the last one 50,000 bytes long.
        let d = done(&[(0, 200_000), (1_000_000, 1_050_000)]);
        let pi = PartsInfo::encode(&d, 100_000, 1_050_000);
        assert_eq!(pi.values(), &[0, 2, 10, 11]);
        assert_eq!(pi.count(), 3);

        let finished = done(&[(0, 1_050_000)]);
        let pi = PartsInfo::encode(&finished, 100_000, 1_050_000);
        assert_eq!(pi.values(), &[0, 11]);
    }

    #[test]
    fn encode_caps_at_255_ranges() {
        let mut d = DoneSegments::new();
        for i in 0..300u64 {
            d.insert(Segment::new(i * 20, 10));
        }
        let pi = PartsInfo::encode(&d, 10, 1_000_000);
        assert_eq!(pi.len(), MAX_PARTS_VALUES);
        assert_eq!(pi.pairs().last(), Some((508, 509)));
    }

    #[test]
    fn needed_part_examples() {
        let ours = PartsInfo::from_pairs([(0, 3)]);
        assert!(!is_needed_part(&PartsInfo::from_pairs([(0, 3)]), &ours));
        assert!(is_needed_part(&PartsInfo::from_pairs([(0, 5)]), &ours));
    }

    #[test]
    fn needed_part_sweeps_multiple_ranges() {
        let ours = PartsInfo::from_pairs([(0, 4), (6, 10)]);
        assert!(!is_needed_part(&PartsInfo::from_pairs([(1, 3), (7, 9)]), &ours));
        assert!(is_needed_part(&PartsInfo::from_pairs([(1, 3), (4, 5)]), &ours));
        // Theirs spans our gap.
        assert!(is_needed_part(&PartsInfo::from_pairs([(2, 8)]), &ours));
        // Theirs extends past our last range.
        assert!(is_needed_part(&PartsInfo::from_pairs([(8, 12)]), &ours));
        assert!(!is_needed_part(&PartsInfo::from_pairs([(0, 4), (6, 10)]), &ours));
    }

    #[test]
    fn needed_part_empty_lists() {
        let some = PartsInfo::from_pairs([(0, 3)]);
        assert!(!is_needed_part(&PartsInfo::new(), &some));
        assert!(!is_needed_part(&some, &PartsInfo::new()));
    }

    #[test]
    fn needed_part_rejects_odd_lengths() {
        let odd = PartsInfo::from_values(vec![0, 3, 5]);
        let even = PartsInfo::from_pairs([(0, 1)]);
        assert!(!is_needed_part(&odd, &even));
        assert!(!is_needed_part(&even, &odd));
    }

    #[test]
    fn compare_is_exact() {
        let a = PartsInfo::from_pairs([(0, 3), (5, 6)]);
        assert!(compare_parts(&a, &a.clone()));
        assert!(!compare_parts(&a, &PartsInfo::from_pairs([(0, 3)])));
    }

    #[test]
    fn positions_are_clamped() {
        let pi = PartsInfo::from_pairs([(0, 2), (9, 11)]);
        assert_eq!(
            pi.to_positions(100_000, 1_050_000),
            vec![0, 200_000, 900_000, 1_050_000]
        );
    }
}
