//! Active/bad partitioned source map.

use std::collections::BTreeMap;
use std::fmt::Debug;

use super::{PartialSource, Source, SourceFlags};

/// A source due for a partial-file query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfsCandidate<P> {
    pub next_query_time: u64,
    pub peer: P,
    /// The source currently sits in the bad partition.
    pub is_bad: bool,
}

/// Sources of one queued file, keyed by peer.
///
/// A peer is in at most one partition. Moving it between partitions keeps its
/// record (flags are only ever OR-ed in while it is bad).
#[derive(Debug, Clone)]
pub struct SourceTable<P: Ord> {
    active: BTreeMap<P, Source>,
    bad: BTreeMap<P, Source>,
}

impl<P: Ord> Default for SourceTable<P> {
    fn default() -> Self {
        Self {
            active: BTreeMap::new(),
            bad: BTreeMap::new(),
        }
    }
}

impl<P: Ord + Clone + Debug> SourceTable<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `peer` an active source, reviving its bad record if it has one.
    ///
    /// Adding a peer that is already active is a caller bug: asserted in debug
    /// builds, otherwise logged and ignored. Returns true if the table changed.
    pub fn add_source(&mut self, peer: P) -> bool {
        debug_assert!(!self.active.contains_key(&peer), "source {peer:?} already active");
        if self.active.contains_key(&peer) {
            tracing::warn!(?peer, "add_source: peer is already an active source");
            return false;
        }
        let source = self.bad.remove(&peer).unwrap_or_default();
        self.active.insert(peer, source);
        true
    }

    /// Move `peer` to the bad partition, adding `reason` to its flags.
    /// Returns false (and logs) if the peer was not active.
    pub fn remove_source(&mut self, peer: &P, reason: SourceFlags) -> bool {
        let Some(mut source) = self.active.remove(peer) else {
            tracing::warn!(?peer, ?reason, "remove_source: peer is not an active source");
            return false;
        };
        source.set_flags(reason);
        self.bad.insert(peer.clone(), source);
        true
    }

    pub fn is_source(&self, peer: &P) -> bool {
        self.active.contains_key(peer)
    }

    pub fn is_bad_source(&self, peer: &P) -> bool {
        self.bad.contains_key(peer)
    }

    /// True if `peer` is bad for a reason outside `exceptions`.
    pub fn is_bad_source_except(&self, peer: &P, exceptions: SourceFlags) -> bool {
        self.bad
            .get(peer)
            .is_some_and(|s| !(s.flags().reasons() & !exceptions).is_empty())
    }

    /// Record of an active source.
    pub fn source(&self, peer: &P) -> Option<&Source> {
        self.active.get(peer)
    }

    /// Record in either partition.
    pub fn any_source(&self, peer: &P) -> Option<&Source> {
        self.active.get(peer).or_else(|| self.bad.get(peer))
    }

    pub fn any_source_mut(&mut self, peer: &P) -> Option<&mut Source> {
        match self.active.get_mut(peer) {
            Some(s) => Some(s),
            None => self.bad.get_mut(peer),
        }
    }

    /// Attach partial availability to a known source (either partition).
    pub fn set_partial_source(&mut self, peer: &P, partial: PartialSource) -> bool {
        match self.any_source_mut(peer) {
            Some(source) => {
                source.set_partial_source(partial);
                true
            }
            None => false,
        }
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn bad_len(&self) -> usize {
        self.bad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = (&P, &Source)> {
        self.active.iter()
    }

    pub fn bad(&self) -> impl Iterator<Item = (&P, &Source)> {
        self.bad.iter()
    }

    /// First active source in table order.
    pub fn first_source(&self) -> Option<&P> {
        self.active.keys().next()
    }

    /// Active sources for which `is_online` holds.
    pub fn online_sources<F>(&self, is_online: F) -> Vec<P>
    where
        F: Fn(&P) -> bool,
    {
        self.active.keys().filter(|p| is_online(p)).cloned().collect()
    }

    pub fn online_source_count<F>(&self, is_online: F) -> usize
    where
        F: Fn(&P) -> bool,
    {
        self.active.keys().filter(|p| is_online(p)).count()
    }

    /// At least `count` active sources are online. Stops at the `count`-th hit.
    pub fn has_online_sources<F>(&self, count: usize, is_online: F) -> bool
    where
        F: Fn(&P) -> bool,
    {
        if count == 0 {
            return true;
        }
        if self.active.len() < count {
            return false;
        }
        self.active
            .keys()
            .filter(|p| is_online(p))
            .nth(count - 1)
            .is_some()
    }

    /// Up to `max_count` sources due for a PFS query at `now`, earliest first.
    ///
    /// Active sources are scanned before bad ones; ties keep scan order.
    pub fn pfs_candidates(&self, now: u64, max_count: usize) -> Vec<PfsCandidate<P>> {
        let mut out: Vec<PfsCandidate<P>> = Vec::with_capacity(max_count.min(16));
        if max_count == 0 {
            return out;
        }
        let partitions = [(&self.active, false), (&self.bad, true)];
        for (map, is_bad) in partitions {
            for (peer, source) in map {
                if !source.is_pfs_eligible(is_bad) {
                    continue;
                }
                let Some(ps) = source.partial_source() else {
                    continue;
                };
                if !ps.is_candidate(now) {
                    continue;
                }
                let t = ps.next_query_time;
                let idx = out.partition_point(|c| c.next_query_time <= t);
                if idx >= max_count {
                    continue;
                }
                out.insert(
                    idx,
                    PfsCandidate {
                        next_query_time: t,
                        peer: peer.clone(),
                        is_bad,
                    },
                );
                out.truncate(max_count);
            }
        }
        out
    }
}
