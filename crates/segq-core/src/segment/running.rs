//! In-flight ranges, each optionally bound to a transfer handle.

use std::sync::Arc;

use super::Segment;

/// A range handed to a peer. `transfer` is `None` between allocation and the
/// moment the connection layer binds its transfer handle.
#[derive(Debug)]
pub struct RunningSegment<T> {
    segment: Segment,
    transfer: Option<Arc<T>>,
}

impl<T> RunningSegment<T> {
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn transfer(&self) -> Option<&Arc<T>> {
        self.transfer.as_ref()
    }

    fn is_bound_to(&self, transfer: &Arc<T>) -> bool {
        self.transfer.as_ref().is_some_and(|t| Arc::ptr_eq(t, transfer))
    }
}

/// Ranges currently being fetched, in allocation order.
#[derive(Debug)]
pub struct RunningSegments<T> {
    entries: Vec<RunningSegment<T>>,
}

impl<T> Default for RunningSegments<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> RunningSegments<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment, transfer: Option<Arc<T>>) {
        self.entries.push(RunningSegment { segment, transfer });
    }

    /// Attach a transfer handle to the unbound entry for `segment`.
    /// Returns false if no entry has that range.
    pub fn bind(&mut self, segment: &Segment, transfer: Arc<T>) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.segment == *segment) else {
            return false;
        };
        debug_assert!(entry.transfer.is_none(), "segment {segment:?} already bound");
        if entry.transfer.is_some() {
            tracing::warn!(?segment, "rebinding a running segment that already has a transfer");
        }
        entry.transfer = Some(transfer);
        true
    }

    /// Remove the first entry with exactly this range.
    pub fn remove(&mut self, segment: &Segment) -> Option<RunningSegment<T>> {
        let pos = self.entries.iter().position(|e| e.segment == *segment)?;
        Some(self.entries.remove(pos))
    }

    /// Remove the first entry whose transfer matches `pred`.
    pub fn remove_by_transfer<F>(&mut self, mut pred: F) -> Option<RunningSegment<T>>
    where
        F: FnMut(&T) -> bool,
    {
        let pos = self
            .entries
            .iter()
            .position(|e| e.transfer.as_deref().is_some_and(&mut pred))?;
        Some(self.entries.remove(pos))
    }

    /// Segment of the entry bound to this exact handle.
    pub fn segment_of(&self, transfer: &Arc<T>) -> Option<Segment> {
        self.entries
            .iter()
            .find(|e| e.is_bound_to(transfer))
            .map(|e| e.segment)
    }

    /// Mark the first entry containing `segment` as overlapped (or not).
    pub fn set_overlapped(&mut self, segment: &Segment, overlapped: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.segment.contains(segment)) {
            Some(entry) => {
                entry.segment.set_overlapped(overlapped);
                true
            }
            None => false,
        }
    }

    /// True if any in-flight range shares a byte with `segment`.
    pub fn overlaps(&self, segment: &Segment) -> bool {
        self.entries.iter().any(|e| e.segment.overlaps(segment))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RunningSegment<T>> {
        self.entries.iter()
    }

    /// Transfers bound to entries other than `keep`.
    pub fn others<'a>(&'a self, keep: &'a Arc<T>) -> impl Iterator<Item = &'a RunningSegment<T>> + 'a {
        self.entries.iter().filter(move |e| e.transfer.is_some() && !e.is_bound_to(keep))
    }
}

impl<'a, T> IntoIterator for &'a RunningSegments<T> {
    type Item = &'a RunningSegment<T>;
    type IntoIter = std::slice::Iter<'a, RunningSegment<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Handle(&'static str);

    #[test]
    fn push_bind_remove() {
        let mut running: RunningSegments<Handle> = RunningSegments::new();
        let seg = Segment::new(0, 100);
        running.push(seg, None);
        assert_eq!(running.len(), 1);
        assert!(running.iter().next().unwrap().transfer().is_none());

        let h = Arc::new(Handle("a"));
        assert!(running.bind(&seg, Arc::clone(&h)));
        assert_eq!(running.segment_of(&h), Some(seg));
        assert!(!running.bind(&Segment::new(5, 5), Arc::new(Handle("b"))));

        let removed = running.remove(&seg).expect("entry exists");
        assert_eq!(removed.transfer().unwrap().0, "a");
        assert!(running.is_empty());
        assert!(running.remove(&seg).is_none());
    }

    #[test]
    fn remove_by_transfer_matches_handle() {
        let mut running = RunningSegments::new();
        running.push(Segment::new(0, 10), Some(Arc::new(Handle("a"))));
        running.push(Segment::new(10, 10), Some(Arc::new(Handle("b"))));
        running.push(Segment::new(20, 10), None);
        let removed = running.remove_by_transfer(|h| h.0 == "b").unwrap();
        assert_eq!(*removed.segment(), Segment::new(10, 10));
        assert!(running.remove_by_transfer(|h| h.0 == "z").is_none());
        assert_eq!(running.len(), 2);
    }

    #[test]
    fn overlap_queries() {
        let mut running: RunningSegments<Handle> = RunningSegments::new();
        running.push(Segment::new(100, 100), None);
        assert!(running.overlaps(&Segment::new(150, 100)));
        assert!(!running.overlaps(&Segment::new(200, 100)));
        assert!(running.set_overlapped(&Segment::new(120, 10), true));
        assert!(running.iter().next().unwrap().segment().is_overlapped());
        assert!(!running.set_overlapped(&Segment::new(500, 10), true));
    }

    #[test]
    fn others_skips_kept_and_unbound() {
        let mut running = RunningSegments::new();
        let a = Arc::new(Handle("a"));
        running.push(Segment::new(0, 10), Some(Arc::clone(&a)));
        running.push(Segment::new(10, 10), Some(Arc::new(Handle("b"))));
        running.push(Segment::new(20, 10), None);
        let names: Vec<&str> = running
            .others(&a)
            .filter_map(|e| e.transfer().map(|t| t.0))
            .collect();
        assert_eq!(names, vec!["b"]);
    }
}
