//! Serializable views of a queue item.

use std::fmt::Debug;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::block::grown_block_size;
use crate::priority::Priority;
use crate::segment::Segment;
use crate::transfer::Transfer;

use super::{ItemFlags, QueueItem};

/// Persistent state of a queue item. Sources and running segments are
/// runtime-only and not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItemSnapshot {
    pub target: PathBuf,
    pub total_size: Option<u64>,
    pub block_size: u64,
    pub priority: Priority,
    #[serde(default)]
    pub auto_priority: bool,
    pub max_segments: usize,
    #[serde(default)]
    pub flags: ItemFlags,
    #[serde(default)]
    pub done: Vec<Segment>,
    #[serde(default)]
    pub added: u64,
}

impl QueueItemSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// A running range and how far its transfer got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunningChunk {
    pub start: u64,
    pub end: u64,
    /// Bytes received within the range (0 while unbound).
    pub pos: u64,
}

/// Running and done ranges, for progress displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunksView {
    pub running: Vec<RunningChunk>,
    pub done: Vec<Segment>,
}

impl<P, T> QueueItem<P, T>
where
    P: Ord + Clone + Debug,
    T: Transfer<Peer = P>,
{
    pub fn snapshot(&self) -> QueueItemSnapshot {
        let (block_size, done) = {
            let st = self.state();
            (st.block_size, st.done.to_vec())
        };
        let attribs = *self.attribs();
        QueueItemSnapshot {
            target: self.target.clone(),
            total_size: self.total_size,
            block_size,
            priority: attribs.priority,
            auto_priority: attribs.auto_priority,
            max_segments: attribs.max_segments,
            flags: self.flags,
            done,
            added: self.added,
        }
    }

    /// Rebuild an item, replaying every done range through
    /// [`add_segment`](Self::add_segment).
    ///
    /// A stored block size is kept only if it is a larger exact multiple of the
    /// tree block size; otherwise the tree size stands.
    pub fn from_snapshot(snapshot: QueueItemSnapshot) -> Self {
        let mut item = Self::new(snapshot.target, snapshot.total_size, snapshot.flags);
        if snapshot.added != 0 {
            item.added = snapshot.added;
        }
        {
            let mut st = item.state();
            if let Some(grown) = grown_block_size(st.block_size, snapshot.block_size) {
                st.block_size = grown;
            }
        }
        {
            let mut attribs = item.attribs();
            attribs.priority = snapshot.priority;
            attribs.auto_priority = snapshot.auto_priority;
            attribs.max_segments = snapshot.max_segments.max(1);
        }
        for segment in snapshot.done {
            item.add_segment(segment);
        }
        item.update_downloaded_bytes();
        item
    }
}
