//! Segmented-transfer queue engine.
//!
//! Tracks, for each file fetched from many peers, which byte ranges are done,
//! which are in flight and which peers can serve it, and decides what range to
//! request next.

pub mod allocator;
pub mod block;
pub mod config;
pub mod logging;
pub mod parts;
pub mod priority;
pub mod queue_item;
pub mod segment;
pub mod source;
pub mod transfer;

pub use allocator::{AllocError, SegmentParams};
pub use parts::PartsInfo;
pub use priority::Priority;
pub use queue_item::{ItemFlags, QueueItem, QueueItemSnapshot};
pub use segment::Segment;
pub use source::{PartialSource, SourceFlags};
pub use transfer::{SimTransfer, Transfer};
