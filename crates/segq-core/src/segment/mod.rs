//! Byte-range bookkeeping for one queued file.
//!
//! Holds the range primitive, the merged set of completed ranges and the list
//! of ranges currently being fetched from peers.

mod done;
mod range;
mod running;

pub use done::DoneSegments;
pub use range::{round_down, round_up, Segment};
pub use running::{RunningSegment, RunningSegments};
