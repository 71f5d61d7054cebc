//! Handle to an in-flight transfer, implemented by the connection layer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// What the queue needs to know about a running download from one peer.
pub trait Transfer: Send + Sync {
    type Peer;

    /// Peer the data comes from.
    fn peer(&self) -> &Self::Peer;

    /// Bytes received so far within the transfer's segment.
    fn position(&self) -> u64;

    /// Recent average throughput in bytes per second.
    fn running_average(&self) -> u64;

    /// Data has started flowing.
    fn is_started(&self) -> bool;

    /// Time since data started flowing.
    fn running_for(&self) -> Duration {
        Duration::ZERO
    }

    /// Estimated seconds until the segment completes, if known.
    fn seconds_left(&self) -> Option<u64> {
        None
    }

    /// Ask the connection layer to drop this transfer.
    fn disconnect(&self);
}

/// Transfer whose bytes arrive when the caller says so.
///
/// Drives simulations and integration tests without a socket. `disconnect`
/// only raises a flag.
#[derive(Debug, Default)]
pub struct SimTransfer {
    peer: String,
    position: AtomicU64,
    speed: AtomicU64,
    disconnected: AtomicBool,
}

impl SimTransfer {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            ..Default::default()
        }
    }

    /// Report `speed` bytes/s until the next [`advance`](Self::advance).
    pub fn with_speed(self, speed: u64) -> Self {
        self.speed.store(speed, Ordering::Relaxed);
        self
    }

    /// Receive `bytes` at the current speed.
    pub fn receive(&self, bytes: u64) {
        self.position.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Receive `bytes` and update the reported speed.
    pub fn advance(&self, bytes: u64, speed: u64) {
        self.receive(bytes);
        self.speed.store(speed, Ordering::Relaxed);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }
}

impl Transfer for SimTransfer {
    type Peer = String;

    fn peer(&self) -> &String {
        &self.peer
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn running_average(&self) -> u64 {
        self.speed.load(Ordering::Relaxed)
    }

    fn is_started(&self) -> bool {
        self.position() > 0
    }

    fn disconnect(&self) {
        tracing::debug!(peer = %self.peer, "simulated transfer disconnected");
        self.disconnected.store(true, Ordering::Relaxed);
    }
}
