//! Progress figures for one queued file (bytes done, rate, ETA).

use serde::Serialize;

/// Point-in-time progress of a queue item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemProgress {
    /// Completed bytes plus bytes received by running transfers.
    pub downloaded: u64,
    /// Bytes in completed ranges only.
    pub done: u64,
    /// `None` when the size is unknown.
    pub total: Option<u64>,
    /// Aggregate speed of running transfers, bytes/s.
    pub speed: u64,
    pub running_segments: usize,
    pub done_segments: usize,
}

impl ItemProgress {
    /// Fraction complete in [0.0, 1.0]; unknown or empty size counts as 0.
    pub fn fraction(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => (self.downloaded as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }

    /// Estimated seconds remaining (None if size unknown or nothing is flowing).
    pub fn eta_secs(&self) -> Option<u64> {
        let total = self.total?;
        let remaining = total.saturating_sub(self.downloaded);
        if remaining == 0 {
            return Some(0);
        }
        if self.speed == 0 {
            return None;
        }
        Some(remaining.div_ceil(self.speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(downloaded: u64, total: Option<u64>, speed: u64) -> ItemProgress {
        ItemProgress {
            downloaded,
            done: downloaded,
            total,
            speed,
            running_segments: 0,
            done_segments: 0,
        }
    }

    #[test]
    fn fraction_and_eta() {
        let p = progress(250, Some(1000), 100);
        assert!((p.fraction() - 0.25).abs() < 1e-9);
        assert_eq!(p.eta_secs(), Some(8));
    }

    #[test]
    fn stalled_or_unknown() {
        assert_eq!(progress(10, Some(100), 0).eta_secs(), None);
        assert_eq!(progress(10, None, 5).eta_secs(), None);
        assert_eq!(progress(10, None, 5).fraction(), 0.0);
    }

    #[test]
    fn finished() {
        let p = progress(100, Some(100), 0);
        assert_eq!(p.eta_secs(), Some(0));
        assert_eq!(p.fraction(), 1.0);
    }
}
