//! Download priority levels and the percent-complete auto-priority curve.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Manual priority of a queued file, lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Paused,
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Higher,
    Highest,
}

impl Priority {
    pub const ALL: [Priority; 7] = [
        Priority::Paused,
        Priority::Lowest,
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Higher,
        Priority::Highest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Paused => "paused",
            Priority::Lowest => "lowest",
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Higher => "higher",
            Priority::Highest => "highest",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority {0:?}")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

/// Priority implied by completion: the further along, the higher.
///
/// Deciles of `downloaded / total`: 0-2 low, 3-5 normal, 6-8 high, 9-10 higher.
/// Unknown or zero size maps to normal.
pub fn auto_priority(downloaded: u64, total_size: Option<u64>) -> Priority {
    let Some(total) = total_size.filter(|&t| t > 0) else {
        return Priority::Normal;
    };
    let decile = u128::from(downloaded) * 10 / u128::from(total);
    match decile {
        0..=2 => Priority::Low,
        6..=8 => Priority::High,
        9 | 10 => Priority::Higher,
        _ => Priority::Normal,
    }
}

/// Effective priority: the auto curve when `auto` is set, otherwise `manual`.
pub fn effective_priority(
    manual: Priority,
    auto: bool,
    downloaded: u64,
    total_size: Option<u64>,
) -> Priority {
    if auto {
        auto_priority(downloaded, total_size)
    } else {
        manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(Priority::Paused < Priority::Lowest);
        assert!(Priority::Lowest < Priority::Low);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::Higher < Priority::Highest);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn auto_curve_by_decile() {
        let total = Some(1000);
        assert_eq!(auto_priority(0, total), Priority::Low);
        assert_eq!(auto_priority(299, total), Priority::Low);
        assert_eq!(auto_priority(300, total), Priority::Normal);
        assert_eq!(auto_priority(599, total), Priority::Normal);
        assert_eq!(auto_priority(600, total), Priority::High);
        assert_eq!(auto_priority(899, total), Priority::High);
        assert_eq!(auto_priority(900, total), Priority::Higher);
        assert_eq!(auto_priority(1000, total), Priority::Higher);
    }

    #[test]
    fn auto_curve_degenerate_sizes() {
        assert_eq!(auto_priority(10, None), Priority::Normal);
        assert_eq!(auto_priority(10, Some(0)), Priority::Normal);
        assert_eq!(auto_priority(5000, Some(1000)), Priority::Normal);
    }

    #[test]
    fn manual_wins_without_auto_flag() {
        assert_eq!(
            effective_priority(Priority::Highest, false, 0, Some(100)),
            Priority::Highest
        );
        assert_eq!(
            effective_priority(Priority::Highest, true, 0, Some(100)),
            Priority::Low
        );
    }

    #[test]
    fn parse_and_display() {
        for p in Priority::ALL {
            assert_eq!(p.as_str().parse::<Priority>(), Ok(p));
        }
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::Lowest.to_string(), "lowest");
    }
}
