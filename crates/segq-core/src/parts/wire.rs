//! Text form of [`PartsInfo`] as carried in search replies: comma-separated
//! decimal block indices, e.g. `0,3,5,9`.

use std::fmt;
use std::str::FromStr;

use super::{PartsInfo, MAX_PARTS_VALUES};

/// Error parsing the text form of a parts bitmap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartsParseError {
    #[error("invalid block index {0:?}")]
    InvalidIndex(String),
    #[error("odd number of values ({0}); ranges come in pairs")]
    OddLength(usize),
    #[error("too many values ({0}, at most 510)")]
    TooLong(usize),
    #[error("range {start}..{end} is reversed")]
    Reversed { start: u16, end: u16 },
}

impl PartsInfo {
    /// Comma-separated text form.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Parse the comma-separated text form. An empty string is an empty bitmap.
    pub fn from_wire(s: &str) -> Result<Self, PartsParseError> {
        s.parse()
    }
}

impl fmt::Display for PartsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.values().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl FromStr for PartsInfo {
    type Err = PartsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(PartsInfo::new());
        }
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<u16>()
                    .map_err(|_| PartsParseError::InvalidIndex(v.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() % 2 != 0 {
            return Err(PartsParseError::OddLength(values.len()));
        }
        if values.len() > MAX_PARTS_VALUES {
            return Err(PartsParseError::TooLong(values.len()));
        }
        if let Some(p) = values.chunks_exact(2).find(|p| p[0] > p[1]) {
            return Err(PartsParseError::Reversed {
                start: p[0],
                end: p[1],
            });
        }
        Ok(PartsInfo::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_comma_list() {
        let pi = PartsInfo::from_pairs([(0, 3), (5, 9)]);
        assert_eq!(pi.to_wire(), "0,3,5,9");
        assert_eq!(PartsInfo::new().to_wire(), "");
    }

    #[test]
    fn parses_comma_list() {
        let pi = PartsInfo::from_wire("0,3, 5,9").unwrap();
        assert_eq!(pi, PartsInfo::from_pairs([(0, 3), (5, 9)]));
        assert!(PartsInfo::from_wire("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(
            PartsInfo::from_wire("0,3,5"),
            Err(PartsParseError::OddLength(3))
        );
        assert!(matches!(
            PartsInfo::from_wire("0,x"),
            Err(PartsParseError::InvalidIndex(_))
        ));
        assert!(matches!(
            PartsInfo::from_wire("0,70000"),
            Err(PartsParseError::InvalidIndex(_))
        ));
        assert_eq!(
            PartsInfo::from_wire("4,2"),
            Err(PartsParseError::Reversed { start: 4, end: 2 })
        );
        let long = vec!["1"; MAX_PARTS_VALUES + 2].join(",");
        assert_eq!(
            PartsInfo::from_wire(&long),
            Err(PartsParseError::TooLong(MAX_PARTS_VALUES + 2))
        );
    }
}
