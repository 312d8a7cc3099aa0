use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What the rank projector does with a score cell that is not a number.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScorePolicy {
    /// Rank the row with a score of zero.
    #[default]
    ZeroFill,
    /// Leave the row out of the standings.
    Exclude,
}

impl ScorePolicy {
    /// Normalize a raw score cell. `None` means the row is dropped.
    pub fn apply(self, raw: &str) -> Option<u64> {
        match (parse_points(raw), self) {
            (Some(points), _) => Some(points),
            (None, ScorePolicy::ZeroFill) => Some(0),
            (None, ScorePolicy::Exclude) => None,
        }
    }
}

impl FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero" | "zero_fill" | "zerofill" => Ok(ScorePolicy::ZeroFill),
            "exclude" | "drop" => Ok(ScorePolicy::Exclude),
            other => Err(format!("unknown score policy: {}", other)),
        }
    }
}

/// Parse a cell as a non-negative point count.
///
/// Integers are taken as-is. Finite decimals are truncated toward zero,
/// since the sheet API reports formula results like `12.0`. Negative,
/// empty and non-numeric cells yield `None`.
pub fn parse_points(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = raw.parse::<u64>() {
        return Some(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value < u64::MAX as f64 => {
            Some(value.trunc() as u64)
        }
        _ => None,
    }
}

/// Current value of an activity cell, with anything unreadable counted as zero.
pub fn cell_points(raw: &str) -> u64 {
    parse_points(raw).unwrap_or(0)
}
