//! Bug severity labels and their position on the severity scale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Known severity labels, least to most severe.
pub const SEVERITY_LEVELS: [&str; 7] = [
    "enhancement",
    "trivial",
    "minor",
    "normal",
    "major",
    "critical",
    "blocker",
];

/// Score given to severities outside [`SEVERITY_LEVELS`].
///
/// Keeps datasets comparable with earlier runs, which placed unknown
/// labels one step below "enhancement".
const UNKNOWN_SEVERITY_SCORE: f64 = -0.1;

/// A bug severity as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// One of the labels in [`SEVERITY_LEVELS`], stored as its index.
    Known(usize),
    /// Anything else, with the raw label preserved for reporting.
    Unknown(String),
}

impl Severity {
    /// Classify a raw severity label (case-insensitive).
    pub fn parse(label: &str) -> Self {
        let lowered = label.trim().to_lowercase();
        match SEVERITY_LEVELS.iter().position(|level| *level == lowered) {
            Some(index) => Severity::Known(index),
            None => Severity::Unknown(label.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Severity::Known(_))
    }

    /// Index / 10 for known severities; unknown ones sit below the scale.
    pub fn score(&self) -> f64 {
        match self {
            Severity::Known(index) => *index as f64 / 10.0,
            Severity::Unknown(_) => UNKNOWN_SEVERITY_SCORE,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Known(index) => write!(f, "{}", SEVERITY_LEVELS[*index]),
            Severity::Unknown(label) => write!(f, "unknown({})", label),
        }
    }
}
