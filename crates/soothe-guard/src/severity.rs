//! Severity levels for harmful-content matches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How serious a content match is.
///
/// Severity is totally ordered (`Low < Medium < High < Critical`), and
/// aggregation always takes the maximum across matches. The "no match"
/// sentinel is `Option<Severity>` with `None` ordered below `Some(Low)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor concerns, gentle guidance needed.
    Low,
    /// Moderate concerns, active intervention helpful.
    Medium,
    /// Serious concerns, immediate attention required.
    High,
    /// Crisis-level concerns, urgent intervention needed.
    Critical,
}

impl Severity {
    /// Returns all severity levels in ascending order.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }

    /// Returns a human-readable name for this severity.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// Returns the snake_case identifier used in rule files and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a severity name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeverityError(pub String);

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown severity level: {}", self.0)
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Parses a severity name case-insensitively ("HIGH", "high", "High").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}
