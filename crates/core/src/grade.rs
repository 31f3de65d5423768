// Latency grading for result tables
//
// First byte: < 1 s fast, > 3 s slow. Total: < 3 s fast, > 10 s slow.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const FIRST_BYTE_FAST: Duration = Duration::from_secs(1);
const FIRST_BYTE_SLOW: Duration = Duration::from_secs(3);
const TOTAL_FAST: Duration = Duration::from_secs(3);
const TOTAL_SLOW: Duration = Duration::from_secs(10);

/// Coarse classification of a latency value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyGrade {
    Fast,
    Normal,
    Slow,
}

impl LatencyGrade {
    pub fn for_first_byte(latency: Duration) -> Self {
        Self::grade(latency, FIRST_BYTE_FAST, FIRST_BYTE_SLOW)
    }

    pub fn for_total(latency: Duration) -> Self {
        Self::grade(latency, TOTAL_FAST, TOTAL_SLOW)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyGrade::Fast => "fast",
            LatencyGrade::Normal => "normal",
            LatencyGrade::Slow => "slow",
        }
    }

    fn grade(latency: Duration, fast_below: Duration, slow_above: Duration) -> Self {
        if latency < fast_below {
            LatencyGrade::Fast
        } else if latency > slow_above {
            LatencyGrade::Slow
        } else {
            LatencyGrade::Normal
        }
    }
}

impl std::fmt::Display for LatencyGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a duration as milliseconds with two decimals, e.g. "201.50"
pub fn format_millis(latency: Duration) -> String {
    format!("{:.2}", latency.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_byte_thresholds() {
        assert_eq!(
            LatencyGrade::for_first_byte(Duration::from_millis(999)),
            LatencyGrade::Fast
        );
        assert_eq!(
            LatencyGrade::for_first_byte(Duration::from_secs(1)),
            LatencyGrade::Normal
        );
        assert_eq!(
            LatencyGrade::for_first_byte(Duration::from_secs(3)),
            LatencyGrade::Normal
        );
        assert_eq!(
            LatencyGrade::for_first_byte(Duration::from_millis(3001)),
            LatencyGrade::Slow
        );
    }

    #[test]
    fn test_total_thresholds() {
        assert_eq!(
            LatencyGrade::for_total(Duration::from_millis(2500)),
            LatencyGrade::Fast
        );
        assert_eq!(
            LatencyGrade::for_total(Duration::from_secs(10)),
            LatencyGrade::Normal
        );
        assert_eq!(
            LatencyGrade::for_total(Duration::from_secs(11)),
            LatencyGrade::Slow
        );
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(Duration::from_micros(201_504)), "201.50");
        assert_eq!(format_millis(Duration::ZERO), "0.00");
    }

    #[test]
    fn test_grade_labels() {
        assert_eq!(LatencyGrade::Fast.to_string(), "fast");
        assert_eq!(LatencyGrade::Slow.as_str(), "slow");
        assert_eq!(
            serde_json::to_string(&LatencyGrade::Normal).unwrap(),
            "\"normal\""
        );
    }
}
