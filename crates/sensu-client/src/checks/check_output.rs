use serde::{Deserialize, Serialize};

/// Result of a single check execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutput {
    /// Text printed by the check.
    pub output: String,
    /// Wall time of the execution, in seconds.
    pub duration: f64,
    /// Exit status (0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN).
    pub status: i32,
    /// Unix timestamp at which the execution started.
    pub executed: i64,
}

impl CheckOutput {
    /// An UNKNOWN result carrying `message`, for checks that could not run.
    pub fn unknown(message: impl Into<String>, duration: f64, executed: i64) -> Self {
        Self {
            output: message.into(),
            duration,
            status: sensu_common::constants::check_status::UNKNOWN,
            executed,
        }
    }
}

/// Seconds rounded to millisecond precision.
pub(crate) fn round_duration(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_uses_status_three() {
        let output = CheckOutput::unknown("could not spawn", 0.5, 1_700_000_000);
        assert_eq!(output.status, 3);
        assert_eq!(output.output, "could not spawn");
    }

    #[test]
    fn durations_round_to_milliseconds() {
        assert_eq!(round_duration(0.123456), 0.123);
        assert_eq!(round_duration(1.9996), 2.0);
    }
}
