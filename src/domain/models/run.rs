//! Outcomes of build/test runner invocations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::coverage::CoverageReport;

/// How a single runner invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum RunStatus {
    /// The process exited with this code.
    Exited(i32),
    /// The wall-clock bound was hit and the process was killed.
    TimedOut,
}

/// Outcome of one runner invocation.
///
/// Ephemeral: consumed by the acceptance engine and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// 1-based repetition number.
    pub attempt: u32,
    pub status: RunStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    /// Present only on the last result of a fully passing sequence.
    pub coverage: Option<CoverageReport>,
    /// Why coverage is absent despite a passing run (decoder failure, no artifact).
    pub coverage_error: Option<String>,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Exited(0)
    }

    /// Exit code in the runner's convention; timeouts report `-1`.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Exited(code) => code,
            RunStatus::TimedOut => -1,
        }
    }

    /// Last few lines of output, for ledger entries and oracle feedback.
    pub fn error_excerpt(&self, max_lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.trim_end().lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Aggregate pass/fail classification of a repetition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildVerdict {
    /// Every repetition exited 0.
    Passed,
    /// The first repetition failed with this exit code.
    Failed(i32),
    /// A repetition timed out before any disagreement was observed.
    TimedOut,
    /// At least one repetition passed and a later one did not.
    Flaky,
}

impl BuildVerdict {
    /// Classify a sequence of results in execution order.
    ///
    /// An empty sequence counts as a failure: nothing ran, so nothing passed.
    pub fn classify(results: &[RunResult]) -> Self {
        let Some(first_failure) = results.iter().position(|r| !r.passed()) else {
            return if results.is_empty() {
                Self::Failed(-1)
            } else {
                Self::Passed
            };
        };

        if first_failure > 0 {
            return Self::Flaky;
        }
        match results[first_failure].status {
            RunStatus::TimedOut => Self::TimedOut,
            RunStatus::Exited(code) => Self::Failed(code),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }
}
