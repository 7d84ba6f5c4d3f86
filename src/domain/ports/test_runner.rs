//! Build/Test Runner port.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::SuiteSnapshot;

/// Raw coverage output captured from a run.
///
/// Runners read the artifact before tearing down their scratch workspace, so
/// the bytes outlive the snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageArtifact {
    /// Where the runner found the artifact (informational once the snapshot is gone).
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// What one runner invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub coverage_artifact: Option<CoverageArtifact>,
}

/// Failures to *invoke* the runner, as opposed to a failing test suite.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Failed to spawn test command: {0}")]
    Spawn(String),

    #[error("Failed to prepare snapshot workspace: {0}")]
    Workspace(String),

    #[error("Test runner unavailable: {0}")]
    Unavailable(String),
}

impl RunnerError {
    /// Spawn and workspace failures are worth retrying; `Unavailable` is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::Workspace(_))
    }
}

/// Runs a test suite snapshot and reports exit status, output and coverage.
///
/// Must be safe to invoke repeatedly and concurrently: every call operates on
/// its own snapshot and leaves nothing behind that a later call could see.
#[async_trait]
pub trait TestRunner: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, snapshot: &SuiteSnapshot) -> Result<RunnerOutput, RunnerError>;
}
