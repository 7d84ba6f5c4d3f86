//! Shell-command test runner.
//!
//! Each invocation copies the project into a fresh temporary directory,
//! writes the snapshot's test file there, and runs the configured command
//! through `sh -c`. The scratch directory is removed when the run ends, so
//! nothing carries over between invocations.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::models::{ProjectConfig, SuiteSnapshot};
use crate::domain::ports::{CoverageArtifact, RunnerError, RunnerOutput, TestRunner};

// ---------------------------------------------------------------------------
// ShellTestRunner
// ---------------------------------------------------------------------------

/// Runs a test command against an isolated copy of the workspace.
#[derive(Debug, Clone)]
pub struct ShellTestRunner {
    /// Project root copied into every snapshot.
    workspace_root: PathBuf,
    /// Command line passed to `sh -c`.
    test_command: String,
    /// Working directory for the command, relative to the snapshot root.
    command_dir: Option<PathBuf>,
    /// Coverage artifact path, relative to the snapshot root.
    coverage_report: PathBuf,
    /// Top-level entries left out of the copy.
    exclude: Vec<String>,
    shell: String,
}

impl ShellTestRunner {
    pub fn new(workspace_root: impl Into<PathBuf>, test_command: impl Into<String>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            test_command: test_command.into(),
            command_dir: None,
            coverage_report: PathBuf::from("coverage.lcov"),
            exclude: Vec::new(),
            shell: "sh".to_string(),
        }
    }

    /// Build a runner from the project section of the configuration.
    pub fn from_config(project: &ProjectConfig) -> Self {
        Self {
            workspace_root: project.workspace_root.clone(),
            test_command: project.test_command.clone(),
            command_dir: project.command_dir.clone(),
            coverage_report: project.coverage_report.clone(),
            exclude: project.exclude.clone(),
            shell: "sh".to_string(),
        }
    }

    pub fn with_command_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.command_dir = Some(dir.into());
        self
    }

    pub fn with_coverage_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.coverage_report = path.into();
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Use a shell other than `sh`.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Test file path inside a snapshot rooted at `root`.
    fn snapshot_test_path(&self, root: &Path, test_file: &Path) -> PathBuf {
        let relative = test_file
            .strip_prefix(&self.workspace_root)
            .unwrap_or(test_file);
        root.join(relative)
    }

    async fn prepare(&self, snapshot: &SuiteSnapshot) -> Result<tempfile::TempDir, RunnerError> {
        let scratch = tempfile::Builder::new()
            .prefix("augur-snapshot-")
            .tempdir()
            .map_err(|e| RunnerError::Workspace(format!("cannot create scratch directory: {e}")))?;

        let source = self.workspace_root.clone();
        let target = scratch.path().to_path_buf();
        let exclude = self.exclude.clone();
        tokio::task::spawn_blocking(move || copy_tree(&source, &target, &exclude))
            .await
            .map_err(|e| RunnerError::Workspace(format!("copy task failed: {e}")))?
            .map_err(|e| {
                RunnerError::Workspace(format!(
                    "cannot copy {}: {e}",
                    self.workspace_root.display()
                ))
            })?;

        let test_path = self.snapshot_test_path(scratch.path(), &snapshot.test_file);
        if let Some(parent) = test_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RunnerError::Workspace(e.to_string()))?;
        }
        tokio::fs::write(&test_path, &snapshot.contents)
            .await
            .map_err(|e| {
                RunnerError::Workspace(format!("cannot write {}: {e}", test_path.display()))
            })?;

        match tokio::fs::remove_file(scratch.path().join(&self.coverage_report)).await {
            Ok(()) => tracing::debug!(
                artifact = %self.coverage_report.display(),
                "Removed stale coverage artifact"
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(RunnerError::Workspace(e.to_string())),
        }

        Ok(scratch)
    }
}

#[async_trait]
impl TestRunner for ShellTestRunner {
    fn name(&self) -> &str {
        "shell"
    }

    async fn run(&self, snapshot: &SuiteSnapshot) -> Result<RunnerOutput, RunnerError> {
        let scratch = self.prepare(snapshot).await?;
        let working_dir = match &self.command_dir {
            Some(dir) => scratch.path().join(dir),
            None => scratch.path().to_path_buf(),
        };

        tracing::info!(
            runner = self.name(),
            snapshot = %snapshot.label,
            command = %self.test_command,
            "Running test command"
        );

        let started = Instant::now();
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.test_command)
            .current_dir(&working_dir)
            .env("AUGUR_SNAPSHOT_LABEL", &snapshot.label)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(runner = self.name(), error = %e, "Failed to spawn test command");
                if e.kind() == io::ErrorKind::NotFound {
                    RunnerError::Unavailable(format!("{}: {e}", self.shell))
                } else {
                    RunnerError::Spawn(e.to_string())
                }
            })?;
        let duration = started.elapsed();

        let coverage_artifact = tokio::fs::read(scratch.path().join(&self.coverage_report))
            .await
            .ok()
            .map(|bytes| CoverageArtifact {
                path: self.coverage_report.clone(),
                bytes,
            });

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::info!(
            runner = self.name(),
            snapshot = %snapshot.label,
            exit_code,
            duration_ms = duration.as_millis() as u64,
            coverage = coverage_artifact.is_some(),
            "Test command complete"
        );

        Ok(RunnerOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration,
            coverage_artifact,
        })
    }
}

/// Recursively copy `src` into `dst`, skipping top-level `exclude` entries.
fn copy_tree(src: &Path, dst: &Path, exclude: &[String]) -> io::Result<()> {
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf(), true)];

    while let Some((from, to, top_level)) = pending.pop() {
        std::fs::create_dir_all(&to)?;
        for entry in std::fs::read_dir(&from)? {
            let entry = entry?;
            let name = entry.file_name();
            if top_level && exclude.iter().any(|e| name.to_string_lossy() == e.as_str()) {
                continue;
            }
            let file_type = entry.file_type()?;
            let target = to.join(&name);
            if file_type.is_dir() {
                pending.push((entry.path(), target, false));
            } else if file_type.is_file() {
                std::fs::copy(entry.path(), &target)?;
            } else if file_type.is_symlink() {
                // Follow links to files; skip dangling ones and directories.
                if entry.path().is_file() {
                    std::fs::copy(entry.path(), &target)?;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
