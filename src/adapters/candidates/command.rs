//! Candidate source backed by an external oracle command.
//!
//! The command receives the [`CandidateRequest`] as JSON on stdin and answers
//! on stdout in the YAML shape understood by [`parse_candidates`]. Anything
//! from a prompt-building LLM wrapper to a human-in-the-loop script fits.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::domain::models::{Candidate, CandidateRequest, CandidateSourceConfig};
use crate::domain::ports::{CandidateSource, SourceError};

use super::response::parse_candidates;

/// Lines of oracle stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 10;

/// Runs an oracle command once per round.
#[derive(Debug, Clone)]
pub struct CommandCandidateSource {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandCandidateSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout: Duration::from_secs(300),
        }
    }

    /// Build from configuration; `None` when no command is configured.
    pub fn from_config(config: &CandidateSourceConfig) -> Option<Self> {
        let program = config.command.clone()?;
        Some(
            Self::new(program, config.args.clone())
                .with_timeout(Duration::from_secs(config.timeout_seconds)),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn invoke(&self, payload: Vec<u8>) -> Result<std::process::Output, SourceError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SourceError::Unreachable(format!("{}: {e}", self.program))
            } else {
                SourceError::Transient(format!("failed to spawn {}: {e}", self.program))
            }
        })?;

        // stdin is written while stdout and stderr drain, so a full pipe on
        // either side cannot stall the other.
        let stdin = child.stdin.take();
        let write_request = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // An oracle that ignores its input may close stdin early.
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };

        let (written, output) = tokio::join!(write_request, child.wait_with_output());
        let output = output.map_err(|e| {
            SourceError::Transient(format!("failed to wait for {}: {e}", self.program))
        })?;
        written.map_err(|e| SourceError::Transient(format!("failed to write request: {e}")))?;
        Ok(output)
    }
}

#[async_trait]
impl CandidateSource for CommandCandidateSource {
    fn name(&self) -> &str {
        "command"
    }

    async fn propose(&self, request: &CandidateRequest) -> Result<Vec<Candidate>, SourceError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| SourceError::MalformedResponse(format!("cannot encode request: {e}")))?;

        tracing::info!(
            source = self.name(),
            program = %self.program,
            round = request.round,
            uncovered = request.uncovered_lines.len(),
            rejected = request.rejected.len(),
            "Requesting candidates"
        );

        let output = tokio::time::timeout(self.timeout, self.invoke(payload))
            .await
            .map_err(|_| {
                SourceError::Transient(format!(
                    "oracle timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.trim_end().lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(SourceError::Transient(format!(
                "oracle exited with {}: {tail}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_candidates(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn request() -> CandidateRequest {
        CandidateRequest {
            round: 1,
            target_file: "src/calc.py".into(),
            source_code: "def add(a, b):\n    return a + b\n".into(),
            existing_tests: String::new(),
            uncovered_lines: BTreeSet::from([2]),
            rejected: Vec::new(),
            max_candidates: 2,
        }
    }

    fn sh(script: &str) -> CommandCandidateSource {
        CommandCandidateSource::new("sh", vec!["-c".into(), script.into()])
    }

    #[tokio::test]
    async fn parses_oracle_stdout() {
        let source = sh(concat!(
            "cat > /dev/null; printf '",
            "new_tests:\\n  - test_name: test_add\\n    test_behavior: adds\\n",
            "    test_code: assert add(1, 2) == 3\\n'",
        ));
        let candidates = source.propose(&request()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "test_add");
    }

    #[tokio::test]
    async fn request_is_sent_as_json() {
        let source = sh("grep -q '\"target_file\":\"src/calc.py\"' && echo '[]'");
        let candidates = source.propose(&request()).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn failing_oracle_is_transient() {
        let err = sh("echo quota exceeded >&2; exit 1").propose(&request()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn missing_program_is_unreachable() {
        let source = CommandCandidateSource::new("/nonexistent/augur-oracle", Vec::new());
        assert!(matches!(
            source.propose(&request()).await,
            Err(SourceError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let source = sh("sleep 5").with_timeout(Duration::from_millis(50));
        assert!(source.propose(&request()).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn large_request_with_chatty_oracle_completes() {
        let mut big = request();
        big.source_code = "x = 1\n".repeat(50_000);
        let source = sh("head -c 200000 /dev/zero >&2; cat > /dev/null; echo '[]'")
            .with_timeout(Duration::from_secs(20));

        let candidates = source.propose(&big).await.unwrap();

        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn garbage_output_is_malformed() {
        let err = sh("cat > /dev/null; echo 'no tests today'")
            .propose(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::MalformedResponse(_)));
    }
}
