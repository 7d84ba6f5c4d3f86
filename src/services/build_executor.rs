//! Bounded, repeated execution of the external test runner.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::domain::errors::AugmentError;
use crate::domain::models::{RunResult, RunStatus, SuiteSnapshot};
use crate::domain::ports::{CoverageDecoder, RunnerError, RunnerOutput, TestRunner};

use super::retry::RetryPolicy;

/// stderr reported for a run that hit the wall-clock bound.
pub const TIMED_OUT_MESSAGE: &str = "Command timed out";

enum Attempt {
    Finished(RunnerOutput),
    TimedOut(Duration),
}

/// Runs suite snapshots through a [`TestRunner`] and decodes their coverage.
///
/// The executor never touches the persistent suite; every invocation gets a
/// snapshot it owns.
pub struct BuildExecutor {
    runner: Arc<dyn TestRunner>,
    decoder: Arc<dyn CoverageDecoder>,
    retry: RetryPolicy,
}

impl BuildExecutor {
    pub fn new(
        runner: Arc<dyn TestRunner>,
        decoder: Arc<dyn CoverageDecoder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            runner,
            decoder,
            retry,
        }
    }

    /// Execute `snapshot` up to `repetitions` times, each bounded by `timeout`.
    ///
    /// Stops at the first failing repetition; the verdict is decided by the
    /// caller from the returned sequence. Coverage is decoded only when every
    /// repetition passed and is attached to the last result.
    ///
    /// Returns `InfrastructureUnavailable` when the runner cannot be invoked
    /// even after retries.
    pub async fn run(
        &self,
        snapshot: &SuiteSnapshot,
        timeout: Duration,
        repetitions: u32,
    ) -> Result<Vec<RunResult>, AugmentError> {
        let repetitions = repetitions.max(1);
        let mut results = Vec::with_capacity(repetitions as usize);
        let mut last_artifact = None;

        for attempt in 1..=repetitions {
            let outcome = self
                .retry
                .execute(|| self.invoke(snapshot, timeout))
                .await
                .map_err(|e| {
                    warn!(
                        runner = self.runner.name(),
                        snapshot = %snapshot.label,
                        error = %e,
                        "Test runner unavailable"
                    );
                    AugmentError::InfrastructureUnavailable(e.to_string())
                })?;

            let result = match outcome {
                Attempt::Finished(output) => {
                    last_artifact = output.coverage_artifact;
                    RunResult {
                        attempt,
                        status: RunStatus::Exited(output.exit_code),
                        duration: output.duration,
                        stdout: output.stdout,
                        stderr: output.stderr,
                        coverage: None,
                        coverage_error: None,
                    }
                }
                Attempt::TimedOut(elapsed) => {
                    warn!(
                        snapshot = %snapshot.label,
                        attempt,
                        timeout_secs = timeout.as_secs(),
                        "Test run timed out"
                    );
                    last_artifact = None;
                    RunResult {
                        attempt,
                        status: RunStatus::TimedOut,
                        duration: elapsed,
                        stdout: String::new(),
                        stderr: TIMED_OUT_MESSAGE.to_string(),
                        coverage: None,
                        coverage_error: None,
                    }
                }
            };

            debug!(
                snapshot = %snapshot.label,
                attempt,
                exit_code = result.exit_code(),
                duration_ms = result.duration.as_millis() as u64,
                "Test run finished"
            );

            let passed = result.passed();
            results.push(result);
            if !passed {
                break;
            }
        }

        let all_passed =
            results.len() == repetitions as usize && results.iter().all(RunResult::passed);
        if all_passed {
            if let Some(last) = results.last_mut() {
                match last_artifact {
                    Some(artifact) => match self.decoder.decode(&artifact) {
                        Ok(report) => last.coverage = Some(report),
                        Err(e) => {
                            warn!(
                                decoder = self.decoder.name(),
                                artifact = %artifact.path.display(),
                                error = %e,
                                "Could not decode coverage artifact"
                            );
                            last.coverage_error = Some(e.to_string());
                        }
                    },
                    None => {
                        last.coverage_error = Some("no coverage artifact produced".to_string());
                    }
                }
            }
        }

        info!(
            snapshot = %snapshot.label,
            runs = results.len(),
            passed = all_passed,
            "Build finished"
        );
        Ok(results)
    }

    async fn invoke(
        &self,
        snapshot: &SuiteSnapshot,
        timeout: Duration,
    ) -> Result<Attempt, RunnerError> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.runner.run(snapshot)).await {
            Ok(output) => output.map(Attempt::Finished),
            Err(_) => Ok(Attempt::TimedOut(started.elapsed())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CoverageError;
    use crate::domain::models::{CoverageReport, FileCoverage};
    use crate::domain::ports::CoverageArtifact;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct ScriptedRunner {
        script: Mutex<Vec<Result<(i32, Duration), RunnerError>>>,
    }

    impl ScriptedRunner {
        fn new(script: Vec<Result<(i32, Duration), RunnerError>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }

        fn remaining(&self) -> usize {
            self.script.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TestRunner for ScriptedRunner {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, _snapshot: &SuiteSnapshot) -> Result<RunnerOutput, RunnerError> {
            let next = self.script.lock().unwrap().remove(0);
            let (exit_code, delay) = next?;
            tokio::time::sleep(delay).await;
            Ok(RunnerOutput {
                exit_code,
                stdout: String::new(),
                stderr: if exit_code == 0 { String::new() } else { "boom".into() },
                duration: delay,
                coverage_artifact: Some(CoverageArtifact {
                    path: PathBuf::from("coverage.json"),
                    bytes: Vec::new(),
                }),
            })
        }
    }

    struct FixedDecoder(Result<CoverageReport, CoverageError>);

    impl CoverageDecoder for FixedDecoder {
        fn name(&self) -> &str {
            "fixed"
        }

        fn decode(&self, _artifact: &CoverageArtifact) -> Result<CoverageReport, CoverageError> {
            self.0.clone()
        }
    }

    fn report() -> CoverageReport {
        CoverageReport::new().with_file("calc.py", FileCoverage::new([1], [1, 2]))
    }

    fn snapshot() -> SuiteSnapshot {
        SuiteSnapshot {
            test_file: PathBuf::from("test_calc.py"),
            contents: String::new(),
            label: "candidate".into(),
        }
    }

    fn executor(
        runner: Arc<ScriptedRunner>,
        decoded: Result<CoverageReport, CoverageError>,
    ) -> BuildExecutor {
        BuildExecutor::new(runner, Arc::new(FixedDecoder(decoded)), RetryPolicy::new(1, 1, 2))
    }

    #[tokio::test]
    async fn attaches_coverage_to_last_passing_run() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Ok((0, Duration::ZERO)),
            Ok((0, Duration::ZERO)),
        ]));
        let results = executor(runner, Ok(report()))
            .run(&snapshot(), Duration::from_secs(5), 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].coverage.is_none());
        assert_eq!(results[1].coverage, Some(report()));
        assert_eq!(results[1].attempt, 2);
    }

    #[tokio::test]
    async fn stops_at_first_failure_without_coverage() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Ok((0, Duration::ZERO)),
            Ok((1, Duration::ZERO)),
            Ok((0, Duration::ZERO)),
        ]));
        let results = executor(Arc::clone(&runner), Ok(report()))
            .run(&snapshot(), Duration::from_secs(5), 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.coverage.is_none()));
        assert_eq!(runner.remaining(), 1);
    }

    #[tokio::test]
    async fn timeout_yields_synthetic_result() {
        let runner = Arc::new(ScriptedRunner::new(vec![Ok((0, Duration::from_secs(30)))]));
        let results = executor(runner, Ok(report()))
            .run(&snapshot(), Duration::from_millis(20), 1)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, RunStatus::TimedOut);
        assert_eq!(results[0].exit_code(), -1);
        assert_eq!(results[0].stderr, TIMED_OUT_MESSAGE);
    }

    #[tokio::test]
    async fn retries_transient_spawn_failure() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Err(RunnerError::Spawn("EAGAIN".into())),
            Ok((0, Duration::ZERO)),
        ]));
        let results = executor(runner, Ok(report()))
            .run(&snapshot(), Duration::from_secs(5), 1)
            .await
            .unwrap();
        assert!(results[0].passed());
    }

    #[tokio::test]
    async fn unavailable_runner_is_infrastructure_error() {
        let runner = Arc::new(ScriptedRunner::new(vec![Err(RunnerError::Unavailable(
            "sh: not found".into(),
        ))]));
        let err = executor(runner, Ok(report()))
            .run(&snapshot(), Duration::from_secs(5), 1)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn decode_failure_is_recorded_not_raised() {
        let runner = Arc::new(ScriptedRunner::new(vec![Ok((0, Duration::ZERO))]));
        let results = executor(runner, Err(CoverageError::Decode("bad json".into())))
            .run(&snapshot(), Duration::from_secs(5), 1)
            .await
            .unwrap();

        assert!(results[0].passed());
        assert!(results[0].coverage.is_none());
        assert_eq!(results[0].coverage_error.as_deref(), Some("bad json"));
    }
}
