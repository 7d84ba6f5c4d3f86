//! Common test utilities for integration tests
//!
//! Scripted fakes for the loop's collaborators. The fake runner derives
//! coverage from `covers N` markers in the snapshot's test file, so a
//! candidate's coverage is simply the markers its body carries.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use augur::adapters::coverage::JsonCoverageDecoder;
use augur::domain::models::{
    AugmentConfig, Candidate, CandidateRequest, InsertionLayout, SuiteSnapshot, TestSuite,
};
use augur::domain::ports::{
    CandidateSource, CoverageArtifact, RunnerError, RunnerOutput, SourceError, StoreError,
    SuiteStore, TestRunner,
};
use augur::services::{BuildExecutor, IterationController, RetryPolicy};

pub const TARGET: &str = "src/calc.py";
pub const COVERABLE: u32 = 10;

pub const INITIAL_TESTS: &str = "import calc\n\ndef test_existing():\n    assert calc.add(1, 1) == 2\n";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Loop settings tuned for fast tests.
pub fn augment_config() -> AugmentConfig {
    AugmentConfig {
        desired_coverage: 0.7,
        max_iterations: 3,
        max_tests_per_run: 4,
        max_run_time_seconds: 5,
        run_tests_multiple_times: 1,
        fuzzy_lookup_threshold: 95.0,
        fuzzy_lookup_prefix_length: 1000,
        max_stagnant_rounds: 2,
        build_workers: 1,
        dedupe_against_original_tests: false,
    }
}

/// A candidate whose body covers `lines` of the target.
pub fn covering(name: &str, lines: &[u32], assertion: &str) -> Candidate {
    let markers = lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Candidate::new(
        name,
        format!("def {name}():\n    # covers {markers}\n    {assertion}"),
    )
    .with_behavior(format!("{name} behavior"))
    .with_target_lines(lines.iter().copied())
}

// ---------------------------------------------------------------------------
// MarkerRunner
// ---------------------------------------------------------------------------

/// Test runner whose coverage is `baseline` plus every `covers N` marker.
///
/// Markers in test bodies change behavior: `FAIL` exits 1, `SLEEP` blocks for
/// a minute, `FLAKY` alternates pass/fail on successive calls.
pub struct MarkerRunner {
    baseline: BTreeSet<u32>,
    unavailable: bool,
    calls: AtomicUsize,
    flaky_calls: AtomicUsize,
    labels: Mutex<Vec<String>>,
}

impl MarkerRunner {
    pub fn new(baseline: impl IntoIterator<Item = u32>) -> Self {
        Self {
            baseline: baseline.into_iter().collect(),
            unavailable: false,
            calls: AtomicUsize::new(0),
            flaky_calls: AtomicUsize::new(0),
            labels: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new([])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    fn covered(&self, contents: &str) -> BTreeSet<u32> {
        let mut covered = self.baseline.clone();
        for line in contents.lines() {
            if let Some(idx) = line.find("covers ") {
                covered.extend(
                    line[idx + "covers ".len()..]
                        .split(',')
                        .filter_map(|n| n.trim().parse::<u32>().ok()),
                );
            }
        }
        covered
    }
}

#[async_trait]
impl TestRunner for MarkerRunner {
    fn name(&self) -> &str {
        "marker"
    }

    async fn run(&self, snapshot: &SuiteSnapshot) -> Result<RunnerOutput, RunnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.labels.lock().unwrap().push(snapshot.label.clone());
        if self.unavailable {
            return Err(RunnerError::Unavailable("toolchain not installed".into()));
        }

        let contents = &snapshot.contents;
        if contents.contains("SLEEP") {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        let failed = contents.contains("FAIL")
            || (contents.contains("FLAKY")
                && self.flaky_calls.fetch_add(1, Ordering::SeqCst) % 2 == 1);

        let artifact = serde_json::json!({
            "files": {
                TARGET: {
                    "covered": self.covered(contents),
                    "coverable": (1..=COVERABLE).collect::<Vec<_>>(),
                }
            }
        });

        Ok(RunnerOutput {
            exit_code: i32::from(failed),
            stdout: "collected tests".into(),
            stderr: if failed {
                "AssertionError: expected 3, got 4".into()
            } else {
                String::new()
            },
            duration: Duration::from_millis(1),
            coverage_artifact: Some(CoverageArtifact {
                path: PathBuf::from("coverage.json"),
                bytes: serde_json::to_vec(&artifact).unwrap(),
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// Candidate source that replays one scripted response per round.
///
/// With `repeating`, the same batch is returned every round instead.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Candidate>, SourceError>>>,
    repeat: Option<Vec<Candidate>>,
    requests: Mutex<Vec<CandidateRequest>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<Candidate>, SourceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rounds(rounds: Vec<Vec<Candidate>>) -> Self {
        Self::new(rounds.into_iter().map(Ok).collect())
    }

    pub fn repeating(batch: Vec<Candidate>) -> Self {
        Self {
            repeat: Some(batch),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CandidateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn propose(&self, request: &CandidateRequest) -> Result<Vec<Candidate>, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(batch) = &self.repeat {
            return Ok(batch.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory suite store recording every persisted version.
pub struct MemoryStore {
    initial: String,
    persisted: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            persisted: Mutex::new(Vec::new()),
        }
    }

    pub fn persisted(&self) -> Vec<String> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuiteStore for MemoryStore {
    async fn load(&self) -> Result<TestSuite, StoreError> {
        Ok(TestSuite::new(
            "tests/test_calc.py",
            self.initial.clone(),
            InsertionLayout::default(),
        ))
    }

    async fn persist(&self, suite: &TestSuite) -> Result<(), StoreError> {
        self.persisted.lock().unwrap().push(suite.contents().to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub controller: IterationController,
    pub runner: Arc<MarkerRunner>,
    pub source: Arc<ScriptedSource>,
    pub store: Arc<MemoryStore>,
}

/// Wire a controller around the fakes with a fast retry policy.
pub fn harness(config: AugmentConfig, runner: MarkerRunner, source: ScriptedSource) -> Harness {
    let runner = Arc::new(runner);
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new(INITIAL_TESTS));
    let retry = RetryPolicy::new(1, 1, 2);

    let executor = BuildExecutor::new(
        runner.clone(),
        Arc::new(JsonCoverageDecoder),
        retry.clone(),
    );
    let controller = IterationController::new(
        config,
        TARGET,
        source.clone(),
        Arc::new(executor),
        store.clone(),
    )
    .with_source_code("def add(a, b):\n    return a + b\n")
    .with_retry(retry);

    Harness {
        controller,
        runner,
        source,
        store,
    }
}
