//! The augmentation loop.
//!
//! One [`IterationController::run`] call owns one [`IterationState`] from
//! seeding to a terminal phase:
//!
//! ```text
//! SEEDING -> GENERATING -> VALIDATING -> BUILDING -> SCORING -+-> CONVERGED
//!               ^                                             +-> EXHAUSTED
//!               +---------------------------------------------+
//! ```
//!
//! Any non-terminal phase may fall through to FATAL on infrastructure
//! failure. Builds inside a round may run concurrently; scoring is serial in
//! submission order so coverage deltas always share one baseline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::domain::errors::AugmentError;
use crate::domain::models::{
    AugmentConfig, BuildVerdict, Candidate, CandidateRequest, ExhaustionCause, IterationState,
    RejectionReason, RunOutcome, RunPhase, RunReport, RunResult, TestSuite,
};
use crate::domain::ports::{CandidateSource, SourceError, SuiteStore};

use super::acceptance::AcceptanceEngine;
use super::build_executor::BuildExecutor;
use super::candidate_validator::CandidateValidator;
use super::retry::RetryPolicy;
use super::similarity::SimilarityMatcher;

/// Handle used to request a graceful stop between rounds.
///
/// In-flight builds finish (or hit their own timeout); no new round starts.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    stop_flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the controller to stop before its next round.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }
}

type BuildOutcome = (Candidate, Result<Vec<RunResult>, AugmentError>);

/// Drives rounds until convergence, exhaustion or a fatal error.
pub struct IterationController {
    config: AugmentConfig,
    target_file: String,
    source_code: String,
    source: Arc<dyn CandidateSource>,
    executor: Arc<BuildExecutor>,
    store: Arc<dyn SuiteStore>,
    validator: CandidateValidator,
    acceptance: AcceptanceEngine,
    retry: RetryPolicy,
    shutdown: ShutdownHandle,
}

impl IterationController {
    /// `target_file` is the coverage report key of the source file under test.
    pub fn new(
        config: AugmentConfig,
        target_file: impl Into<String>,
        source: Arc<dyn CandidateSource>,
        executor: Arc<BuildExecutor>,
        store: Arc<dyn SuiteStore>,
    ) -> Self {
        let target_file = target_file.into();
        let matcher = SimilarityMatcher::new(
            config.fuzzy_lookup_threshold,
            config.fuzzy_lookup_prefix_length,
        );
        let acceptance = AcceptanceEngine::new(matcher, target_file.clone())
            .with_original_dedupe(config.dedupe_against_original_tests);

        Self {
            config,
            target_file,
            source_code: String::new(),
            source,
            executor,
            store,
            validator: CandidateValidator::new(matcher),
            acceptance,
            retry: RetryPolicy::default(),
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Source text handed to the candidate source with every request.
    pub fn with_source_code(mut self, source_code: impl Into<String>) -> Self {
        self.source_code = source_code.into();
        self
    }

    /// Retry policy for candidate source calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.config.max_run_time_seconds)
    }

    /// Execute one complete augmentation run.
    ///
    /// Always returns a report; fatal errors are carried in its outcome with
    /// every test accepted before the failure listed.
    pub async fn run(&self) -> RunReport {
        let mut state = IterationState::new(self.config.fuzzy_lookup_prefix_length);
        info!(
            run_id = %state.run_id,
            target = %self.target_file,
            desired_coverage = self.config.desired_coverage,
            max_iterations = self.config.max_iterations,
            "Starting augmentation run"
        );

        let outcome = self.drive(&mut state).await;
        state.transition(outcome.phase());

        let report = RunReport::from_state(&state, outcome);
        info!(
            run_id = %report.run_id,
            outcome = %report.outcome.phase(),
            rounds = report.rounds,
            accepted = report.accepted_tests.len(),
            rejected = report.total_rejections(),
            final_coverage = report.final_coverage,
            "Augmentation run finished"
        );
        report
    }

    async fn drive(&self, state: &mut IterationState) -> RunOutcome {
        let mut suite = match self.seed(state).await {
            Ok(suite) => suite,
            Err(e) => return fatal(e),
        };

        if state.current_coverage_fraction >= self.config.desired_coverage {
            info!(
                coverage = state.current_coverage_fraction,
                "Existing suite already meets desired coverage"
            );
            return RunOutcome::Converged;
        }

        loop {
            state.transition(RunPhase::Generating);
            if self.shutdown.is_stop_requested() {
                info!(round = state.round_number, "Stop requested, not starting another round");
                return RunOutcome::Exhausted {
                    cause: ExhaustionCause::Cancelled,
                };
            }
            state.round_number += 1;

            let candidates = match self.generate(state, &suite).await {
                Ok(candidates) => candidates,
                Err(e) => return fatal(e),
            };

            state.transition(RunPhase::Validating);
            let valid = self.validate(state, candidates);

            state.transition(RunPhase::Building);
            let outcomes = self.build(&suite, valid).await;

            state.transition(RunPhase::Scoring);
            let accepted_before = state.accepted_tests.len();
            if let Err(e) = self.score(state, &mut suite, outcomes) {
                return fatal(e);
            }
            let accepted_this_round = state.accepted_tests.len() - accepted_before;

            if accepted_this_round > 0 {
                if let Err(e) = self.store.persist(&suite).await {
                    error!(error = %e, "Failed to persist accepted tests");
                    return fatal(AugmentError::InfrastructureUnavailable(e.to_string()));
                }
            }

            info!(
                round = state.round_number,
                accepted = accepted_this_round,
                coverage = state.current_coverage_fraction,
                "Round complete"
            );

            if state.current_coverage_fraction >= self.config.desired_coverage {
                return RunOutcome::Converged;
            }
            if state.round_number >= self.config.max_iterations {
                return RunOutcome::Exhausted {
                    cause: ExhaustionCause::IterationBudget,
                };
            }
            if accepted_this_round == 0 {
                state.consecutive_no_progress_rounds += 1;
                if state.consecutive_no_progress_rounds > self.config.max_stagnant_rounds {
                    warn!(
                        rounds_without_progress = state.consecutive_no_progress_rounds,
                        "Stopping: no candidate accepted for too many rounds"
                    );
                    return RunOutcome::Exhausted {
                        cause: ExhaustionCause::Stagnation,
                    };
                }
            } else {
                state.consecutive_no_progress_rounds = 0;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Load the suite and measure its coverage with a single run.
    async fn seed(&self, state: &mut IterationState) -> Result<TestSuite, AugmentError> {
        let suite = self
            .store
            .load()
            .await
            .map_err(|e| AugmentError::InfrastructureUnavailable(e.to_string()))?;

        let results = self
            .executor
            .run(&suite.snapshot(), self.run_timeout(), 1)
            .await?;

        let verdict = BuildVerdict::classify(&results);
        if !verdict.is_pass() {
            let excerpt = results.last().map(|r| r.error_excerpt(20)).unwrap_or_default();
            return Err(AugmentError::InfrastructureUnavailable(format!(
                "existing test suite does not pass ({verdict:?}): {excerpt}"
            )));
        }

        let report = results
            .last()
            .and_then(|r| r.coverage.clone())
            .ok_or_else(|| {
                let why = results
                    .last()
                    .and_then(|r| r.coverage_error.clone())
                    .unwrap_or_else(|| "no coverage report".to_string());
                AugmentError::MalformedReport(format!("baseline coverage unavailable: {why}"))
            })?;
        let fraction = report.percent_covered(&self.target_file)?;

        info!(
            target = %self.target_file,
            coverage = fraction,
            uncovered = report.uncovered_lines(&self.target_file).map(|l| l.len()).unwrap_or(0),
            "Seeded coverage baseline"
        );
        state.baseline_coverage = Some(report);
        state.initial_coverage_fraction = fraction;
        state.current_coverage_fraction = fraction;
        Ok(suite)
    }

    async fn generate(
        &self,
        state: &IterationState,
        suite: &TestSuite,
    ) -> Result<Vec<Candidate>, AugmentError> {
        let uncovered_lines = state
            .baseline_coverage
            .as_ref()
            .and_then(|b| b.uncovered_lines(&self.target_file).ok())
            .unwrap_or_default();
        let request = CandidateRequest {
            round: state.round_number,
            target_file: self.target_file.clone(),
            source_code: self.source_code.clone(),
            existing_tests: suite.contents().to_string(),
            uncovered_lines,
            rejected: state.rejection_ledger.summaries(),
            max_candidates: self.config.max_tests_per_run,
        };

        match self.retry.execute(|| self.source.propose(&request)).await {
            Ok(mut candidates) => {
                if candidates.len() > self.config.max_tests_per_run {
                    debug!(
                        proposed = candidates.len(),
                        limit = self.config.max_tests_per_run,
                        "Truncating candidate batch"
                    );
                    candidates.truncate(self.config.max_tests_per_run);
                }
                info!(
                    round = state.round_number,
                    source = self.source.name(),
                    candidates = candidates.len(),
                    "Received candidates"
                );
                Ok(candidates)
            }
            Err(SourceError::MalformedResponse(why)) => {
                warn!(
                    round = state.round_number,
                    error = %why,
                    "Malformed candidate response, continuing with an empty batch"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(AugmentError::InfrastructureUnavailable(e.to_string())),
        }
    }

    fn validate(&self, state: &mut IterationState, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut valid = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self
                .validator
                .validate(&candidate, &state.accepted_tests, &state.rejection_ledger)
            {
                Ok(()) => valid.push(candidate),
                Err(e) => {
                    info!(
                        round = state.round_number,
                        candidate = %candidate.name,
                        error = %e,
                        "Candidate failed validation"
                    );
                    state.rejection_ledger.record(
                        &candidate,
                        e.rejection_reason(),
                        e.to_string(),
                        state.round_number,
                    );
                }
            }
        }
        valid
    }

    /// Build every candidate against the round-start suite.
    ///
    /// Results come back in submission order regardless of completion order.
    async fn build(&self, suite: &TestSuite, candidates: Vec<Candidate>) -> Vec<BuildOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.build_workers.max(1)));
        let timeout = self.run_timeout();
        let repetitions = self.config.run_tests_multiple_times;
        let mut submitted = Vec::with_capacity(candidates.len());
        let mut handles = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let snapshot = suite.snapshot_with(&candidate);
            let executor = Arc::clone(&self.executor);
            let permit = Arc::clone(&semaphore).acquire_owned().await.ok();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                executor.run(&snapshot, timeout, repetitions).await
            }));
            submitted.push(candidate);
        }

        submitted
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(candidate, joined)| {
                let result = joined.unwrap_or_else(|e| {
                    Err(AugmentError::InfrastructureUnavailable(format!(
                        "build task failed: {e}"
                    )))
                });
                (candidate, result)
            })
            .collect()
    }

    /// Apply build outcomes in order. Fails only when every build in the
    /// round hit an infrastructure error.
    fn score(
        &self,
        state: &mut IterationState,
        suite: &mut TestSuite,
        outcomes: Vec<BuildOutcome>,
    ) -> Result<(), AugmentError> {
        let attempted = outcomes.len();
        let mut last_infra_error = None;
        let mut infra_failures = 0;

        for (candidate, outcome) in outcomes {
            match outcome {
                Ok(results) => {
                    self.acceptance.apply(state, suite, candidate, &results);
                }
                Err(e) => {
                    warn!(candidate = %candidate.name, error = %e, "Build could not be executed");
                    state.rejection_ledger.record(
                        &candidate,
                        RejectionReason::BuildFailed,
                        e.to_string(),
                        state.round_number,
                    );
                    if e.is_fatal() {
                        infra_failures += 1;
                        last_infra_error = Some(e);
                    }
                }
            }
        }

        match last_infra_error {
            Some(e) if infra_failures == attempted => Err(e),
            _ => Ok(()),
        }
    }
}

fn fatal(error: AugmentError) -> RunOutcome {
    error!(error = %error, "Augmentation run failed");
    RunOutcome::Fatal {
        error: error.to_string(),
    }
}
