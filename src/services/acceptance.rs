//! Keep/discard decisions for built candidates.
//!
//! The engine is the only code that commits a candidate into the persistent
//! suite or moves the coverage baseline. Callers apply decisions one at a
//! time in submission order, so every delta is measured against a single
//! baseline.

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::errors::AugmentError;
use crate::domain::models::{
    AcceptedTest, BuildVerdict, Candidate, CoverageDelta, CoverageReport, IterationState,
    RejectionReason, RunResult, TestSuite,
};

use super::similarity::SimilarityMatcher;

/// Output lines kept in ledger entries for failing runs.
const EXCERPT_LINES: usize = 20;

/// Result of scoring one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept { delta: CoverageDelta },
    Reject { reason: RejectionReason, detail: String },
}

impl Decision {
    fn reject(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self::Reject {
            reason,
            detail: detail.into(),
        }
    }

    /// Rejection for a per-candidate error, with run output appended.
    fn rejected(error: &AugmentError, excerpt: &str) -> Self {
        let detail = if excerpt.trim().is_empty() {
            error.to_string()
        } else {
            format!("{error}\n{}", excerpt.trim_end())
        };
        Self::reject(error.rejection_reason(), detail)
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

/// Decides whether a candidate becomes an [`AcceptedTest`].
#[derive(Debug, Clone)]
pub struct AcceptanceEngine {
    matcher: SimilarityMatcher,
    target_file: String,
    dedupe_against_original: bool,
}

impl AcceptanceEngine {
    pub fn new(matcher: SimilarityMatcher, target_file: impl Into<String>) -> Self {
        Self {
            matcher,
            target_file: target_file.into(),
            dedupe_against_original: false,
        }
    }

    /// Also compare candidates with each test the file held at the start.
    pub fn with_original_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_against_original = enabled;
        self
    }

    /// Score `candidate` without mutating anything.
    ///
    /// Checks run in order and the first failure wins: build verdict, then
    /// coverage gain, then duplication of an accepted test, then (when
    /// enabled) duplication of one of `original_tests`.
    pub fn evaluate(
        &self,
        candidate: &Candidate,
        results: &[RunResult],
        baseline: &CoverageReport,
        accepted: &[AcceptedTest],
        original_tests: &[String],
    ) -> Decision {
        let Some(last) = results.last() else {
            return Decision::reject(RejectionReason::BuildFailed, "no runs recorded");
        };
        let excerpt = last.error_excerpt(EXCERPT_LINES);

        let failure = match BuildVerdict::classify(results) {
            BuildVerdict::Passed => None,
            BuildVerdict::Failed(exit_code) => Some(AugmentError::BuildFailed { exit_code }),
            BuildVerdict::TimedOut => Some(AugmentError::TimedOut(last.duration.as_secs())),
            BuildVerdict::Flaky => Some(AugmentError::Flaky),
        };
        if let Some(error) = failure {
            return Decision::rejected(&error, &excerpt);
        }

        let Some(report) = last.coverage.as_ref() else {
            let why = last
                .coverage_error
                .clone()
                .unwrap_or_else(|| "no coverage report".to_string());
            warn!(
                candidate = %candidate.name,
                error = %why,
                "Treating missing coverage as zero gain"
            );
            return Decision::rejected(&AugmentError::MalformedReport(why), "");
        };

        let delta = match CoverageReport::diff(baseline, report, &self.target_file) {
            Ok(delta) => delta,
            Err(e) => {
                warn!(
                    candidate = %candidate.name,
                    error = %e,
                    "Malformed coverage report, treating as zero gain"
                );
                return Decision::rejected(&AugmentError::from(e), "");
            }
        };
        if delta.is_empty() {
            return Decision::reject(RejectionReason::NoCoverageGain, "no new lines covered");
        }

        let accepted_bodies = accepted
            .iter()
            .map(|t| (t.candidate.name.as_str(), t.candidate.body.as_str()));
        if let Some(name) = self.matcher.find_duplicate(&candidate.body, accepted_bodies) {
            return Decision::reject(
                RejectionReason::Duplicate,
                format!("near-duplicate of accepted test '{name}'"),
            );
        }

        if self.dedupe_against_original {
            let originals = original_tests
                .iter()
                .map(|unit| (unit.lines().next().unwrap_or_default().trim(), unit.as_str()));
            if let Some(header) = self.matcher.find_duplicate(&candidate.body, originals) {
                return Decision::reject(
                    RejectionReason::Duplicate,
                    format!("near-duplicate of existing test '{header}'"),
                );
            }
        }

        Decision::Accept { delta }
    }

    /// Score `candidate` and apply the decision to the run state and suite.
    ///
    /// On acceptance the candidate is committed into `suite`, the baseline
    /// becomes the union of the old baseline and the delta, and the covered
    /// fraction is refreshed. On rejection the candidate is ledgered.
    pub fn apply(
        &self,
        state: &mut IterationState,
        suite: &mut TestSuite,
        candidate: Candidate,
        results: &[RunResult],
    ) -> Decision {
        let decision = match state.baseline_coverage.as_ref() {
            Some(baseline) => self.evaluate(
                &candidate,
                results,
                baseline,
                &state.accepted_tests,
                suite.original_tests(),
            ),
            None => Decision::reject(RejectionReason::NoCoverageGain, "no coverage baseline"),
        };

        match &decision {
            Decision::Accept { delta } => {
                suite.commit(&candidate);
                if let Some(baseline) = state.baseline_coverage.as_ref() {
                    let next = baseline.with_delta(delta);
                    if let Ok(fraction) = next.percent_covered(&self.target_file) {
                        state.current_coverage_fraction =
                            fraction.max(state.current_coverage_fraction);
                    }
                    state.baseline_coverage = Some(next);
                }
                info!(
                    round = state.round_number,
                    candidate = %candidate.name,
                    new_lines = delta.len(),
                    coverage = state.current_coverage_fraction,
                    "Accepted candidate"
                );
                state.accepted_tests.push(AcceptedTest {
                    new_lines: delta.lines.clone(),
                    candidate,
                    round: state.round_number,
                    accepted_at: Utc::now(),
                });
            }
            Decision::Reject { reason, detail } => {
                info!(
                    round = state.round_number,
                    candidate = %candidate.name,
                    reason = %reason,
                    "Rejected candidate"
                );
                state
                    .rejection_ledger
                    .record(&candidate, *reason, detail.clone(), state.round_number);
            }
        }

        decision
    }
}
