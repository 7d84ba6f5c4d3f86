//! Per-run iteration state and the final run report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::{AcceptedTest, RejectionLedger, RejectionReason};
use super::coverage::CoverageReport;

/// Phases of the augmentation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Seeding,
    Generating,
    Validating,
    Building,
    Scoring,
    Converged,
    Exhausted,
    Fatal,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seeding => "seeding",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Building => "building",
            Self::Scoring => "scoring",
            Self::Converged => "converged",
            Self::Exhausted => "exhausted",
            Self::Fatal => "fatal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::Exhausted | Self::Fatal)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Fatal` is reachable from any non-terminal phase. Generation may end a
    /// run early when the oracle is unreachable or cancellation was requested.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use RunPhase::{
            Building, Converged, Exhausted, Fatal, Generating, Scoring, Seeding, Validating,
        };

        if self.is_terminal() {
            return false;
        }
        if next == Fatal {
            return true;
        }
        matches!(
            (self, next),
            (Seeding, Generating | Converged)
                | (Generating, Validating | Exhausted)
                | (Validating, Building)
                | (Building, Scoring)
                | (Scoring, Generating | Converged | Exhausted)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one augmentation run.
///
/// Constructed per run and passed by reference; nothing here is global, so
/// several runs can proceed side by side in one process.
#[derive(Debug, Clone)]
pub struct IterationState {
    pub run_id: Uuid,
    pub phase: RunPhase,
    /// Current round, starting at 1 once generation begins.
    pub round_number: u32,
    /// Committed coverage the next candidate is measured against.
    pub baseline_coverage: Option<CoverageReport>,
    pub initial_coverage_fraction: f64,
    pub current_coverage_fraction: f64,
    pub rejection_ledger: RejectionLedger,
    pub accepted_tests: Vec<AcceptedTest>,
    pub consecutive_no_progress_rounds: u32,
    pub started_at: DateTime<Utc>,
}

impl IterationState {
    pub fn new(ledger_signature_prefix: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: RunPhase::Seeding,
            round_number: 0,
            baseline_coverage: None,
            initial_coverage_fraction: 0.0,
            current_coverage_fraction: 0.0,
            rejection_ledger: RejectionLedger::new(ledger_signature_prefix),
            accepted_tests: Vec::new(),
            consecutive_no_progress_rounds: 0,
            started_at: Utc::now(),
        }
    }

    /// Move to `next`, returning `false` (and staying put) if the transition is illegal.
    pub fn transition(&mut self, next: RunPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(
                run_id = %self.run_id,
                from = %self.phase,
                to = %next,
                "Ignoring invalid phase transition"
            );
            return false;
        }
        tracing::debug!(run_id = %self.run_id, from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
        true
    }
}

/// Why a run stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionCause {
    /// `max_iterations` rounds completed.
    IterationBudget,
    /// Too many consecutive rounds without an accepted test.
    Stagnation,
    /// A graceful stop was requested between rounds.
    Cancelled,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    Converged,
    Exhausted { cause: ExhaustionCause },
    Fatal { error: String },
}

impl RunOutcome {
    pub fn phase(&self) -> RunPhase {
        match self {
            Self::Converged => RunPhase::Converged,
            Self::Exhausted { .. } => RunPhase::Exhausted,
            Self::Fatal { .. } => RunPhase::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// What a run hands back to its caller, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub rounds: u32,
    pub initial_coverage: f64,
    pub final_coverage: f64,
    pub accepted_tests: Vec<AcceptedTest>,
    pub rejections: BTreeMap<RejectionReason, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Close out `state` with `outcome`.
    pub fn from_state(state: &IterationState, outcome: RunOutcome) -> Self {
        Self {
            run_id: state.run_id,
            outcome,
            rounds: state.round_number,
            initial_coverage: state.initial_coverage_fraction,
            final_coverage: state.current_coverage_fraction,
            accepted_tests: state.accepted_tests.clone(),
            rejections: state.rejection_ledger.counts_by_reason(),
            started_at: state.started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn total_rejections(&self) -> usize {
        self.rejections.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        let path = [
            RunPhase::Seeding,
            RunPhase::Generating,
            RunPhase::Validating,
            RunPhase::Building,
            RunPhase::Scoring,
            RunPhase::Generating,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(RunPhase::Scoring.can_transition_to(RunPhase::Converged));
        assert!(RunPhase::Seeding.can_transition_to(RunPhase::Fatal));
    }

    #[test]
    fn terminal_phases_are_final() {
        for phase in [RunPhase::Converged, RunPhase::Exhausted, RunPhase::Fatal] {
            assert!(phase.is_terminal());
            assert!(!phase.can_transition_to(RunPhase::Generating));
            assert!(!phase.can_transition_to(RunPhase::Fatal));
        }
    }

    #[test]
    fn skipping_phases_is_rejected() {
        let mut state = IterationState::new(100);
        assert!(!state.transition(RunPhase::Building));
        assert_eq!(state.phase, RunPhase::Seeding);
        assert!(state.transition(RunPhase::Generating));
        assert_eq!(state.phase, RunPhase::Generating);
    }

    #[test]
    fn report_reflects_state() {
        let mut state = IterationState::new(100);
        state.round_number = 3;
        state.initial_coverage_fraction = 0.4;
        state.current_coverage_fraction = 0.7;
        let report = RunReport::from_state(&state, RunOutcome::Converged);

        assert_eq!(report.rounds, 3);
        assert_eq!(report.outcome.phase(), RunPhase::Converged);
        assert_eq!(report.total_rejections(), 0);
        let json = serde_json::to_value(&report.outcome).unwrap();
        assert_eq!(json["status"], "converged");
    }
}
