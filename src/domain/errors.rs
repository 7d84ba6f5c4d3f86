//! Domain errors for the augmentation loop.
//!
//! [`AugmentError`] is the taxonomy the controller reasons about. Per-candidate
//! variants are always absorbed inside a round; only
//! [`AugmentError::InfrastructureUnavailable`] (and any failure while seeding)
//! ends a run.

use thiserror::Error;

use super::models::RejectionReason;

/// Errors produced while augmenting a test suite.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AugmentError {
    #[error("Invalid candidate '{name}': {reason}")]
    InvalidCandidate { name: String, reason: InvalidCandidateReason },

    #[error("Build failed with exit code {exit_code}")]
    BuildFailed { exit_code: i32 },

    #[error("Build timed out after {0}s")]
    TimedOut(u64),

    #[error("Candidate is flaky: repetitions disagree on pass/fail")]
    Flaky,

    #[error("Malformed coverage report: {0}")]
    MalformedReport(String),

    #[error("Infrastructure unavailable: {0}")]
    InfrastructureUnavailable(String),
}

impl AugmentError {
    /// Whether this error terminates the run rather than a single candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InfrastructureUnavailable(_))
    }

    /// The ledger reason recorded when a candidate is dropped for this error.
    pub fn rejection_reason(&self) -> RejectionReason {
        match self {
            Self::InvalidCandidate { reason, .. } => reason.rejection_reason(),
            Self::BuildFailed { .. } | Self::InfrastructureUnavailable(_) => {
                RejectionReason::BuildFailed
            }
            Self::TimedOut(_) => RejectionReason::TimedOut,
            Self::Flaky => RejectionReason::Flaky,
            Self::MalformedReport(_) => RejectionReason::NoCoverageGain,
        }
    }
}

/// Why a candidate was rejected before it reached a build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidCandidateReason {
    #[error("test body is empty")]
    EmptyBody,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("near-duplicate of accepted test '{0}'")]
    DuplicateOfAccepted(String),

    #[error("matches previously rejected candidate '{0}'")]
    PreviouslyRejected(String),
}

impl InvalidCandidateReason {
    /// Similarity hits are ledgered as duplicates; everything else is structural.
    pub fn rejection_reason(&self) -> RejectionReason {
        match self {
            Self::EmptyBody | Self::MissingField(_) => RejectionReason::Structural,
            Self::DuplicateOfAccepted(_) | Self::PreviouslyRejected(_) => {
                RejectionReason::Duplicate
            }
        }
    }
}

/// Errors raised by the coverage model itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoverageError {
    #[error("file '{0}' not present in coverage report")]
    MissingFile(String),

    #[error("file '{file}' lists covered line {line} that is not coverable")]
    CoveredNotCoverable { file: String, line: u32 },

    #[error("{0}")]
    Decode(String),
}

impl From<CoverageError> for AugmentError {
    fn from(err: CoverageError) -> Self {
        Self::MalformedReport(err.to_string())
    }
}
