//! Domain models for coverage-guided test augmentation.

pub mod candidate;
pub mod config;
pub mod coverage;
pub mod iteration;
pub mod run;
pub mod suite;

pub use candidate::{
    fuzzy_signature, AcceptedTest, Candidate, CandidateRequest, LedgerEntry, RejectedSummary,
    RejectionLedger, RejectionReason,
};
pub use config::{
    AugmentConfig, CandidateSourceConfig, Config, CoverageFormat, LoggingConfig, ProjectConfig,
    RetryConfig, RotationPolicy,
};
pub use coverage::{CoverageDelta, CoverageReport, FileCoverage};
pub use iteration::{ExhaustionCause, IterationState, RunOutcome, RunPhase, RunReport};
pub use run::{BuildVerdict, RunResult, RunStatus};
pub use suite::{InsertionLayout, RenderedSuite, SuiteSnapshot, TestSuite};
