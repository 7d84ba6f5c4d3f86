//! Ports (interfaces) for the external collaborators of the loop.
//!
//! Adapters in `crate::adapters` implement these; tests implement them with
//! scripted fakes.

pub mod candidate_source;
pub mod coverage_decoder;
pub mod suite_store;
pub mod test_runner;

pub use candidate_source::{CandidateSource, SourceError};
pub use coverage_decoder::CoverageDecoder;
pub use suite_store::{StoreError, SuiteStore};
pub use test_runner::{CoverageArtifact, RunnerError, RunnerOutput, TestRunner};
