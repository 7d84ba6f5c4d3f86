pub mod acceptance;
pub mod build_executor;
pub mod candidate_validator;
pub mod iteration_controller;
pub mod retry;
pub mod similarity;

pub use acceptance::{AcceptanceEngine, Decision};
pub use build_executor::{BuildExecutor, TIMED_OUT_MESSAGE};
pub use candidate_validator::CandidateValidator;
pub use iteration_controller::{IterationController, ShutdownHandle};
pub use retry::{RetryPolicy, Retryable};
pub use similarity::{is_duplicate, similarity_ratio, SimilarityMatcher};
