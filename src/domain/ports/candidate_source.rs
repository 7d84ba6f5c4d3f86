//! Candidate Source port.

use async_trait::async_trait;

use crate::domain::models::{Candidate, CandidateRequest};

/// Errors from a candidate source.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    /// The response could not be parsed into candidates. Never fatal: the
    /// round proceeds with an empty batch.
    #[error("Malformed candidate response: {0}")]
    MalformedResponse(String),

    /// The source could not be reached this time.
    #[error("Candidate source temporarily unavailable: {0}")]
    Transient(String),

    /// The source cannot be reached at all.
    #[error("Candidate source unreachable: {0}")]
    Unreachable(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Proposes candidate tests for one round.
///
/// Implementations parse whatever their oracle returns into strict
/// [`Candidate`] values at this boundary. Calls must be safe to retry.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn propose(&self, request: &CandidateRequest) -> Result<Vec<Candidate>, SourceError>;
}
