//! Candidate source that replays a pool of pre-written candidates.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::models::{Candidate, CandidateRequest};
use crate::domain::ports::{CandidateSource, SourceError};

use super::response::parse_candidates;

/// Serves candidates from a YAML pool in file order, `max_candidates` per round.
///
/// Once the pool is drained every round receives an empty batch.
#[derive(Debug)]
pub struct FileCandidateSource {
    path: PathBuf,
    pool: Mutex<VecDeque<Candidate>>,
}

impl FileCandidateSource {
    pub fn new(path: impl Into<PathBuf>, candidates: Vec<Candidate>) -> Self {
        Self {
            path: path.into(),
            pool: Mutex::new(candidates.into()),
        }
    }

    /// Read and parse a pool file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            SourceError::Unreachable(format!("cannot read candidate pool {}: {e}", path.display()))
        })?;
        let candidates = parse_candidates(&text)?;
        tracing::info!(
            pool = %path.display(),
            candidates = candidates.len(),
            "Loaded candidate pool"
        );
        Ok(Self::new(path, candidates))
    }

    pub async fn remaining(&self) -> usize {
        self.pool.lock().await.len()
    }
}

#[async_trait]
impl CandidateSource for FileCandidateSource {
    fn name(&self) -> &str {
        "pool"
    }

    async fn propose(&self, request: &CandidateRequest) -> Result<Vec<Candidate>, SourceError> {
        let mut pool = self.pool.lock().await;
        let take = request.max_candidates.min(pool.len());
        let batch: Vec<Candidate> = pool.drain(..take).collect();
        tracing::debug!(
            pool = %self.path.display(),
            served = batch.len(),
            remaining = pool.len(),
            "Serving candidates from pool"
        );
        Ok(batch)
    }
}
