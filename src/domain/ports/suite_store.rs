//! Persistence for the committed test suite.

use async_trait::async_trait;

use crate::domain::models::TestSuite;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read test file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write test file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Loads the suite at run start and persists it after accepting tests.
#[async_trait]
pub trait SuiteStore: Send + Sync {
    async fn load(&self) -> Result<TestSuite, StoreError>;

    async fn persist(&self, suite: &TestSuite) -> Result<(), StoreError>;
}
