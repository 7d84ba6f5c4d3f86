//! Test file persistence on the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::models::{InsertionLayout, TestSuite};
use crate::domain::ports::{StoreError, SuiteStore};

/// Reads the test file at run start and rewrites it atomically after rounds
/// that accepted tests.
#[derive(Debug, Clone)]
pub struct FileSuiteStore {
    workspace_root: PathBuf,
    test_file: PathBuf,
    layout: InsertionLayout,
}

impl FileSuiteStore {
    /// `test_file` is relative to `workspace_root` (absolute paths are used as-is).
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        test_file: impl Into<PathBuf>,
        layout: InsertionLayout,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            test_file: test_file.into(),
            layout,
        }
    }

    /// Absolute location of the test file.
    pub fn path(&self) -> PathBuf {
        self.workspace_root.join(&self.test_file)
    }
}

#[async_trait]
impl SuiteStore for FileSuiteStore {
    async fn load(&self) -> Result<TestSuite, StoreError> {
        let path = self.path();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Ok(TestSuite::new(
            self.test_file.clone(),
            contents,
            self.layout.clone(),
        ))
    }

    async fn persist(&self, suite: &TestSuite) -> Result<(), StoreError> {
        let path = self.path();
        write_atomic(&path, suite.contents())
            .await
            .map_err(|source| StoreError::Write {
                path: path.display().to_string(),
                source,
            })?;
        tracing::info!(test_file = %path.display(), "Persisted test suite");
        Ok(())
    }
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.augur-tmp"));
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
