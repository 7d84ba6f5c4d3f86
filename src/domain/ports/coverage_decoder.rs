//! Coverage Decoder port.

use crate::domain::errors::CoverageError;
use crate::domain::models::CoverageReport;

use super::test_runner::CoverageArtifact;

/// Turns a toolchain-specific coverage artifact into a [`CoverageReport`].
///
/// Decoders must reject reports violating `covered ⊆ coverable`.
pub trait CoverageDecoder: Send + Sync {
    fn name(&self) -> &str;

    fn decode(&self, artifact: &CoverageArtifact) -> Result<CoverageReport, CoverageError>;
}
