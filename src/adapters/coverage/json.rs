//! Canonical JSON coverage decoder.
//!
//! ```json
//! { "files": { "src/calc.py": { "covered": [1, 2], "coverable": [1, 2, 3] } } }
//! ```

use crate::domain::errors::CoverageError;
use crate::domain::models::CoverageReport;
use crate::domain::ports::{CoverageArtifact, CoverageDecoder};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCoverageDecoder;

impl CoverageDecoder for JsonCoverageDecoder {
    fn name(&self) -> &str {
        "json"
    }

    fn decode(&self, artifact: &CoverageArtifact) -> Result<CoverageReport, CoverageError> {
        let report: CoverageReport = serde_json::from_slice(&artifact.bytes).map_err(|e| {
            CoverageError::Decode(format!("{}: {e}", artifact.path.display()))
        })?;
        report.validate()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact(text: &str) -> CoverageArtifact {
        CoverageArtifact {
            path: PathBuf::from("coverage.json"),
            bytes: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn decodes_canonical_report() {
        let report = JsonCoverageDecoder
            .decode(&artifact(
                r#"{"files": {"src/calc.py": {"covered": [1, 2], "coverable": [1, 2, 3, 4]}}}"#,
            ))
            .unwrap();
        assert!((report.percent_covered("src/calc.py").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_covered_outside_coverable() {
        let err = JsonCoverageDecoder
            .decode(&artifact(
                r#"{"files": {"a.py": {"covered": [9], "coverable": [1]}}}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, CoverageError::CoveredNotCoverable { line: 9, .. }));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            JsonCoverageDecoder.decode(&artifact("{not json")),
            Err(CoverageError::Decode(_))
        ));
    }
}
