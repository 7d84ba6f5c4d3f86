//! LCOV tracefile decoder.
//!
//! Only line records matter here: `SF:<path>` opens a file section,
//! `DA:<line>,<hits>[,<checksum>]` marks a coverable line (covered when hits
//! is positive), and `end_of_record` closes the section. Everything else
//! (function and branch records, test names) is ignored.

use crate::domain::errors::CoverageError;
use crate::domain::models::{CoverageReport, FileCoverage};
use crate::domain::ports::{CoverageArtifact, CoverageDecoder};

#[derive(Debug, Clone, Copy, Default)]
pub struct LcovDecoder;

impl LcovDecoder {
    /// Parse LCOV text into a validated report.
    pub fn parse(text: &str) -> Result<CoverageReport, CoverageError> {
        let mut report = CoverageReport::new();
        let mut current: Option<(String, FileCoverage)> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let lineno = index + 1;

            if let Some(path) = line.strip_prefix("SF:") {
                if let Some((file, coverage)) = current.take() {
                    merge(&mut report, file, coverage);
                }
                current = Some((path.trim().to_string(), FileCoverage::default()));
            } else if let Some(record) = line.strip_prefix("DA:") {
                let Some((_, coverage)) = current.as_mut() else {
                    return Err(CoverageError::Decode(format!(
                        "line {lineno}: DA record outside of a file section"
                    )));
                };
                let mut fields = record.split(',');
                let number = parse_field(fields.next(), lineno, "line number")?;
                let hits = parse_hits(fields.next(), lineno)?;
                coverage.coverable.insert(number);
                if hits > 0 {
                    coverage.covered.insert(number);
                }
            } else if line == "end_of_record" {
                if let Some((file, coverage)) = current.take() {
                    merge(&mut report, file, coverage);
                }
            }
        }

        if let Some((file, coverage)) = current.take() {
            merge(&mut report, file, coverage);
        }
        if report.files.is_empty() {
            return Err(CoverageError::Decode("no SF records in LCOV data".to_string()));
        }

        report.validate()?;
        Ok(report)
    }
}

/// Tracefiles may repeat a file across test sections; union them.
fn merge(report: &mut CoverageReport, file: String, coverage: FileCoverage) {
    let entry = report.files.entry(file).or_default();
    entry.covered.extend(coverage.covered);
    entry.coverable.extend(coverage.coverable);
}

fn parse_field(field: Option<&str>, lineno: usize, what: &str) -> Result<u32, CoverageError> {
    let field = field.map(str::trim).unwrap_or_default();
    field
        .parse()
        .map_err(|_| CoverageError::Decode(format!("line {lineno}: invalid {what} '{field}'")))
}

/// Hit counts can exceed `u32` and some tools emit `-1` for unknown counts.
fn parse_hits(field: Option<&str>, lineno: usize) -> Result<i64, CoverageError> {
    let field = field.map(str::trim).unwrap_or_default();
    if let Ok(hits) = field.parse::<i64>() {
        return Ok(hits);
    }
    field
        .parse::<f64>()
        .map(|h| if h > 0.0 { 1 } else { 0 })
        .map_err(|_| CoverageError::Decode(format!("line {lineno}: invalid hit count '{field}'")))
}

impl CoverageDecoder for LcovDecoder {
    fn name(&self) -> &str {
        "lcov"
    }

    fn decode(&self, artifact: &CoverageArtifact) -> Result<CoverageReport, CoverageError> {
        let text = std::str::from_utf8(&artifact.bytes).map_err(|e| {
            CoverageError::Decode(format!("{} is not UTF-8: {e}", artifact.path.display()))
        })?;
        Self::parse(text)
    }
}
