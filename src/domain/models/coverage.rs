//! Canonical coverage reports and coverage deltas.
//!
//! A [`CoverageReport`] is produced fresh after every successful build and is
//! never mutated afterwards: accepting a candidate yields a *new* report via
//! [`CoverageReport::with_delta`], and the previous one is dropped. This keeps
//! every delta computation relative to exactly one well-defined baseline.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::errors::CoverageError;

/// Per-file line coverage.
///
/// Invariant: `covered ⊆ coverable`. Decoders enforce it on construction via
/// [`FileCoverage::validate`]; [`CoverageReport::diff`] re-checks it because a
/// corrupt upstream report must never turn into a coverage gain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Lines executed at least once.
    pub covered: BTreeSet<u32>,
    /// Lines the toolchain considers executable.
    pub coverable: BTreeSet<u32>,
}

impl FileCoverage {
    /// Build file coverage from covered and coverable lines.
    pub fn new(
        covered: impl IntoIterator<Item = u32>,
        coverable: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            covered: covered.into_iter().collect(),
            coverable: coverable.into_iter().collect(),
        }
    }

    /// Check the `covered ⊆ coverable` invariant.
    pub fn validate(&self, file: &str) -> Result<(), CoverageError> {
        match self.covered.difference(&self.coverable).next() {
            Some(&line) => Err(CoverageError::CoveredNotCoverable {
                file: file.to_string(),
                line,
            }),
            None => Ok(()),
        }
    }

    /// Coverable lines that are not covered.
    pub fn uncovered(&self) -> BTreeSet<u32> {
        self.coverable.difference(&self.covered).copied().collect()
    }

    /// `|covered| / |coverable|`, or 1.0 when nothing is coverable.
    pub fn fraction(&self) -> f64 {
        if self.coverable.is_empty() {
            return 1.0;
        }
        self.covered.len() as f64 / self.coverable.len() as f64
    }
}

/// An immutable snapshot of coverage across every file a run touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Coverage per file path, ordered by path.
    pub files: BTreeMap<String, FileCoverage>,
}

/// Lines newly covered by a candidate relative to a baseline, for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageDelta {
    /// Report key of the target file the delta was computed for.
    pub file: String,
    /// Newly covered line numbers.
    pub lines: BTreeSet<u32>,
}

impl CoverageDelta {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

impl CoverageReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a file entry.
    pub fn with_file(mut self, path: impl Into<String>, coverage: FileCoverage) -> Self {
        self.files.insert(path.into(), coverage);
        self
    }

    /// Validate every file entry.
    pub fn validate(&self) -> Result<(), CoverageError> {
        self.files
            .iter()
            .try_for_each(|(path, file)| file.validate(path))
    }

    /// Resolve a target identity to the key used in this report.
    ///
    /// Exact matches win. Otherwise a key matches when one path ends with the
    /// other at a `/` boundary, since toolchains commonly record absolute paths
    /// while configuration uses project-relative ones.
    pub fn resolve_key(&self, target: &str) -> Option<&str> {
        if let Some((key, _)) = self.files.get_key_value(target) {
            return Some(key.as_str());
        }
        let target = target.trim_start_matches("./");
        self.files
            .keys()
            .find(|key| path_suffix_match(key, target) || path_suffix_match(target, key))
            .map(String::as_str)
    }

    /// Look up the coverage entry for a target file.
    pub fn file(&self, target: &str) -> Result<&FileCoverage, CoverageError> {
        self.resolve_key(target)
            .and_then(|key| self.files.get(key))
            .ok_or_else(|| CoverageError::MissingFile(target.to_string()))
    }

    /// Lines covered in `candidate` but not in `baseline`, restricted to `target_file`.
    ///
    /// Fails when the target is absent from either report or when either entry
    /// violates `covered ⊆ coverable`. Callers treat both as a zero delta.
    pub fn diff(
        baseline: &Self,
        candidate: &Self,
        target_file: &str,
    ) -> Result<CoverageDelta, CoverageError> {
        let base = baseline.file(target_file)?;
        let cand = candidate.file(target_file)?;
        base.validate(target_file)?;
        cand.validate(target_file)?;

        Ok(CoverageDelta {
            file: target_file.to_string(),
            lines: cand.covered.difference(&base.covered).copied().collect(),
        })
    }

    /// Fraction of coverable lines covered in `target_file`, in `[0, 1]`.
    pub fn percent_covered(&self, target_file: &str) -> Result<f64, CoverageError> {
        Ok(self.file(target_file)?.fraction())
    }

    /// Uncovered lines of the target, used to steer the candidate source.
    pub fn uncovered_lines(&self, target_file: &str) -> Result<BTreeSet<u32>, CoverageError> {
        Ok(self.file(target_file)?.uncovered())
    }

    /// A new report whose target entry is the union of this report's covered
    /// lines and the delta. The delta lines also become coverable, so the
    /// invariant holds and the covered fraction never decreases.
    pub fn with_delta(&self, delta: &CoverageDelta) -> Self {
        let mut next = self.clone();
        let key = self
            .resolve_key(&delta.file)
            .map_or_else(|| delta.file.clone(), str::to_string);
        let entry = next.files.entry(key).or_default();
        entry.covered.extend(delta.lines.iter().copied());
        entry.coverable.extend(delta.lines.iter().copied());
        next
    }
}

fn path_suffix_match(long: &str, short: &str) -> bool {
    if short.is_empty() || long.len() <= short.len() {
        return false;
    }
    long.ends_with(short) && long.as_bytes()[long.len() - short.len() - 1] == b'/'
}
