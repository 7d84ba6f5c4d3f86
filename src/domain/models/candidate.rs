//! Candidate tests, accepted tests, and the rejection ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One proposed test unit, as returned by a candidate source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Test function name.
    pub name: String,
    /// Test source code, without surrounding indentation requirements.
    pub body: String,
    /// Source lines this test is meant to exercise.
    #[serde(default)]
    pub target_lines: BTreeSet<u32>,
    /// Import lines the test needs, newline separated.
    #[serde(default)]
    pub new_imports: String,
    /// Plain-language description of the behavior under test.
    #[serde(default)]
    pub behavior_description: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            target_lines: BTreeSet::new(),
            new_imports: String::new(),
            behavior_description: String::new(),
        }
    }

    pub fn with_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behavior_description = behavior.into();
        self
    }

    pub fn with_imports(mut self, imports: impl Into<String>) -> Self {
        self.new_imports = imports.into();
        self
    }

    pub fn with_target_lines(mut self, lines: impl IntoIterator<Item = u32>) -> Self {
        self.target_lines = lines.into_iter().collect();
        self
    }

    /// Import lines with surrounding quotes stripped.
    ///
    /// Oracles sometimes wrap the whole import block in double quotes or emit
    /// a bare `""` for "no imports".
    pub fn normalized_imports(&self) -> String {
        let trimmed = self.new_imports.trim();
        if trimmed == "\"\"" {
            return String::new();
        }
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            return trimmed.trim_matches('"').to_string();
        }
        trimmed.to_string()
    }
}

/// A candidate promoted into the persistent suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedTest {
    pub candidate: Candidate,
    /// Round in which the test was accepted.
    pub round: u32,
    /// Lines the test newly covered when it was accepted.
    pub new_lines: BTreeSet<u32>,
    pub accepted_at: DateTime<Utc>,
}

/// Why a candidate was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Empty body or missing metadata.
    Structural,
    /// Near-duplicate of an accepted test or of an earlier rejection.
    Duplicate,
    /// Non-zero exit or infrastructure failure during the build.
    BuildFailed,
    /// A repetition exceeded the per-run timeout.
    TimedOut,
    /// Repetitions disagreed on pass/fail.
    Flaky,
    /// Passed but covered nothing new (or coverage was unreadable).
    NoCoverageGain,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Duplicate => "duplicate",
            Self::BuildFailed => "build_failed",
            Self::TimedOut => "timed_out",
            Self::Flaky => "flaky",
            Self::NoCoverageGain => "no_coverage_gain",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remembered rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Whitespace-normalized prefix of the candidate body.
    pub signature: String,
    pub name: String,
    pub body: String,
    pub reason: RejectionReason,
    /// Short error excerpt from the failing run, if any.
    pub detail: String,
    pub round: u32,
    pub recorded_at: DateTime<Utc>,
}

/// What the candidate source is told about earlier failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedSummary {
    pub name: String,
    pub body: String,
    pub reason: RejectionReason,
    pub detail: String,
}

/// Record of every candidate rejected during a run.
///
/// Lives for the whole run; entries are never removed. The validator compares
/// new candidates against `entries()` to stop the oracle from re-proposing
/// known failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectionLedger {
    entries: Vec<LedgerEntry>,
    signature_prefix: usize,
}

impl RejectionLedger {
    /// Create a ledger whose signatures keep at most `signature_prefix` characters.
    pub fn new(signature_prefix: usize) -> Self {
        Self {
            entries: Vec::new(),
            signature_prefix,
        }
    }

    /// Record a rejected candidate.
    pub fn record(
        &mut self,
        candidate: &Candidate,
        reason: RejectionReason,
        detail: impl Into<String>,
        round: u32,
    ) {
        self.entries.push(LedgerEntry {
            signature: fuzzy_signature(&candidate.body, self.signature_prefix),
            name: candidate.name.clone(),
            body: candidate.body.clone(),
            reason,
            detail: detail.into(),
            round,
            recorded_at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact signature lookup, used before falling back to fuzzy matching.
    pub fn contains_signature(&self, body: &str) -> bool {
        let signature = fuzzy_signature(body, self.signature_prefix);
        self.entries.iter().any(|e| e.signature == signature)
    }

    /// Rejection counts keyed by reason.
    pub fn counts_by_reason(&self) -> BTreeMap<RejectionReason, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Summaries for the candidate source, one per distinct signature.
    ///
    /// Duplicate rejections are left out: they describe the oracle repeating
    /// itself, not a failing test worth explaining.
    pub fn summaries(&self) -> Vec<RejectedSummary> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter(|e| e.reason != RejectionReason::Duplicate)
            .filter(|e| seen.insert(e.signature.clone()))
            .map(|e| RejectedSummary {
                name: e.name.clone(),
                body: e.body.clone(),
                reason: e.reason,
                detail: e.detail.clone(),
            })
            .collect()
    }
}

/// Collapse whitespace runs and keep at most `prefix` characters.
pub fn fuzzy_signature(body: &str, prefix: usize) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(prefix)
        .collect()
}

/// Everything a candidate source is given for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRequest {
    pub round: u32,
    /// Coverage report key of the file under test.
    pub target_file: String,
    /// Source code of the file under test.
    pub source_code: String,
    /// Current contents of the test file, including accepted tests.
    pub existing_tests: String,
    pub uncovered_lines: BTreeSet<u32>,
    pub rejected: Vec<RejectedSummary>,
    pub max_candidates: usize,
}
