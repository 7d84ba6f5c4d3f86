//! Boundary parsing of oracle responses into [`Candidate`] values.
//!
//! Oracles answer in YAML, usually shaped as
//!
//! ```yaml
//! new_tests:
//!   - test_name: test_add_negative
//!     test_behavior: adding negative numbers
//!     lines_to_cover: [12, 13]
//!     new_imports_code: "import pytest"
//!     test_code: |
//!       def test_add_negative():
//!           assert add(-1, -2) == -3
//! ```
//!
//! Responses are frequently wrapped in markdown fences or surrounded by
//! prose. Parsing tries progressively looser readings and reports
//! [`SourceError::MalformedResponse`] only when all of them fail.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::domain::models::Candidate;
use crate::domain::ports::SourceError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Bare(Vec<WireTest>),
    Wrapped(WrappedDocument),
}

#[derive(Debug, Deserialize)]
struct WrappedDocument {
    #[serde(alias = "tests", alias = "candidates")]
    new_tests: Vec<WireTest>,
}

#[derive(Debug, Deserialize)]
struct WireTest {
    #[serde(default, alias = "name")]
    test_name: Option<String>,
    #[serde(default, alias = "body", alias = "code")]
    test_code: Option<String>,
    #[serde(default, alias = "behavior_description", alias = "behavior")]
    test_behavior: Option<String>,
    #[serde(default, alias = "target_lines")]
    lines_to_cover: Option<LineSpec>,
    #[serde(default, alias = "new_imports", alias = "imports")]
    new_imports_code: Option<String>,
}

/// `lines_to_cover` arrives as a list, a single number, or a string like `"[3, 4]"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineSpec {
    List(Vec<u32>),
    Single(u32),
    Text(String),
}

impl LineSpec {
    fn into_lines(self) -> BTreeSet<u32> {
        match self {
            Self::List(lines) => lines.into_iter().collect(),
            Self::Single(line) => BTreeSet::from([line]),
            Self::Text(text) => text
                .split(|c: char| !c.is_ascii_digit())
                .filter_map(|n| n.parse().ok())
                .collect(),
        }
    }
}

impl From<WireTest> for Candidate {
    fn from(wire: WireTest) -> Self {
        Self {
            name: wire.test_name.unwrap_or_default().trim().to_string(),
            body: wire.test_code.unwrap_or_default().trim_end().to_string(),
            target_lines: wire.lines_to_cover.map(LineSpec::into_lines).unwrap_or_default(),
            new_imports: wire.new_imports_code.unwrap_or_default(),
            behavior_description: wire.test_behavior.unwrap_or_default().trim().to_string(),
        }
    }
}

/// Parse an oracle response into candidates, in response order.
///
/// Missing fields become empty strings so the validator can reject the
/// candidate with a precise reason instead of losing it here.
pub fn parse_candidates(text: &str) -> Result<Vec<Candidate>, SourceError> {
    let attempts = [
        Some(strip_outer_fence(text)),
        first_fenced_snippet(text),
        Some(strip_braces(text)),
    ];

    let mut last_error = String::from("empty response");
    for attempt in attempts.into_iter().flatten() {
        if attempt.trim().is_empty() {
            continue;
        }
        match serde_yaml::from_str::<Document>(&attempt) {
            Ok(document) => {
                let tests = match document {
                    Document::Bare(tests) => tests,
                    Document::Wrapped(doc) => doc.new_tests,
                };
                return Ok(tests.into_iter().map(Candidate::from).collect());
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    "Candidate response reading failed, trying a looser one"
                );
                last_error = e.to_string();
            }
        }
    }

    Err(SourceError::MalformedResponse(last_error))
}

fn strip_outer_fence(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```yaml")
        .or_else(|| trimmed.strip_prefix("```yml"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.trim_end_matches('`').to_string()
}

/// The body of the first ```` ``` ```` fenced block, if any.
fn first_fenced_snippet(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let rest = rest
        .strip_prefix("yaml")
        .or_else(|| rest.strip_prefix("yml"))
        .unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].to_string())
}

fn strip_braces(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('{').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('}').unwrap_or(trimmed);
    trimmed.trim_end_matches([':', '\n']).to_string()
}
