//! The persistent test suite and the snapshots built from it.
//!
//! Only the acceptance step calls [`TestSuite::commit`]; builds work on
//! [`SuiteSnapshot`]s, which own a rendered copy of the test file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;

/// Where new imports and tests are spliced into the test file.
///
/// Line numbers are 1-based "insert after" positions: `Some(0)` means the top
/// of the file. `None` for imports means the top; `None` for tests means the
/// end of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionLayout {
    #[serde(default)]
    pub imports_after_line: Option<usize>,
    #[serde(default)]
    pub tests_after_line: Option<usize>,
    /// Indentation (in spaces) of test headers in the file.
    #[serde(default)]
    pub indentation: Option<usize>,
}

/// A test file rendered with one candidate spliced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSuite {
    pub contents: String,
    pub import_lines_added: usize,
    pub test_lines_added: usize,
    tests_at: usize,
}

/// Test file contents handed to one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSnapshot {
    /// Test file path, relative to the workspace root.
    pub test_file: PathBuf,
    pub contents: String,
    /// Name of the candidate under test, or `baseline`.
    pub label: String,
}

/// The committed test suite for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuite {
    test_file: PathBuf,
    contents: String,
    original_contents: String,
    original_tests: Vec<String>,
    layout: InsertionLayout,
}

impl TestSuite {
    pub fn new(
        test_file: impl Into<PathBuf>,
        contents: impl Into<String>,
        layout: InsertionLayout,
    ) -> Self {
        let contents = contents.into();
        Self {
            test_file: test_file.into(),
            original_tests: split_units(&contents, layout.indentation.unwrap_or(0)),
            original_contents: contents.clone(),
            contents,
            layout,
        }
    }

    pub fn test_file(&self) -> &PathBuf {
        &self.test_file
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Test file contents as they were when the run started.
    pub fn original_contents(&self) -> &str {
        &self.original_contents
    }

    /// The original file cut into top-level units at test-header indentation.
    ///
    /// Each unit is one test (with its decorators) or one block of imports or
    /// helpers.
    pub fn original_tests(&self) -> &[String] {
        &self.original_tests
    }

    pub fn layout(&self) -> &InsertionLayout {
        &self.layout
    }

    /// Snapshot of the committed suite, for seeding.
    pub fn snapshot(&self) -> SuiteSnapshot {
        SuiteSnapshot {
            test_file: self.test_file.clone(),
            contents: self.contents.clone(),
            label: "baseline".to_string(),
        }
    }

    /// Snapshot of the committed suite with `candidate` spliced in.
    pub fn snapshot_with(&self, candidate: &Candidate) -> SuiteSnapshot {
        SuiteSnapshot {
            test_file: self.test_file.clone(),
            contents: self.render(candidate).contents,
            label: candidate.name.clone(),
        }
    }

    /// Splice `candidate` into a copy of the current contents.
    pub fn render(&self, candidate: &Candidate) -> RenderedSuite {
        let mut lines: Vec<String> = self.contents.split('\n').map(str::to_string).collect();

        let mut import_lines: Vec<String> = Vec::new();
        for line in candidate.normalized_imports().split('\n') {
            let stripped = line.trim();
            if stripped.is_empty() {
                continue;
            }
            let present = lines.iter().any(|l| l.trim() == stripped)
                || import_lines.iter().any(|l| l.trim() == stripped);
            if !present {
                import_lines.push(line.trim_end().to_string());
            }
        }

        let imports_at = self.layout.imports_after_line.unwrap_or(0).min(lines.len());
        let mut tests_at = self
            .layout
            .tests_after_line
            .unwrap_or(lines.len())
            .min(lines.len());

        let import_lines_added = import_lines.len();
        if import_lines_added > 0 {
            lines.splice(imports_at..imports_at, import_lines);
            if imports_at <= tests_at {
                tests_at += import_lines_added;
            }
        }

        let block = indent_block(&candidate.body, self.layout.indentation);
        let test_lines_added = block.len();
        lines.splice(tests_at..tests_at, block);

        RenderedSuite {
            contents: lines.join("\n"),
            import_lines_added,
            test_lines_added,
            tests_at,
        }
    }

    /// Make `candidate` part of the suite.
    ///
    /// The test insertion point moves past the new test, so accepted tests
    /// stay in acceptance order.
    pub fn commit(&mut self, candidate: &Candidate) -> RenderedSuite {
        let rendered = self.render(candidate);
        self.contents = rendered.contents.clone();
        if self.layout.tests_after_line.is_some() {
            self.layout.tests_after_line = Some(rendered.tests_at + rendered.test_lines_added);
        }
        rendered
    }
}

/// Split `contents` into units starting at lines indented `header_indent` or
/// less. Consecutive header-level lines (decorators, import groups) stay
/// together; lines that only close a block never start a unit.
fn split_units(contents: &str, header_indent: usize) -> Vec<String> {
    let mut units: Vec<Vec<&str>> = Vec::new();
    let mut previous_indent: Option<usize> = None;

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            previous_indent = None;
            if let Some(unit) = units.last_mut() {
                unit.push(line);
            }
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let closes_block = trimmed.chars().all(|c| "})];,".contains(c)) || trimmed == "end";
        let starts_unit = indent <= header_indent
            && !closes_block
            && previous_indent != Some(indent);

        match units.last_mut() {
            Some(unit) if !starts_unit => unit.push(line),
            _ => units.push(vec![line]),
        }
        previous_indent = (!closes_block).then_some(indent);
    }

    units
        .into_iter()
        .map(|unit| unit.join("\n").trim().to_string())
        .filter(|unit| !unit.is_empty())
        .collect()
}

/// Re-indent a test body and wrap it in blank lines.
fn indent_block(body: &str, indentation: Option<usize>) -> Vec<String> {
    let code = body.trim_end();
    let current = code
        .lines()
        .find(|l| !l.trim().is_empty())
        .map_or(0, |l| l.len() - l.trim_start().len());

    let pad = indentation
        .filter(|&needed| needed > current)
        .map(|needed| " ".repeat(needed - current))
        .unwrap_or_default();

    let mut block = vec![String::new()];
    block.extend(code.trim_matches('\n').split('\n').map(|line| {
        if line.trim().is_empty() {
            String::new()
        } else {
            format!("{pad}{line}")
        }
    }));
    block.push(String::new());
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_FILE: &str = "import pytest\nfrom calc import add\n\nclass TestCalc:\n    def test_add(self):\n        assert add(1, 2) == 3";

    fn suite(layout: InsertionLayout) -> TestSuite {
        TestSuite::new("tests/test_calc.py", TEST_FILE, layout)
    }

    #[test]
    fn render_appends_at_end_by_default() {
        let s = suite(InsertionLayout::default());
        let rendered = s.render(&Candidate::new("test_sub", "def test_sub():\n    assert True"));
        assert!(rendered.contents.ends_with("def test_sub():\n    assert True\n"));
        assert_eq!(rendered.import_lines_added, 0);
        assert_eq!(rendered.test_lines_added, 4);
    }

    #[test]
    fn render_reindents_and_inserts_new_imports_only() {
        let s = suite(InsertionLayout {
            imports_after_line: Some(2),
            tests_after_line: Some(6),
            indentation: Some(4),
        });
        let candidate = Candidate::new("test_sub", "def test_sub(self):\n    assert sub(3, 1) == 2")
            .with_imports("from calc import add\nfrom calc import sub");

        let rendered = s.render(&candidate);
        let lines: Vec<&str> = rendered.contents.split('\n').collect();

        assert_eq!(rendered.import_lines_added, 1);
        assert_eq!(lines[2], "from calc import sub");
        assert_eq!(lines[8], "    def test_sub(self):");
        assert_eq!(lines[9], "        assert sub(3, 1) == 2");
        // The original file is untouched by rendering.
        assert_eq!(s.contents(), TEST_FILE);
    }

    #[test]
    fn commit_moves_insertion_point_past_new_test() {
        let mut s = suite(InsertionLayout {
            imports_after_line: Some(2),
            tests_after_line: Some(6),
            indentation: Some(4),
        });
        s.commit(&Candidate::new("test_a", "def test_a(self):\n    pass"));
        s.commit(&Candidate::new("test_b", "def test_b(self):\n    pass"));

        let a = s.contents().find("test_a").unwrap();
        let b = s.contents().find("test_b").unwrap();
        assert!(a < b, "tests should stay in acceptance order");
        assert_eq!(s.original_contents(), TEST_FILE);
    }

    #[test]
    fn original_tests_split_at_header_indentation() {
        let s = TestSuite::new(
            "tests/test_calc.py",
            "import pytest\nfrom calc import add, sub, mul\n\n\
             def test_add():\n    assert add(1, 2) == 3\n\n\
             @pytest.mark.slow\ndef test_sub():\n    x = sub(5, 2)\n\n    assert x == 3\n\n\
             def test_mul():\n    assert mul(2, 3) == 6\n",
            InsertionLayout::default(),
        );

        let units = s.original_tests();
        assert_eq!(units.len(), 4);
        assert_eq!(units[0], "import pytest\nfrom calc import add, sub, mul");
        assert!(units[1].starts_with("def test_add():"));
        assert_eq!(
            units[2],
            "@pytest.mark.slow\ndef test_sub():\n    x = sub(5, 2)\n\n    assert x == 3"
        );
        assert!(units[3].starts_with("def test_mul():"));
    }

    #[test]
    fn original_tests_inside_a_class_use_layout_indentation() {
        let s = suite(InsertionLayout {
            indentation: Some(4),
            ..InsertionLayout::default()
        });

        let units = s.original_tests();
        assert_eq!(
            units.last().map(String::as_str),
            Some("def test_add(self):\n        assert add(1, 2) == 3")
        );
    }

    #[test]
    fn closing_braces_do_not_start_units() {
        let s = TestSuite::new(
            "calc.test.js",
            "test('adds', () => {\n  expect(add(1, 2)).toBe(3);\n});\n\
             test('subs', () => {\n  expect(sub(3, 1)).toBe(2);\n});\n",
            InsertionLayout::default(),
        );

        let units = s.original_tests();
        assert_eq!(units.len(), 2);
        assert!(units[0].ends_with("});"));
        assert!(units[1].starts_with("test('subs'"));
    }

    #[test]
    fn snapshot_with_labels_candidate() {
        let s = suite(InsertionLayout::default());
        let snap = s.snapshot_with(&Candidate::new("test_x", "def test_x(): pass"));
        assert_eq!(snap.label, "test_x");
        assert!(snap.contents.contains("def test_x(): pass"));
        assert_eq!(s.snapshot().label, "baseline");
    }
}
