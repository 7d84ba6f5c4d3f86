//! Fuzzy equality between candidate test bodies.
//!
//! Scores follow the token-sort ratio: both strings are lowercased,
//! non-alphanumeric characters become separators, tokens are sorted and
//! re-joined, and the result is compared with a longest-common-subsequence
//! ratio on a 0-100 scale. Sorting tokens makes reordered assertions score as
//! the same test.

/// Duplicate detector with a configurable threshold and prefix bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatcher {
    threshold: f64,
    prefix_len: usize,
}

impl SimilarityMatcher {
    /// `threshold` is on the 0-100 scale; only the first `prefix_len`
    /// characters of each input are compared.
    pub fn new(threshold: f64, prefix_len: usize) -> Self {
        Self {
            threshold,
            prefix_len,
        }
    }

    pub fn is_duplicate(&self, a: &str, b: &str) -> bool {
        is_duplicate(a, b, self.threshold, self.prefix_len)
    }

    /// First `(label, body)` pair whose body duplicates `body`, by label.
    pub fn find_duplicate<'a, I>(&self, body: &str, existing: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        existing
            .into_iter()
            .find(|(_, other)| self.is_duplicate(body, other))
            .map(|(label, _)| label)
    }
}

/// `true` when the similarity of `a` and `b` reaches `threshold`.
pub fn is_duplicate(a: &str, b: &str, threshold: f64, prefix_len: usize) -> bool {
    similarity_ratio(a, b, prefix_len) >= threshold
}

/// Token-sort LCS ratio over the first `prefix_len` characters of each input.
pub fn similarity_ratio(a: &str, b: &str, prefix_len: usize) -> f64 {
    let a = token_sort(&truncate(a, prefix_len));
    let b = token_sort(&truncate(b, prefix_len));
    if a == b {
        return 100.0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    100.0 * 2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn truncate(s: &str, prefix_len: usize) -> String {
    s.chars().take(prefix_len).collect()
}

fn token_sort(s: &str) -> String {
    let lowered: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Length of the longest common subsequence, two-row dynamic programming.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_always_duplicates() {
        for s in ["", "   ", "def test_a(): assert f(1) == 2", "!!!"] {
            assert!((similarity_ratio(s, s, 100) - 100.0).abs() < f64::EPSILON);
            assert!(is_duplicate(s, s, 100.0, 100));
        }
    }

    #[test]
    fn reordered_tokens_match() {
        let a = "below 100 find all prime numbers";
        let b = "Find all prime numbers below 100";
        assert!(is_duplicate(a, b, 99.0, 1000));
    }

    #[test]
    fn unrelated_bodies_score_low() {
        let a = "def test_parse_empty():\n    assert parse('') is None";
        let b = "def test_render_table():\n    table = render(rows)\n    assert len(table) == 3";
        let ratio = similarity_ratio(a, b, 1000);
        assert!(ratio < 80.0, "ratio was {ratio}");
    }

    #[test]
    fn prefix_bounds_comparison() {
        let a = "assert add(1, 2) == 3  # then something long and different";
        let b = "assert add(1, 2) == 3  # with a tail nobody compares";
        assert!(is_duplicate(a, b, 100.0, 21));
        assert!(!is_duplicate(a, b, 100.0, 1000));
    }

    #[test]
    fn lcs_basics() {
        let a: Vec<char> = "abcde".chars().collect();
        let b: Vec<char> = "ace".chars().collect();
        assert_eq!(lcs_len(&a, &b), 3);
        assert_eq!(lcs_len(&a, &[]), 0);
    }

    #[test]
    fn matcher_finds_first_duplicate_label() {
        let matcher = SimilarityMatcher::new(90.0, 500);
        let existing = [
            ("test_other", "assert render(rows) == expected"),
            ("test_add", "assert add(1, 2) == 3"),
        ];
        let pairs = || existing.iter().map(|(n, b)| (*n, *b));
        let found = matcher.find_duplicate("assert add(1,2)==3", pairs());
        assert_eq!(found, Some("test_add"));
        assert_eq!(matcher.find_duplicate("x = 1", pairs()), None);
    }
}
