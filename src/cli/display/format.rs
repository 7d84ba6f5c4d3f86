//! Small formatters for CLI output.

use chrono::{DateTime, Utc};

/// Return first 8 chars of a UUID string for display.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// A fraction in `[0, 1]` as a percentage with one decimal.
pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Elapsed wall time between two instants, e.g. `1m 05s`.
pub fn elapsed(start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
    let secs = (*end - *start).num_seconds().max(0);
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Truncate a string with unicode ellipsis, respecting char boundaries.
pub fn truncate_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}\u{2026}")
    }
}

/// Format a count with label: "1 test", "3 tests".
pub fn count_label(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}
