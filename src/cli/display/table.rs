//! Table builder wrapper around comfy-table for consistent display.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::domain::models::{RunOutcome, RunReport};

use super::format::{count_label, elapsed, percent, short_id, truncate_ellipsis};

/// Create a standard list table with the given headers.
///
/// Uses the NOTHING preset (no borders) for a clean CLI aesthetic.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Human summary line for an outcome.
pub fn outcome_label(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Converged => "converged".to_string(),
        RunOutcome::Exhausted { cause } => {
            let cause = serde_json::to_value(cause)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            format!("exhausted ({cause})")
        }
        RunOutcome::Fatal { error } => format!("fatal: {error}"),
    }
}

/// Render a run report: summary, accepted tests and rejection counts.
pub fn render_report(report: &RunReport) -> String {
    let run_id = report.run_id.to_string();
    let mut sections = vec![format!(
        "Run {} {} after {} in {}\nCoverage: {} -> {}",
        short_id(&run_id),
        outcome_label(&report.outcome),
        count_label(report.rounds as usize, "round", "rounds"),
        elapsed(&report.started_at, &report.finished_at),
        percent(report.initial_coverage),
        percent(report.final_coverage),
    )];

    if report.accepted_tests.is_empty() {
        sections.push("No tests accepted.".to_string());
    } else {
        let mut table = list_table(&["round", "test", "new lines", "behavior"]);
        for test in &report.accepted_tests {
            table.add_row(vec![
                Cell::new(test.round),
                Cell::new(&test.candidate.name),
                Cell::new(test.new_lines.len()),
                Cell::new(truncate_ellipsis(&test.candidate.behavior_description, 60)),
            ]);
        }
        sections.push(format!(
            "{} accepted:\n{table}",
            count_label(report.accepted_tests.len(), "test", "tests")
        ));
    }

    if report.rejections.is_empty() {
        sections.push("No candidates rejected.".to_string());
    } else {
        let mut table = list_table(&["reason", "count"]);
        for (reason, count) in &report.rejections {
            table.add_row(vec![Cell::new(reason.as_str()), Cell::new(count)]);
        }
        sections.push(format!(
            "{} rejected:\n{table}",
            count_label(report.total_rejections(), "candidate", "candidates")
        ));
    }

    sections.join("\n\n")
}
