//! Command-line front-end.

pub mod commands;
pub mod display;
pub mod types;

pub use types::{Cli, Commands};

/// Print a top-level error in the selected output mode.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let value = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
}
