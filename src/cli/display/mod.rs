//! Rendering of command results as tables or JSON.

pub mod format;
pub mod table;

use serde::Serialize;

pub use format::*;
pub use table::*;

/// A command result printable for people or for scripts.
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    /// JSON form; the serialized value unless a command needs a different shape.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Print `result` to stdout in the mode selected by `--json`.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    let rendered = if json_mode {
        serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
    } else {
        result.to_human()
    };
    println!("{rendered}");
}
