//! CLI command implementations.

pub mod config;
pub mod run;

use std::path::Path;

use anyhow::Result;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Merge configuration from `path` (or the project `.augur/` directory),
/// without validating it.
pub(crate) fn load_unvalidated(path: Option<&Path>) -> Result<Config> {
    let figment = match path {
        Some(path) => ConfigLoader::file_figment(path),
        None => ConfigLoader::project_figment(Path::new(".")),
    };
    ConfigLoader::extract(figment)
}
