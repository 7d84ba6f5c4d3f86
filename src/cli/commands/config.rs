//! Implementation of the `augur config` command.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::display::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also validate the configuration and report the first problem
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    #[serde(skip)]
    yaml: String,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        match &self.validation_error {
            Some(error) => format!("{}\n# invalid: {error}", self.yaml.trim_end()),
            None => self.yaml.trim_end().to_string(),
        }
    }
}

pub async fn execute(args: ConfigArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = super::load_unvalidated(config_path)?;
    let validation_error = if args.validate {
        ConfigLoader::validate(&config).err().map(|e| e.to_string())
    } else {
        None
    };
    let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;

    let invalid = validation_error.is_some();
    output(
        &ConfigOutput {
            config,
            validation_error,
            yaml,
        },
        json_mode,
    );

    if invalid {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}
