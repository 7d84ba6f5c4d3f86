//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::config::ConfigArgs;
use super::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "augur")]
#[command(about = "Augur - coverage-guided test augmentation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .augur/config.yaml + .augur/local.yaml)
    #[arg(short, long, global = true, env = "AUGUR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the augmentation loop against the configured project
    Run(RunArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "augur",
            "--json",
            "run",
            "--desired-coverage",
            "0.8",
            "--max-iterations",
            "5",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.desired_coverage, Some(0.8));
                assert_eq!(args.max_iterations, Some(5));
                assert_eq!(args.repetitions, None);
            }
            Commands::Config(_) => panic!("expected run"),
        }
    }

    #[test]
    fn parses_config_with_global_path() {
        let cli =
            Cli::try_parse_from(["augur", "config", "--config", "augur.yaml", "--validate"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("augur.yaml")));
        assert!(matches!(cli.command, Commands::Config(ConfigArgs { validate: true })));
    }
}
