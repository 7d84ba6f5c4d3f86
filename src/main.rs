//! Augur CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use augur::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run(args) => {
            augur::cli::commands::run::execute(args, config_path, cli.json).await
        }
        Commands::Config(args) => augur::cli::commands::config::execute(args, config_path, cli.json)
            .await
            .map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            augur::cli::handle_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}
