//! Implementation of the `augur run` command.

use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::candidates::{CommandCandidateSource, FileCandidateSource};
use crate::adapters::coverage::decoder_for;
use crate::adapters::runner::ShellTestRunner;
use crate::adapters::store::FileSuiteStore;
use crate::cli::display::{output, render_report, CommandOutput};
use crate::domain::models::{Config, RunReport};
use crate::domain::ports::CandidateSource;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::services::{BuildExecutor, IterationController, RetryPolicy, ShutdownHandle};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Target covered fraction of the source file, in (0, 1]
    #[arg(long)]
    pub desired_coverage: Option<f64>,

    /// Maximum number of generation rounds
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Maximum candidates requested per round
    #[arg(long)]
    pub max_tests_per_run: Option<usize>,

    /// Repetitions per candidate build (flakiness detection)
    #[arg(long)]
    pub repetitions: Option<u32>,

    /// Candidate builds run concurrently
    #[arg(long)]
    pub workers: Option<usize>,
}

impl RunArgs {
    /// Apply command-line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        let augment = &mut config.augment;
        if let Some(v) = self.desired_coverage {
            augment.desired_coverage = v;
        }
        if let Some(v) = self.max_iterations {
            augment.max_iterations = v;
        }
        if let Some(v) = self.max_tests_per_run {
            augment.max_tests_per_run = v;
        }
        if let Some(v) = self.repetitions {
            augment.run_tests_multiple_times = v;
        }
        if let Some(v) = self.workers {
            augment.build_workers = v;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub report: RunReport,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        render_report(&self.report)
    }
}

/// Wire adapters from configuration into a controller.
pub async fn build_controller(config: &Config) -> Result<IterationController> {
    let project = &config.project;
    let retry = RetryPolicy::from(&config.retry);

    let source_path = project.workspace_root.join(&project.source_file);
    let source_code = tokio::fs::read_to_string(&source_path)
        .await
        .with_context(|| format!("Failed to read source file {}", source_path.display()))?;

    let command = CommandCandidateSource::from_config(&config.candidates);
    let source: Arc<dyn CandidateSource> = match (&config.candidates.pool_file, command) {
        (Some(pool), _) => Arc::new(
            FileCandidateSource::load(pool)
                .await
                .context("Failed to load candidate pool")?,
        ),
        (None, Some(command)) => Arc::new(command.with_working_dir(&project.workspace_root)),
        (None, None) => anyhow::bail!("no candidate source configured"),
    };

    let executor = BuildExecutor::new(
        Arc::new(ShellTestRunner::from_config(project)),
        decoder_for(project.coverage_format),
        retry.clone(),
    );
    let store = FileSuiteStore::new(
        project.workspace_root.clone(),
        project.test_file.clone(),
        project.insertion.clone(),
    );

    Ok(IterationController::new(
        config.augment.clone(),
        project.target_key(),
        source,
        Arc::new(executor),
        Arc::new(store),
    )
    .with_source_code(source_code)
    .with_retry(retry))
}

/// Exit status after a second interrupt, as a shell reports SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// First interrupt stops the loop after the current round. Returns `true`
/// when a second one arrives, `false` if the signal source fails.
async fn forward_interrupts<F, Fut>(mut next_interrupt: F, shutdown: &ShutdownHandle) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    tracing::warn!("Interrupt received, finishing the current round (Ctrl-C again to abort)");
    shutdown.stop();

    if next_interrupt().await.is_err() {
        return false;
    }
    tracing::warn!("Second interrupt received, aborting");
    true
}

/// Run the loop; returns `true` unless the run ended FATAL.
pub async fn execute(args: RunArgs, config_path: Option<&Path>, json_mode: bool) -> Result<bool> {
    let mut config = super::load_unvalidated(config_path)?;
    args.apply(&mut config);
    ConfigLoader::validate(&config).context("Invalid configuration")?;

    let _logger = LoggerImpl::init(&config.logging)?;

    let controller = build_controller(&config).await?;
    let shutdown = controller.shutdown_handle();
    let ctrl_c = tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, &shutdown).await {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let report = controller.run().await;
    ctrl_c.abort();

    let ok = !report.outcome.is_fatal();
    output(&RunOutput { report }, json_mode);
    Ok(ok)
}
