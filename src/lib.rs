//! Augur - coverage-guided test augmentation
//!
//! Augur grows a test suite one candidate at a time: an oracle proposes
//! tests, each is built in an isolated snapshot, and only candidates that
//! pass reliably and cover new lines of the target file are kept.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits for
//!   external collaborators
//! - **Service Layer** (`services`): similarity, validation, build execution,
//!   acceptance and the iteration controller
//! - **Adapters** (`adapters`): shell test runner, coverage decoders,
//!   candidate sources and suite persistence
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use augur::cli::commands::run::build_controller;
//! use augur::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let report = build_controller(&config).await?.run().await;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AugmentError, CoverageError};
pub use domain::models::{
    AcceptedTest, Candidate, Config, CoverageDelta, CoverageReport, FileCoverage, RunOutcome,
    RunReport,
};
pub use domain::ports::{CandidateSource, CoverageDecoder, SuiteStore, TestRunner};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{IterationController, ShutdownHandle};
