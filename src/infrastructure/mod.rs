//! Infrastructure layer module
//!
//! Configuration loading and logging setup shared by the CLI and embedders.

pub mod config;
pub mod logging;
