use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Directory holding project configuration, relative to the working directory.
pub const CONFIG_DIR: &str = ".augur";

/// Prefix for environment overrides; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "AUGUR_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid desired_coverage: {0}. Must be in (0, 1]")]
    InvalidDesiredCoverage(f64),

    #[error("Invalid {0}: must be at least 1")]
    ZeroValue(&'static str),

    #[error("Invalid fuzzy_lookup_threshold: {0}. Must be between 0 and 100")]
    InvalidFuzzyThreshold(f64),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .augur/config.yaml (project config)
    /// 3. .augur/local.yaml (project local overrides, optional)
    /// 4. Environment variables (AUGUR_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Like [`ConfigLoader::load`], with `.augur/` resolved under `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let config = Self::extract(Self::project_figment(dir.as_ref()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file (plus environment overrides)
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config = Self::extract(Self::file_figment(path))
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The merged project figment, without validation.
    pub fn project_figment(dir: &Path) -> Figment {
        let config_dir = dir.join(CONFIG_DIR);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Defaults, one YAML file and the environment, without validation.
    pub fn file_figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract a [`Config`] from a figment.
    pub fn extract(figment: Figment) -> Result<Config> {
        figment
            .extract()
            .context("Failed to extract configuration from figment")
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let augment = &config.augment;

        if !(augment.desired_coverage > 0.0 && augment.desired_coverage <= 1.0) {
            return Err(ConfigError::InvalidDesiredCoverage(augment.desired_coverage));
        }

        let counts = [
            ("max_iterations", u64::from(augment.max_iterations)),
            ("max_tests_per_run", augment.max_tests_per_run as u64),
            ("max_run_time_seconds", augment.max_run_time_seconds),
            ("run_tests_multiple_times", u64::from(augment.run_tests_multiple_times)),
            ("build_workers", augment.build_workers as u64),
            ("fuzzy_lookup_prefix_length", augment.fuzzy_lookup_prefix_length as u64),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroValue(name));
        }

        if !(0.0..=100.0).contains(&augment.fuzzy_lookup_threshold) {
            return Err(ConfigError::InvalidFuzzyThreshold(augment.fuzzy_lookup_threshold));
        }

        // Validate project config
        if config.project.source_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingSetting("project.source_file"));
        }
        if config.project.test_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingSetting("project.test_file"));
        }
        if config.project.test_command.trim().is_empty() {
            return Err(ConfigError::MissingSetting("project.test_command"));
        }

        // Validate candidate source
        match (&config.candidates.command, &config.candidates.pool_file) {
            (None, None) => {
                return Err(ConfigError::MissingSetting(
                    "candidates.command or candidates.pool_file",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::ValidationFailed(
                    "candidates.command and candidates.pool_file are mutually exclusive"
                        .to_string(),
                ))
            }
            _ => {}
        }
        if config.candidates.timeout_seconds == 0 {
            return Err(ConfigError::ZeroValue("candidates.timeout_seconds"));
        }

        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        // Validate retry config
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        Ok(())
    }
}
