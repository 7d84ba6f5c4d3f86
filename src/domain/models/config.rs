use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::suite::InsertionLayout;

/// Main configuration structure for Augur
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Loop tuning: coverage target, budgets, flakiness, fuzzy matching
    #[serde(default)]
    pub augment: AugmentConfig,

    /// The project being augmented
    #[serde(default)]
    pub project: ProjectConfig,

    /// Where candidates come from
    #[serde(default)]
    pub candidates: CandidateSourceConfig,

    /// Retry policy for runner and candidate source calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Augmentation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AugmentConfig {
    /// Target covered fraction of the source file (0.0-1.0]
    #[serde(default = "default_desired_coverage")]
    pub desired_coverage: f64,

    /// Maximum number of generation rounds
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Maximum candidates requested per round
    #[serde(default = "default_max_tests_per_run")]
    pub max_tests_per_run: usize,

    /// Wall-clock bound for one runner invocation
    #[serde(default = "default_max_run_time_seconds")]
    pub max_run_time_seconds: u64,

    /// Repetitions per candidate build, to surface flaky tests
    #[serde(default = "default_run_tests_multiple_times")]
    pub run_tests_multiple_times: u32,

    /// Similarity ratio (0-100) at or above which two tests are duplicates
    #[serde(default = "default_fuzzy_lookup_threshold")]
    pub fuzzy_lookup_threshold: f64,

    /// Characters of each test body considered by the fuzzy matcher
    #[serde(default = "default_fuzzy_lookup_prefix_length")]
    pub fuzzy_lookup_prefix_length: usize,

    /// Consecutive rounds without an accepted test tolerated before stopping
    #[serde(default = "default_max_stagnant_rounds")]
    pub max_stagnant_rounds: u32,

    /// Candidate builds allowed to run concurrently within a round
    #[serde(default = "default_build_workers")]
    pub build_workers: usize,

    /// Also refuse candidates that duplicate tests already in the file at start
    #[serde(default)]
    pub dedupe_against_original_tests: bool,
}

const fn default_desired_coverage() -> f64 {
    0.9
}

const fn default_max_iterations() -> u32 {
    3
}

const fn default_max_tests_per_run() -> usize {
    4
}

const fn default_max_run_time_seconds() -> u64 {
    30
}

const fn default_run_tests_multiple_times() -> u32 {
    1
}

const fn default_fuzzy_lookup_threshold() -> f64 {
    95.0
}

const fn default_fuzzy_lookup_prefix_length() -> usize {
    1000
}

const fn default_max_stagnant_rounds() -> u32 {
    2
}

const fn default_build_workers() -> usize {
    1
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            desired_coverage: default_desired_coverage(),
            max_iterations: default_max_iterations(),
            max_tests_per_run: default_max_tests_per_run(),
            max_run_time_seconds: default_max_run_time_seconds(),
            run_tests_multiple_times: default_run_tests_multiple_times(),
            fuzzy_lookup_threshold: default_fuzzy_lookup_threshold(),
            fuzzy_lookup_prefix_length: default_fuzzy_lookup_prefix_length(),
            max_stagnant_rounds: default_max_stagnant_rounds(),
            build_workers: default_build_workers(),
            dedupe_against_original_tests: false,
        }
    }
}

/// Coverage artifact formats understood by the built-in decoders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageFormat {
    #[default]
    Lcov,
    Json,
    /// Cobertura XML, as written by pytest-cov, coverage.py and gcovr
    Cobertura,
    /// JaCoCo XML report
    Jacoco,
}

/// Project layout and toolchain invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectConfig {
    /// Project root copied into each build snapshot
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Source file under test, relative to the workspace root
    #[serde(default)]
    pub source_file: PathBuf,

    /// Test file that receives accepted tests, relative to the workspace root
    #[serde(default)]
    pub test_file: PathBuf,

    /// Shell command that runs the test suite and writes coverage
    #[serde(default)]
    pub test_command: String,

    /// Directory (relative to the workspace root) the command runs in
    #[serde(default)]
    pub command_dir: Option<PathBuf>,

    /// Coverage artifact written by the test command, relative to the workspace root
    #[serde(default = "default_coverage_report")]
    pub coverage_report: PathBuf,

    /// Format of the coverage artifact
    #[serde(default)]
    pub coverage_format: CoverageFormat,

    /// Key of the source file inside coverage reports (defaults to `source_file`)
    #[serde(default)]
    pub coverage_target: Option<String>,

    /// Where imports and tests are inserted into the test file
    #[serde(default)]
    pub insertion: InsertionLayout,

    /// Top-level entries skipped when copying the workspace
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_coverage_report() -> PathBuf {
    PathBuf::from("coverage.lcov")
}

fn default_exclude() -> Vec<String> {
    [".git", "target", "node_modules", ".augur"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            source_file: PathBuf::new(),
            test_file: PathBuf::new(),
            test_command: String::new(),
            command_dir: None,
            coverage_report: default_coverage_report(),
            coverage_format: CoverageFormat::default(),
            coverage_target: None,
            insertion: InsertionLayout::default(),
            exclude: default_exclude(),
        }
    }
}

impl ProjectConfig {
    /// The coverage report key for the source file.
    pub fn target_key(&self) -> String {
        self.coverage_target
            .clone()
            .unwrap_or_else(|| self.source_file.to_string_lossy().into_owned())
    }
}

/// Candidate source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CandidateSourceConfig {
    /// External oracle command; receives the request as JSON on stdin
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments for the oracle command
    #[serde(default)]
    pub args: Vec<String>,

    /// YAML file of pre-written candidates, served in order
    #[serde(default)]
    pub pool_file: Option<PathBuf>,

    /// Timeout for one oracle call in seconds
    #[serde(default = "default_oracle_timeout_seconds")]
    pub timeout_seconds: u64,
}

const fn default_oracle_timeout_seconds() -> u64 {
    300
}

impl Default for CandidateSourceConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            pool_file: None,
            timeout_seconds: default_oracle_timeout_seconds(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Log rotation policy for file output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file output
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
