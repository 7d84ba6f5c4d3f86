//! Suite persistence adapters.

pub mod file;

pub use file::FileSuiteStore;
