//! Domain layer for coverage-guided test augmentation
//!
//! Pure models, the error taxonomy, and the ports through which the loop talks
//! to its external collaborators.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AugmentError, CoverageError, InvalidCandidateReason};
