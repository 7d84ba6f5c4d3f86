//! Concrete implementations of the domain ports.

pub mod candidates;
pub mod coverage;
pub mod runner;
pub mod store;
