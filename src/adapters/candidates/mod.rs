//! Candidate source adapters.

pub mod command;
pub mod file;
pub mod response;

pub use command::CommandCandidateSource;
pub use file::FileCandidateSource;
pub use response::parse_candidates;
