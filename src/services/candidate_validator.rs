//! Pre-build sanity checks for candidate tests.
//!
//! Anything rejected here never consumes a build slot. Similarity checks run
//! against accepted tests first, then against the rejection ledger, so a
//! candidate that re-proposes an already-accepted test is reported as such.

use crate::domain::errors::{AugmentError, InvalidCandidateReason};
use crate::domain::models::{AcceptedTest, Candidate, RejectionLedger};

use super::similarity::SimilarityMatcher;

/// Structural validator for candidates.
#[derive(Debug, Clone)]
pub struct CandidateValidator {
    matcher: SimilarityMatcher,
}

impl CandidateValidator {
    pub fn new(matcher: SimilarityMatcher) -> Self {
        Self { matcher }
    }

    /// Check one candidate against the accepted set and the ledger.
    pub fn validate(
        &self,
        candidate: &Candidate,
        accepted: &[AcceptedTest],
        ledger: &RejectionLedger,
    ) -> Result<(), AugmentError> {
        self.check(candidate, accepted, ledger)
            .map_err(|reason| AugmentError::InvalidCandidate {
                name: candidate.name.clone(),
                reason,
            })
    }

    fn check(
        &self,
        candidate: &Candidate,
        accepted: &[AcceptedTest],
        ledger: &RejectionLedger,
    ) -> Result<(), InvalidCandidateReason> {
        if candidate.body.trim().is_empty() {
            return Err(InvalidCandidateReason::EmptyBody);
        }
        if candidate.name.trim().is_empty() {
            return Err(InvalidCandidateReason::MissingField("name"));
        }
        if candidate.behavior_description.trim().is_empty() {
            return Err(InvalidCandidateReason::MissingField("behavior_description"));
        }

        let accepted_bodies = accepted
            .iter()
            .map(|t| (t.candidate.name.as_str(), t.candidate.body.as_str()));
        if let Some(name) = self.matcher.find_duplicate(&candidate.body, accepted_bodies) {
            return Err(InvalidCandidateReason::DuplicateOfAccepted(name.to_string()));
        }

        if ledger.contains_signature(&candidate.body) {
            return Err(InvalidCandidateReason::PreviouslyRejected(
                candidate.name.clone(),
            ));
        }
        let rejected_bodies = ledger
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.body.as_str()));
        if let Some(name) = self.matcher.find_duplicate(&candidate.body, rejected_bodies) {
            return Err(InvalidCandidateReason::PreviouslyRejected(name.to_string()));
        }

        Ok(())
    }
}
