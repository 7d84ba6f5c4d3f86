//! Property-based tests for the coverage model and similarity matcher.

use std::collections::BTreeSet;

use augur::domain::models::{CoverageReport, FileCoverage};
use augur::services::{is_duplicate, similarity_ratio};
use proptest::prelude::*;

const TARGET: &str = "src/lib.rs";

/// A valid report: covered drawn from coverable.
fn report_strategy() -> impl Strategy<Value = CoverageReport> {
    prop::collection::btree_set(1u32..200, 0..60).prop_flat_map(|coverable| {
        let lines: Vec<u32> = coverable.iter().copied().collect();
        prop::sample::subsequence(lines.clone(), 0..=lines.len()).prop_map(move |covered| {
            CoverageReport::new().with_file(TARGET, FileCoverage::new(covered, coverable.clone()))
        })
    })
}

proptest! {
    #[test]
    fn report_has_no_delta_against_itself(report in report_strategy()) {
        let delta = CoverageReport::diff(&report, &report, TARGET).unwrap();
        prop_assert!(delta.is_empty());
    }

    #[test]
    fn delta_lines_are_new_and_coverable(base in report_strategy(), cand in report_strategy()) {
        if let Ok(delta) = CoverageReport::diff(&base, &cand, TARGET) {
            let base_covered = &base.files[TARGET].covered;
            let cand_coverable = &cand.files[TARGET].coverable;
            prop_assert!(delta.lines.iter().all(|l| !base_covered.contains(l)));
            prop_assert!(delta.lines.iter().all(|l| cand_coverable.contains(l)));
        }
    }

    #[test]
    fn applying_a_delta_never_lowers_coverage(
        base in report_strategy(),
        cand in report_strategy(),
    ) {
        let delta = CoverageReport::diff(&base, &cand, TARGET).unwrap();
        let before = base.percent_covered(TARGET).unwrap();
        let next = base.with_delta(&delta);
        let after = next.percent_covered(TARGET).unwrap();

        prop_assert!(after + 1e-12 >= before);
        prop_assert!(next.validate().is_ok());
        let covered: BTreeSet<u32> = next.files[TARGET].covered.clone();
        prop_assert!(covered.is_superset(&base.files[TARGET].covered));
        prop_assert!(CoverageReport::diff(&next, &cand, TARGET).unwrap().is_empty());
    }

    #[test]
    fn a_test_body_duplicates_itself(body in "[a-z_(){}=: ]{1,120}") {
        prop_assert!(is_duplicate(&body, &body, 95.0, 1000));
    }

    #[test]
    fn similarity_ratio_is_bounded_and_symmetric(a in "[a-z ]{0,60}", b in "[a-z ]{0,60}") {
        let ab = similarity_ratio(&a, &b, 1000);
        let ba = similarity_ratio(&b, &a, 1000);
        prop_assert!((0.0..=100.0).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-9);
    }
}
