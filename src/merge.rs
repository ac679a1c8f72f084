// Multi-page merge.
//
// Pages of one physical report usually repeat the hospital/client/patient
// block but print the inspection date only on the first page. The merge
// sweeps per-page results in source order, folds undated continuation
// pages into the preceding dated document when the identity block
// matches, and dedups tests by (code, unit) keeping the first occurrence.
//
// Merging is idempotent: merging a single already-merged document yields
// a semantically equal document.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::output::{DocumentResult, Test};

/// Counters describing one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Inputs discarded because they carried no tests.
    pub pruned_empty: usize,
    /// Total tests across merged documents before deduplication.
    pub before_dedup: usize,
    /// Total tests after deduplication.
    pub after_dedup: usize,
    /// Number of documents in the merged output.
    pub merged_len: usize,
}

fn norm_blank(v: &str) -> &str {
    v.trim()
}

fn meta_equal(a: &DocumentResult, b: &DocumentResult) -> bool {
    norm_blank(&a.hospital_name) == norm_blank(&b.hospital_name)
        && norm_blank(&a.client_name) == norm_blank(&b.client_name)
        && norm_blank(&a.patient_name) == norm_blank(&b.patient_name)
}

fn has_date(doc: &DocumentResult) -> bool {
    !doc.inspection_date.trim().is_empty()
}

fn dedup_key(test: &Test) -> (String, String) {
    (
        test.code.trim().to_string(),
        test.unit.as_deref().unwrap_or("").trim().to_string(),
    )
}

/// Dedup a document's tests by (code, unit), keeping the first occurrence.
fn dedup_tests(tests: Vec<Test>) -> Vec<Test> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    tests
        .into_iter()
        .filter(|t| seen.insert(dedup_key(t)))
        .collect()
}

/// Merge per-page extraction results in source order.
pub fn merge_documents(results: Vec<DocumentResult>) -> (Vec<DocumentResult>, MergeSummary) {
    let total = results.len();
    let mut merged: Vec<DocumentResult> = Vec::new();
    let mut pruned_empty = 0usize;

    for current in results {
        if current.is_empty_tests() {
            pruned_empty += 1;
            continue;
        }
        match merged.last_mut() {
            Some(prev) if has_date(prev) && !has_date(&current) && meta_equal(prev, &current) => {
                prev.tests.extend(current.tests);
            }
            _ => merged.push(current),
        }
    }

    let before_dedup = merged.iter().map(|d| d.tests.len()).sum();
    for doc in &mut merged {
        doc.tests = dedup_tests(std::mem::take(&mut doc.tests));
    }
    let after_dedup = merged.iter().map(|d| d.tests.len()).sum();

    let summary = MergeSummary {
        pruned_empty,
        before_dedup,
        after_dedup,
        merged_len: merged.len(),
    };
    info!(
        inputs = total,
        pruned_empty,
        merged_len = summary.merged_len,
        before_dedup,
        after_dedup,
        "merge complete"
    );
    (merged, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_of(code: &str, value: f64) -> Test {
        Test {
            code: code.to_string(),
            value: Some(value),
            unit: Some("U/L".to_string()),
            reference_min: Some(1.0),
            reference_max: Some(100.0),
        }
    }

    fn doc(date: &str, patient: &str, tests: Vec<Test>) -> DocumentResult {
        DocumentResult {
            hospital_name: "행복한 동물병원".into(),
            client_name: "홍길동".into(),
            patient_name: patient.into(),
            inspection_date: date.into(),
            tests,
        }
    }

    #[test]
    fn undated_continuation_folds_into_previous() {
        let (merged, summary) = merge_documents(vec![
            doc("2024-01-11", "나비", vec![test_of("ALT", 50.0)]),
            doc("", "나비", vec![test_of("AST", 31.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].inspection_date, "2024-01-11");
        let codes: Vec<&str> = merged[0].tests.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, ["ALT", "AST"]);
        assert_eq!(summary.merged_len, 1);
        assert_eq!(summary.before_dedup, 2);
        assert_eq!(summary.after_dedup, 2);
    }

    #[test]
    fn different_patients_stay_separate() {
        let (merged, _) = merge_documents(vec![
            doc("2024-01-11", "나비", vec![test_of("ALT", 50.0)]),
            doc("", "초코", vec![test_of("AST", 31.0)]),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn empty_test_pages_are_pruned() {
        let (merged, summary) = merge_documents(vec![
            doc("2024-01-11", "나비", vec![]),
            doc("2024-01-11", "나비", vec![test_of("ALT", 50.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(summary.pruned_empty, 1);
    }

    #[test]
    fn dedup_keeps_first_occurrence_across_pages() {
        let (merged, summary) = merge_documents(vec![
            doc("2024-01-11", "나비", vec![test_of("ALT", 50.0)]),
            doc("", "나비", vec![test_of("ALT", 55.0), test_of("AST", 31.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].tests.len(), 2);
        assert_eq!(merged[0].tests[0].value, Some(50.0));
        assert_eq!(summary.before_dedup, 3);
        assert_eq!(summary.after_dedup, 2);
    }

    #[test]
    fn merge_is_idempotent_for_a_single_document() {
        let input = doc("2024-01-11", "나비", vec![test_of("ALT", 50.0), test_of("AST", 31.0)]);
        let (once, _) = merge_documents(vec![input.clone()]);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0], input);
        let (twice, _) = merge_documents(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn tests_with_different_units_survive_dedup() {
        let mut a = test_of("RETIC", 1.2);
        let mut b = test_of("RETIC", 0.9);
        a.unit = Some("K/µL".into());
        b.unit = Some("%".into());
        let (merged, _) = merge_documents(vec![doc("2024-01-11", "나비", vec![a, b])]);
        assert_eq!(merged[0].tests.len(), 2);
    }
}
