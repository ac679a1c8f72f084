// Output contract types and the post-extraction validation pass.
//
// These are the shapes that cross the crate boundary; they stay free of
// pipeline machinery so callers can depend on them alone.

pub mod terminal;

use serde::{Deserialize, Serialize};

/// One extracted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub code: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
}

/// The stable per-document output shape. Meta fields are empty strings
/// when unknown, never null; `tests` is empty when nothing survived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    #[serde(default)]
    pub hospital_name: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub inspection_date: String,
    #[serde(default)]
    pub tests: Vec<Test>,
}

impl DocumentResult {
    pub fn is_empty_tests(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Why a row or test was excluded from the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcludedReason {
    UnknownValue,
    LowConfidence,
    DuplicateCodeKeptLast,
    MissingCode,
    MissingReference,
    InvalidUnit,
}

/// A rejected test together with its reasons (debug channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedTest {
    pub test: Test,
    pub reasons: Vec<ExcludedReason>,
    pub value_conf: Option<f64>,
}

/// Accepted/rejected counts for a validation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Result of validating a document's tests for strict consumers.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub accepted: Vec<Test>,
    pub rejected: Vec<ExcludedTest>,
}

impl ValidationResult {
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            total: self.accepted.len() + self.rejected.len(),
            accepted: self.accepted.len(),
            rejected: self.rejected.len(),
        }
    }
}

fn is_valid_unit(unit: Option<&str>) -> bool {
    match unit {
        None => false,
        Some(u) => {
            let t = u.trim();
            !t.is_empty() && !t.eq_ignore_ascii_case("unknown")
        }
    }
}

/// Partition tests into accepted and rejected for callers that require
/// complete rows (code + value + unit + both reference bounds).
///
/// This is stricter than the in-pipeline filters and is never applied
/// inside extraction itself.
pub fn validate_tests(tests: &[Test]) -> ValidationResult {
    let mut out = ValidationResult::default();
    for test in tests {
        let mut reasons: Vec<ExcludedReason> = Vec::new();
        if test.code.trim().is_empty() {
            reasons.push(ExcludedReason::MissingCode);
        }
        if test.value.is_none() {
            reasons.push(ExcludedReason::UnknownValue);
        }
        if !is_valid_unit(test.unit.as_deref()) {
            reasons.push(ExcludedReason::InvalidUnit);
        }
        if test.reference_min.is_none() || test.reference_max.is_none() {
            reasons.push(ExcludedReason::MissingReference);
        }
        if reasons.is_empty() {
            out.accepted.push(test.clone());
        } else {
            out.rejected.push(ExcludedTest {
                test: test.clone(),
                reasons,
                value_conf: None,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_row(code: &str, value: Option<f64>, unit: Option<&str>) -> Test {
        Test {
            code: code.to_string(),
            value,
            unit: unit.map(str::to_string),
            reference_min: Some(1.0),
            reference_max: Some(2.0),
        }
    }

    #[test]
    fn complete_tests_are_accepted() {
        let result = validate_tests(&[test_row("WBC", Some(8.5), Some("K/µL"))]);
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.summary().rejected, 0);
    }

    #[test]
    fn incomplete_tests_carry_reasons() {
        let mut t = test_row("ALT", None, None);
        t.reference_max = None;
        let result = validate_tests(&[t]);
        assert_eq!(result.accepted.len(), 0);
        let reasons = &result.rejected[0].reasons;
        assert!(reasons.contains(&ExcludedReason::UnknownValue));
        assert!(reasons.contains(&ExcludedReason::InvalidUnit));
        assert!(reasons.contains(&ExcludedReason::MissingReference));
    }

    #[test]
    fn document_json_shape_is_stable() {
        let doc = DocumentResult {
            hospital_name: String::new(),
            client_name: String::new(),
            patient_name: "나비".to_string(),
            inspection_date: "2024-01-11".to_string(),
            tests: vec![test_row("WBC", Some(8.5), Some("K/µL"))],
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["hospital_name"], "");
        assert_eq!(json["patient_name"], "나비");
        assert_eq!(json["tests"][0]["code"], "WBC");
        assert_eq!(json["tests"][0]["reference_min"], 1.0);
    }
}
