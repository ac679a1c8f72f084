// Row normalization: role projection, reference splitting, the single
// unit/value canonicalization pass, final Test shaping, and the
// value-quality filters.
//
// Each stage consumes a row list and emits a new one; earlier fields are
// never rewritten once set, so debug output is a pure function of the
// final row.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

use crate::config::{BandAssignmentMode, Settings};
use crate::lexicon::{expected_unit, resolve_code};
use crate::lines::Line;
use crate::normalize::normalize_unit_simple;
use crate::output::{ExcludedReason, ExcludedTest, Test};
use crate::patterns;
use crate::table::bands::{assign_cells, ColumnBands};
use crate::table::header::{HeaderRoles, Role};

/// Sentinel for a cell no token landed in.
pub const UNKNOWN: &str = "UNKNOWN";

/// How a min/max cell value came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOrigin {
    /// Projected straight from a geometry band.
    GeomBanded,
    /// Produced by splitting a combined reference range.
    RefSplit,
    /// Propagated from an UNKNOWN reference cell.
    RefUnknown,
}

/// One body row flowing through normalization.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub cells: Vec<String>,
    pub line_idx: usize,

    pub name: Option<String>,
    pub result: Option<String>,
    pub unit: Option<String>,
    pub reference: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_origin: Option<CellOrigin>,
    pub max_origin: Option<CellOrigin>,

    /// OCR confidence of the result-band token that carries the value.
    pub result_token_conf: Option<f64>,

    pub unit_canonical: Option<String>,
    pub result_norm: Option<String>,
    pub min_norm: Option<String>,
    pub max_norm: Option<String>,

    /// Cells cut by the column-count truncation, right to left.
    pub dropped_tail: Vec<String>,
}

fn is_known(cell: &Option<String>) -> bool {
    cell.as_deref()
        .map(|s| !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case(UNKNOWN))
        .unwrap_or(false)
}

static LEADING_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(?:\.\d+)?").unwrap());

fn leading_number(s: &str) -> Option<String> {
    let t = patterns::norm_numeric_text(s);
    LEADING_NUM_RE.find(&t).map(|m| m.as_str().to_string())
}

/// Build rows from body lines: band-assign cells, fill empties with
/// UNKNOWN, project role cells, and pin the result token's confidence.
pub fn build_rows(
    body: &[Line],
    bands: &ColumnBands,
    roles: &HeaderRoles,
    mode: BandAssignmentMode,
) -> Vec<Row> {
    body.iter()
        .enumerate()
        .map(|(i, line)| {
            let raw_cells = assign_cells(line, bands, mode);
            let cells: Vec<String> = raw_cells
                .into_iter()
                .map(|c| if c.trim().is_empty() { UNKNOWN.to_string() } else { c })
                .collect();

            let cell_at = |role: Role| -> Option<String> {
                roles
                    .col(role)
                    .and_then(|j| cells.get(j))
                    .map(|s| s.to_string())
            };

            let mut row = Row {
                name: cell_at(Role::Name),
                result: cell_at(Role::Result),
                unit: cell_at(Role::Unit),
                reference: cell_at(Role::Reference),
                min: cell_at(Role::Min),
                max: cell_at(Role::Max),
                cells,
                line_idx: i,
                ..Row::default()
            };
            if is_known(&row.min) {
                row.min_origin = Some(CellOrigin::GeomBanded);
            }
            if is_known(&row.max) {
                row.max_origin = Some(CellOrigin::GeomBanded);
            }

            // Pin the exact token backing the result cell so the final
            // confidence filter can use its OCR confidence.
            if is_known(&row.result) {
                if let Some(res_col) = roles.col(Role::Result) {
                    if res_col < bands.k() {
                        let (l, r) = bands.band(res_col);
                        let target = row.result.as_deref().and_then(leading_number);
                        let mut best: Option<f64> = None;
                        for tok in line {
                            let c = tok.x_center();
                            if c < l || c >= r {
                                continue;
                            }
                            let Some(num) = leading_number(&tok.text) else {
                                continue;
                            };
                            let Some(conf) = tok.confidence else { continue };
                            if target.as_deref() == Some(num.as_str()) {
                                best = Some(conf);
                                break;
                            }
                            if best.map(|b| conf > b).unwrap_or(true) {
                                best = Some(conf);
                            }
                        }
                        row.result_token_conf = best;
                    }
                }
            }
            row
        })
        .collect()
}

/// Cut rows that carry more cells than the header defines, recording the
/// dropped tail for debugging.
pub fn truncate_to_columns(rows: Vec<Row>, k: usize) -> Vec<Row> {
    if k == 0 {
        return rows;
    }
    rows.into_iter()
        .map(|mut row| {
            if row.cells.len() > k {
                row.dropped_tail = row.cells.split_off(k);
            }
            row
        })
        .collect()
}

/// Split combined reference ranges into min/max. Existing min/max values
/// win; UNKNOWN references propagate UNKNOWN.
pub fn split_reference_ranges(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|mut row| {
            if is_known(&row.min) && is_known(&row.max) {
                return row;
            }
            let Some(reference) = row.reference.clone() else {
                return row;
            };
            let ref_trim = reference.trim();
            if ref_trim.is_empty() {
                return row;
            }
            if ref_trim.eq_ignore_ascii_case(UNKNOWN) {
                if !is_known(&row.min) {
                    row.min = Some(UNKNOWN.to_string());
                    row.min_origin = Some(CellOrigin::RefUnknown);
                }
                if !is_known(&row.max) {
                    row.max = Some(UNKNOWN.to_string());
                    row.max_origin = Some(CellOrigin::RefUnknown);
                }
                return row;
            }
            if let Some((lo, hi)) = patterns::split_range(ref_trim) {
                if row.min.is_none() || !is_known(&row.min) {
                    row.min = Some(lo);
                    row.min_origin = Some(CellOrigin::RefSplit);
                }
                if row.max.is_none() || !is_known(&row.max) {
                    row.max = Some(hi);
                    row.max_origin = Some(CellOrigin::RefSplit);
                }
            }
            row
        })
        .collect()
}

/// The single unit/value canonicalization pass: canonical unit alongside
/// the raw one, plus plain numeric strings for result/min/max.
pub fn normalize_units_and_values(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|mut row| {
            if is_known(&row.unit) {
                row.unit_canonical = row.unit.as_deref().and_then(normalize_unit_simple);
            }
            row.result_norm = row.result.as_deref().and_then(patterns::normalize_number);
            row.min_norm = row.min.as_deref().and_then(patterns::normalize_number);
            row.max_norm = row.max.as_deref().and_then(patterns::normalize_number);
            row
        })
        .collect()
}

/// A shaped Test before the final quality filters.
#[derive(Debug, Clone)]
pub struct TestCandidate {
    pub test: Test,
    /// Exact result-token OCR confidence, when one was pinned.
    pub value_conf: Option<f64>,
    /// Whether the unit agrees with the reference table's expectation.
    pub unit_matches_expected: Option<bool>,
}

fn parse_f64(s: &Option<String>) -> Option<f64> {
    s.as_deref()?.replace(',', ".").parse().ok()
}

/// Shape normalized rows into Test candidates.
pub fn shape_tests(rows: &[Row]) -> Vec<TestCandidate> {
    rows.iter()
        .filter_map(|row| {
            let name = row.name.as_deref()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let code = resolve_code(&name).map(str::to_string).unwrap_or(name);

            let unit_raw = row.unit.as_deref().filter(|u| {
                let t = u.trim();
                !t.is_empty() && !t.eq_ignore_ascii_case(UNKNOWN)
            });
            let unit = row
                .unit_canonical
                .clone()
                .or_else(|| unit_raw.map(str::to_string));

            let unit_matches_expected = expected_unit(&code).map(|exp| {
                let exp_canon = normalize_unit_simple(exp).unwrap_or_else(|| exp.to_string());
                unit.as_deref() == Some(exp_canon.as_str())
            });

            let mut reference_min = parse_f64(&row.min_norm);
            let mut reference_max = parse_f64(&row.max_norm);
            // An OCR-swapped range must still satisfy min <= max.
            if let (Some(lo), Some(hi)) = (reference_min, reference_max) {
                if lo > hi {
                    (reference_min, reference_max) = (Some(hi), Some(lo));
                }
            }

            Some(TestCandidate {
                test: Test {
                    code,
                    value: parse_f64(&row.result_norm),
                    unit,
                    reference_min,
                    reference_max,
                },
                value_conf: row.result_token_conf,
                unit_matches_expected,
            })
        })
        .collect()
}

/// Outcome of the final filters.
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub removed_unknown: usize,
    pub removed_low_conf: usize,
    pub dedup_removed: usize,
    pub conf_threshold: f64,
    pub excluded: Vec<ExcludedTest>,
}

/// Apply the final quality filters: drop null values, drop low-confidence
/// values, and keep only the last occurrence per (code, unit).
pub fn apply_final_filters(
    candidates: Vec<TestCandidate>,
    roles: &HeaderRoles,
    settings: &Settings,
) -> (Vec<Test>, FilterStats) {
    let threshold = settings.value_conf_threshold;
    let mut stats = FilterStats {
        conf_threshold: threshold,
        ..FilterStats::default()
    };

    let header_result_conf = roles
        .get(Role::Result)
        .map(|info| info.confidence)
        .unwrap_or(0.5);

    let mut survivors: Vec<(Test, f64)> = Vec::new();
    for cand in candidates {
        if cand.test.value.is_none() {
            stats.removed_unknown += 1;
            stats.excluded.push(ExcludedTest {
                test: cand.test,
                reasons: vec![ExcludedReason::UnknownValue],
                value_conf: None,
            });
            continue;
        }
        let conf = cand
            .value_conf
            .unwrap_or(header_result_conf)
            .clamp(0.0, 1.0);
        if conf < threshold {
            stats.removed_low_conf += 1;
            stats.excluded.push(ExcludedTest {
                test: cand.test,
                reasons: vec![ExcludedReason::LowConfidence],
                value_conf: Some(conf),
            });
            continue;
        }
        survivors.push((cand.test, conf));
    }

    // Keep-last per (code, unit): later rows supersede earlier ones.
    let mut last_index: HashMap<(String, Option<String>), usize> = HashMap::new();
    for (idx, (test, _)) in survivors.iter().enumerate() {
        let key = (
            test.code.trim().to_string(),
            test.unit.as_deref().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        );
        last_index.insert(key, idx);
    }

    let mut kept: Vec<Test> = Vec::new();
    for (idx, (test, conf)) in survivors.into_iter().enumerate() {
        let key = (
            test.code.trim().to_string(),
            test.unit.as_deref().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        );
        if last_index.get(&key) != Some(&idx) {
            stats.dedup_removed += 1;
            stats.excluded.push(ExcludedTest {
                test,
                reasons: vec![ExcludedReason::DuplicateCodeKeptLast],
                value_conf: Some(conf),
            });
            continue;
        }
        kept.push(test);
    }

    debug!(
        kept = kept.len(),
        removed_unknown = stats.removed_unknown,
        removed_low_conf = stats.removed_low_conf,
        dedup_removed = stats.dedup_removed,
        "final filters"
    );
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::header::{RoleInfo, RoleSource};

    fn four_col_roles() -> HeaderRoles {
        let mk = |role, col| RoleInfo {
            role,
            col_index: col,
            confidence: 1.0,
            source: RoleSource::Ocr,
            meets_threshold: true,
            forced: false,
            label: None,
        };
        HeaderRoles::sanitize(vec![
            mk(Role::Name, 0),
            mk(Role::Result, 1),
            mk(Role::Unit, 2),
            mk(Role::Reference, 3),
        ])
    }

    fn row_with(reference: Option<&str>, min: Option<&str>, max: Option<&str>) -> Row {
        Row {
            reference: reference.map(str::to_string),
            min: min.map(str::to_string),
            max: max.map(str::to_string),
            min_origin: min.map(|_| CellOrigin::GeomBanded),
            max_origin: max.map(|_| CellOrigin::GeomBanded),
            ..Row::default()
        }
    }

    #[test]
    fn reference_splits_into_min_max() {
        let rows = split_reference_ranges(vec![row_with(Some("6.54 - 12.2"), None, None)]);
        assert_eq!(rows[0].min.as_deref(), Some("6.54"));
        assert_eq!(rows[0].max.as_deref(), Some("12.2"));
        assert_eq!(rows[0].min_origin, Some(CellOrigin::RefSplit));
    }

    #[test]
    fn unknown_reference_propagates() {
        let rows = split_reference_ranges(vec![row_with(Some("UNKNOWN"), None, None)]);
        assert_eq!(rows[0].min.as_deref(), Some(UNKNOWN));
        assert_eq!(rows[0].max.as_deref(), Some(UNKNOWN));
        assert_eq!(rows[0].max_origin, Some(CellOrigin::RefUnknown));
    }

    #[test]
    fn existing_min_max_win_over_reference() {
        let rows = split_reference_ranges(vec![row_with(Some("1-2"), Some("5.5"), Some("10.0"))]);
        assert_eq!(rows[0].min.as_deref(), Some("5.5"));
        assert_eq!(rows[0].max.as_deref(), Some("10.0"));
        assert_eq!(rows[0].min_origin, Some(CellOrigin::GeomBanded));
    }

    #[test]
    fn unparseable_reference_is_left_alone() {
        let rows = split_reference_ranges(vec![row_with(Some("see note"), None, None)]);
        assert!(rows[0].min.is_none());
        assert!(rows[0].max.is_none());
        assert_eq!(rows[0].reference.as_deref(), Some("see note"));
    }

    #[test]
    fn normalization_fills_canonical_and_numeric_fields() {
        let mut row = row_with(None, Some("5,5"), Some("19.5"));
        row.unit = Some("k/ul".to_string());
        row.result = Some("8.5H".to_string());
        let rows = normalize_units_and_values(vec![row]);
        assert_eq!(rows[0].unit_canonical.as_deref(), Some("K/µL"));
        assert_eq!(rows[0].result_norm.as_deref(), Some("8.5"));
        assert_eq!(rows[0].min_norm.as_deref(), Some("5.5"));
        assert_eq!(rows[0].max_norm.as_deref(), Some("19.5"));
    }

    #[test]
    fn truncation_records_dropped_cells() {
        let mut row = Row::default();
        row.cells = vec!["a".into(), "b".into(), "c".into(), "d".into(), "junk".into()];
        let rows = truncate_to_columns(vec![row], 4);
        assert_eq!(rows[0].cells.len(), 4);
        assert_eq!(rows[0].dropped_tail, vec!["junk".to_string()]);
    }

    #[test]
    fn unknown_value_rows_are_filtered() {
        let mut row = Row::default();
        row.name = Some("WBC".into());
        row.result = Some(UNKNOWN.into());
        let rows = normalize_units_and_values(vec![row]);
        let cands = shape_tests(&rows);
        let (tests, stats) = apply_final_filters(cands, &four_col_roles(), &Settings::default());
        assert!(tests.is_empty());
        assert_eq!(stats.removed_unknown, 1);
        assert_eq!(
            stats.excluded[0].reasons,
            vec![ExcludedReason::UnknownValue]
        );
    }

    #[test]
    fn low_confidence_rows_are_filtered() {
        let mut row = Row::default();
        row.name = Some("WBC".into());
        row.result = Some("8.5".into());
        row.result_token_conf = Some(0.90);
        let rows = normalize_units_and_values(vec![row]);
        let cands = shape_tests(&rows);
        let (tests, stats) = apply_final_filters(cands, &four_col_roles(), &Settings::default());
        assert!(tests.is_empty());
        assert_eq!(stats.removed_low_conf, 1);
        assert_eq!(stats.excluded[0].value_conf, Some(0.90));
    }

    #[test]
    fn duplicates_keep_the_last_occurrence() {
        let mk = |value: f64| {
            let mut row = Row::default();
            row.name = Some("ALT".into());
            row.unit = Some("U/L".into());
            row.result = Some(value.to_string());
            row.result_token_conf = Some(0.99);
            row
        };
        let rows = normalize_units_and_values(vec![mk(50.0), mk(55.0)]);
        let cands = shape_tests(&rows);
        let (tests, stats) = apply_final_filters(cands, &four_col_roles(), &Settings::default());
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].value, Some(55.0));
        assert_eq!(stats.dedup_removed, 1);
    }

    #[test]
    fn different_units_are_different_measurements() {
        let mk = |unit: &str| {
            let mut row = Row::default();
            row.name = Some("RETIC".into());
            row.unit = Some(unit.to_string());
            row.result = Some("1.2".into());
            row.result_token_conf = Some(0.99);
            row
        };
        let rows = normalize_units_and_values(vec![mk("K/µL"), mk("%")]);
        let cands = shape_tests(&rows);
        let (tests, _) = apply_final_filters(cands, &four_col_roles(), &Settings::default());
        assert_eq!(tests.len(), 2);
    }

    #[test]
    fn expected_unit_comparison_is_canonical() {
        let mut row = Row::default();
        row.name = Some("WBC".into());
        row.unit = Some("10^3/uL".into());
        row.result = Some("8.5".into());
        let rows = normalize_units_and_values(vec![row]);
        let cands = shape_tests(&rows);
        assert_eq!(cands[0].test.unit.as_deref(), Some("K/µL"));
        assert_eq!(cands[0].unit_matches_expected, Some(true));
    }
}
