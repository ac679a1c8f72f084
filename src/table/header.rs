// Header role inference.
//
// Three strategies, in a cascade:
//   1. OCR path — find a labeled header line above the body by synonym and
//      regex hits, then gate it on how well the body actually matches.
//   2. Rule path — no usable header: infer roles from the type statistics
//      of a representative sample of body rows.
//   3. External fallback — optional capability invoked by the extractor
//      when the rule path fails the policy check.
//
// Whatever the source, roles are carried in a validated `HeaderRoles`:
// one column per role, reference and min/max mutually exclusive.

use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

use crate::config::Settings;
use crate::lexicon::resolve_code;
use crate::lines::Line;
use crate::patterns::{self, CellKind};

/// Semantic function of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Name,
    Result,
    Unit,
    Reference,
    Min,
    Max,
    Date,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Name,
        Role::Result,
        Role::Unit,
        Role::Reference,
        Role::Min,
        Role::Max,
        Role::Date,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Name => "name",
            Role::Result => "result",
            Role::Unit => "unit",
            Role::Reference => "reference",
            Role::Min => "min",
            Role::Max => "max",
            Role::Date => "date",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Some(Role::Name),
            "result" => Some(Role::Result),
            "unit" => Some(Role::Unit),
            "reference" => Some(Role::Reference),
            "min" => Some(Role::Min),
            "max" => Some(Role::Max),
            "date" => Some(Role::Date),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a role assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    Ocr,
    Inferred,
    Llm,
}

impl RoleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleSource::Ocr => "ocr",
            RoleSource::Inferred => "inferred",
            RoleSource::Llm => "llm",
        }
    }
}

/// One column-role assignment.
#[derive(Debug, Clone)]
pub struct RoleInfo {
    pub role: Role,
    pub col_index: usize,
    pub confidence: f64,
    pub source: RoleSource,
    pub meets_threshold: bool,
    /// Set when the role was force-assigned by the neighbor fallback.
    pub forced: bool,
    /// The header token (or rule name) that produced the hit.
    pub label: Option<String>,
}

impl RoleInfo {
    fn new(role: Role, col_index: usize, source: RoleSource) -> Self {
        Self {
            role,
            col_index,
            confidence: 1.0,
            source,
            meets_threshold: true,
            forced: false,
            label: None,
        }
    }
}

/// Validated, column-sorted role assignments.
///
/// Construction enforces the invariants: at most one entry per role, at
/// most one role per column (priority order name → result → unit →
/// reference → min → max → date), and reference xor (min, max).
#[derive(Debug, Clone, Default)]
pub struct HeaderRoles {
    entries: Vec<RoleInfo>,
}

impl HeaderRoles {
    pub fn sanitize(entries: Vec<RoleInfo>) -> Self {
        let mut by_role: Vec<Option<RoleInfo>> = vec![None; Role::ALL.len()];
        for info in entries {
            let slot = &mut by_role[role_ordinal(info.role)];
            if slot.is_none() {
                *slot = Some(info);
            }
        }

        // reference xor (min, max): prefer a complete, distinct min/max
        // pair, otherwise keep the single reference column.
        let has_ref = by_role[role_ordinal(Role::Reference)].is_some();
        let min_col = by_role[role_ordinal(Role::Min)].as_ref().map(|i| i.col_index);
        let max_col = by_role[role_ordinal(Role::Max)].as_ref().map(|i| i.col_index);
        if has_ref && (min_col.is_some() || max_col.is_some()) {
            match (min_col, max_col) {
                (Some(mi), Some(ma)) if mi != ma => {
                    by_role[role_ordinal(Role::Reference)] = None;
                }
                _ => {
                    by_role[role_ordinal(Role::Min)] = None;
                    by_role[role_ordinal(Role::Max)] = None;
                }
            }
        }

        // One role per column, kept in priority order.
        let mut seen_cols: Vec<usize> = Vec::new();
        let mut entries: Vec<RoleInfo> = Vec::new();
        for role in Role::ALL {
            if let Some(info) = by_role[role_ordinal(role)].take() {
                if seen_cols.contains(&info.col_index) {
                    continue;
                }
                seen_cols.push(info.col_index);
                entries.push(info);
            }
        }
        entries.sort_by_key(|e| e.col_index);
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleInfo> {
        self.entries.iter()
    }

    pub fn get(&self, role: Role) -> Option<&RoleInfo> {
        self.entries.iter().find(|e| e.role == role)
    }

    pub fn col(&self, role: Role) -> Option<usize> {
        self.get(role).map(|e| e.col_index)
    }

    /// Number of column bands implied by the roles: max col_index + 1.
    pub fn column_count(&self) -> usize {
        self.entries.iter().map(|e| e.col_index + 1).max().unwrap_or(0)
    }

    pub fn distinct_roles(&self) -> usize {
        self.entries.len()
    }

    /// Policy check: name + unit + result present, a reference-like column
    /// present (reference, or both min and max), and every chosen role over
    /// its threshold.
    pub fn is_policy_valid(&self) -> bool {
        let has = |r| self.get(r).is_some();
        let ok = |r: Role| self.get(r).map(|i| i.meets_threshold).unwrap_or(false);
        let ref_like = has(Role::Reference) || (has(Role::Min) && has(Role::Max));
        let ref_ok = self
            .get(Role::Reference)
            .map(|i| i.meets_threshold)
            .unwrap_or(false)
            || (has(Role::Min) && has(Role::Max));
        has(Role::Name) && ok(Role::Unit) && ok(Role::Result) && ref_like && ref_ok
    }
}

fn role_ordinal(role: Role) -> usize {
    Role::ALL.iter().position(|&r| r == role).expect("role in ALL")
}

// ---------------------------------------------------------------------
// OCR header path
// ---------------------------------------------------------------------

struct RoleSynonyms {
    role: Role,
    words: &'static [&'static str],
}

static HEADER_SYNONYMS: &[RoleSynonyms] = &[
    RoleSynonyms {
        role: Role::Name,
        words: &["name", "검사항목", "항목", "항목명", "검사명", "test", "parameter"],
    },
    RoleSynonyms {
        role: Role::Result,
        words: &[
            "result", "결과", "결과값", "결과치", "측정값", "측정치", "값", "value", "수치",
        ],
    },
    RoleSynonyms {
        role: Role::Unit,
        words: &["unit", "단위"],
    },
    RoleSynonyms {
        role: Role::Reference,
        words: &[
            "reference",
            "참고치",
            "참고범위",
            "참조치",
            "참조범위",
            "정상범위",
            "정상치",
            "기준치",
            "ref",
            "range",
            "ref. range",
            "ref.range",
        ],
    },
    RoleSynonyms {
        role: Role::Min,
        words: &["min", "최소", "최저", "하한", "하한치", "lo", "lower"],
    },
    RoleSynonyms {
        role: Role::Max,
        words: &["max", "최대", "최고", "상한", "상한치", "hi", "upper"],
    },
    RoleSynonyms {
        role: Role::Date,
        words: &["date", "검사일", "검사일자", "채혈일", "일자", "yyy", "mm", "dd"],
    },
];

/// Lowercase, collapse whitespace, and fold separator punctuation to
/// spaces so "Ref. Range" and "ref range" compare equal.
fn norm_header_token(s: &str) -> String {
    static SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._:/\\\-]+").unwrap());
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
    let t = s.to_lowercase();
    let t = WS_RE.replace_all(t.trim(), " ");
    let t = SEP_RE.replace_all(&t, " ");
    WS_RE.replace_all(&t, " ").trim().to_string()
}

/// Score one candidate line: which roles hit which columns, and how many
/// distinct roles hit at all.
fn score_header_candidate(line: &Line) -> (Vec<RoleInfo>, usize) {
    let tokens: Vec<&str> = line.iter().map(|t| t.text.as_str()).collect();
    let norm_tokens: Vec<String> = tokens.iter().map(|s| norm_header_token(s)).collect();

    let mut hits: Vec<RoleInfo> = Vec::new();
    for syns in HEADER_SYNONYMS {
        let mut hit: Option<(usize, &str)> = None;
        'outer: for (i, tok) in norm_tokens.iter().enumerate() {
            if tok.is_empty() {
                continue;
            }
            for word in syns.words {
                let w = norm_header_token(word);
                if *tok == w || (w.chars().count() >= 3 && tok.contains(&w)) {
                    hit = Some((i, tokens[i]));
                    break 'outer;
                }
            }
        }
        // Regex hits (only the date role carries patterns).
        if hit.is_none() && syns.role == Role::Date {
            for (i, raw) in tokens.iter().enumerate() {
                if patterns::is_date_like(raw) {
                    hit = Some((i, raw));
                    break;
                }
            }
        }
        if let Some((col, label)) = hit {
            let mut info = RoleInfo::new(syns.role, col, RoleSource::Ocr);
            info.label = Some(label.to_string());
            hits.push(info);
        }
    }
    let distinct = hits.len();
    (hits, distinct)
}

/// Search the region above the body for the best labeled header line.
///
/// Returns the line index and its roles when the best candidate reaches
/// `role_min_distinct_hits`. If the winner labels a `date` column but no
/// `result`, the date column is relabeled as the result (some layouts put
/// the sample date where the value column header belongs).
pub fn detect_ocr_header(
    lines: &[Line],
    body_start: usize,
    settings: &Settings,
) -> Option<(usize, HeaderRoles)> {
    let mut best: Option<(usize, Vec<RoleInfo>, usize)> = None;
    for idx in (0..body_start).rev() {
        let (roles, distinct) = score_header_candidate(&lines[idx]);
        let better = match &best {
            None => true,
            Some((_, _, best_distinct)) => distinct > *best_distinct,
        };
        if better {
            best = Some((idx, roles, distinct));
        }
    }
    let (idx, mut roles, distinct) = best?;
    if distinct < settings.role_min_distinct_hits {
        return None;
    }

    let has_result = roles.iter().any(|r| r.role == Role::Result);
    if !has_result {
        if let Some(date_info) = roles.iter_mut().find(|r| r.role == Role::Date) {
            date_info.role = Role::Result;
            date_info.label = date_info
                .label
                .take()
                .map(|l| format!("{l} (date-as-result)"));
        }
    }

    debug!(header_index = idx, distinct, "ocr header accepted");
    Some((idx, HeaderRoles::sanitize(roles)))
}

// ---------------------------------------------------------------------
// Rule-based inference path
// ---------------------------------------------------------------------

/// Rows of cell texts used as the inference (and fallback) sample.
pub type SampleRows = Vec<Vec<String>>;

fn row_texts(line: &Line) -> Vec<String> {
    line.iter()
        .map(|t| t.text.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Select up to 20 representative body rows and decide the column count.
///
/// K comes from the fraction of body rows carrying a range token: at or
/// above the threshold → K=4 (name | reference | result | unit); exactly
/// zero → K=5 (name | min | max | result | unit); anything in between is
/// ambiguous and sampling fails.
pub fn select_representative_sample(body: &[Line], settings: &Settings) -> Option<SampleRows> {
    let rows_all: Vec<Vec<String>> = body.iter().map(row_texts).collect();
    if rows_all.is_empty() {
        return None;
    }

    let mut range_like = 0usize;
    let mut valid_rows = 0usize;
    for row in &rows_all {
        if row.len() >= 3 {
            valid_rows += 1;
            if row[1..].iter().any(|s| patterns::is_range(s)) {
                range_like += 1;
            }
        }
    }
    let ratio = if valid_rows > 0 {
        range_like as f64 / valid_rows as f64
    } else {
        0.0
    };
    let assumed_k = if ratio >= settings.sample_reference_ratio_threshold {
        4
    } else if range_like == 0 {
        5
    } else {
        debug!(ratio, "ambiguous range ratio; sampling failed");
        return None;
    };

    let chosen: Vec<Vec<String>> = rows_all
        .into_iter()
        .filter(|row| row.len() == assumed_k)
        .filter(|row| {
            if row.len() > 6 {
                return false;
            }
            if row.iter().filter(|c| **c == row[0]).count() > 1 {
                return false;
            }
            if resolve_code(&row[0]).is_none() {
                return false;
            }
            let tail = &row[1..];
            let has_unit = tail.iter().any(|s| patterns::is_unit_like(s));
            let has_range = tail.iter().any(|s| patterns::is_range(s));
            let has_num = tail.iter().any(|s| patterns::is_number(s));
            has_unit && (has_range || has_num)
        })
        .take(20)
        .collect();

    if chosen.is_empty() {
        None
    } else {
        Some(chosen)
    }
}

#[derive(Default, Clone, Copy)]
struct ColumnStats {
    rows: usize,
    num: usize,
    range: usize,
    unit: usize,
    date: usize,
}

impl ColumnStats {
    fn ratio_num(&self) -> f64 {
        ratio(self.num, self.rows)
    }
    fn ratio_range(&self) -> f64 {
        ratio(self.range, self.rows)
    }
    fn ratio_unit(&self) -> f64 {
        ratio(self.unit, self.rows)
    }
    fn ratio_date(&self) -> f64 {
        ratio(self.date, self.rows)
    }
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Infer column roles from body content alone.
///
/// Returns the (possibly policy-invalid) roles together with the sample
/// they were computed from, or None when sampling fails.
pub fn infer_header_from_body(
    body: &[Line],
    settings: &Settings,
) -> Option<(HeaderRoles, SampleRows)> {
    let sample = select_representative_sample(body, settings)?;
    let max_cols = sample.iter().map(Vec::len).max().unwrap_or(0);
    if max_cols <= 1 {
        return None;
    }

    let mut stats = vec![ColumnStats::default(); max_cols];
    let sample_lines = sample.len();
    for row in &sample {
        for (j, cell) in row.iter().enumerate() {
            if cell.trim().is_empty() {
                continue;
            }
            let st = &mut stats[j];
            st.rows += 1;
            match patterns::classify(cell) {
                CellKind::Number => st.num += 1,
                CellKind::Range => st.range += 1,
                CellKind::Unit => st.unit += 1,
                CellKind::Date => st.date += 1,
                CellKind::Other => {}
            }
        }
    }

    let short_table = sample_lines < settings.min_rows_for_inference;
    let bonus = if short_table {
        settings.short_table_threshold_bonus
    } else {
        0.0
    };

    let mut entries: Vec<RoleInfo> = Vec::new();

    // name: column 0 by construction (body rows lead with canonical codes).
    let mut name_info = RoleInfo::new(Role::Name, 0, RoleSource::Inferred);
    name_info.label = Some("code-lexicon".to_string());
    entries.push(name_info);

    // unit: highest unit-pattern ratio; ties go right.
    let mut unit_idx: Option<usize> = None;
    let mut unit_score = 0.0f64;
    for (j, st) in stats.iter().enumerate().skip(1) {
        let score = st.ratio_unit();
        if score > unit_score || ((score - unit_score).abs() <= 1e-6 && unit_idx.is_some() && j > unit_idx.unwrap_or(0)) {
            unit_score = score;
            unit_idx = Some(j);
        }
    }
    let unit_thresh = settings.unit_threshold + bonus;
    if let Some(j) = unit_idx {
        let mut info = RoleInfo::new(Role::Unit, j, RoleSource::Inferred);
        info.label = Some("unit-pattern".to_string());
        info.confidence = round3(unit_score);
        info.meets_threshold = unit_score >= unit_thresh;
        entries.push(info);
    }

    // reference: highest range ratio, never the unit column.
    let mut ref_idx: Option<usize> = None;
    let mut ref_score = 0.0f64;
    for (j, st) in stats.iter().enumerate().skip(1) {
        let score = st.ratio_range();
        if score > ref_score {
            ref_score = score;
            ref_idx = Some(j);
        }
    }
    let ref_thresh = settings.reference_threshold + bonus;
    if let Some(j) = ref_idx {
        if unit_idx != Some(j) {
            let mut info = RoleInfo::new(Role::Reference, j, RoleSource::Inferred);
            info.label = Some("range-pattern".to_string());
            info.confidence = round3(ref_score);
            info.meets_threshold = ref_score >= ref_thresh;
            entries.push(info);
        } else {
            ref_idx = None;
        }
    }

    // result: highest numeric ratio outside unit/reference, with a bonus
    // for sitting immediately left of the unit and a penalty scaled by the
    // column's date ratio.
    let mut result_idx: Option<usize> = None;
    let mut result_score = 0.0f64;
    for (j, st) in stats.iter().enumerate().skip(1) {
        if Some(j) == unit_idx || Some(j) == ref_idx {
            continue;
        }
        let mut score = st.ratio_num();
        if unit_idx == Some(j + 1) {
            score += settings.prefer_result_left_of_unit_bonus;
        }
        score -= 0.5 * st.ratio_date();
        if score > result_score
            || ((score - result_score).abs() <= 1e-6 && result_idx.is_some() && j > result_idx.unwrap_or(0))
        {
            result_score = score;
            result_idx = Some(j);
        }
    }
    let result_thresh = settings.result_threshold + bonus;
    if let Some(j) = result_idx {
        let date_ratio = stats[j].ratio_date();
        let mut info = RoleInfo::new(Role::Result, j, RoleSource::Inferred);
        info.label = Some("numeric-pattern".to_string());
        info.confidence = round3(result_score);
        info.meets_threshold =
            result_score >= result_thresh && date_ratio <= settings.max_date_ratio_for_result;
        entries.push(info);
    } else if let Some(uj) = unit_idx {
        // Forced fallback: a numeric-enough, date-free neighbor of the unit
        // column stands in for the result.
        let consider = settings.fallback_consider_neighbors as isize;
        let min_ratio = settings.fallback_result_min_ratio + bonus;
        let mut candidates: Vec<(usize, f64)> = Vec::new();
        for dj in -consider..=consider {
            if dj == 0 {
                continue;
            }
            let j = uj as isize + dj;
            if j <= 0 || j >= max_cols as isize {
                continue;
            }
            let j = j as usize;
            if Some(j) == ref_idx {
                continue;
            }
            let num_r = stats[j].ratio_num();
            let date_r = stats[j].ratio_date();
            if num_r >= min_ratio && date_r <= settings.max_date_ratio_for_result {
                let mut score = num_r;
                if j + 1 == uj {
                    score += settings.prefer_result_left_of_unit_bonus;
                }
                candidates.push((j, score));
            }
        }
        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        if let Some(&(j, score)) = candidates.last() {
            let mut info = RoleInfo::new(Role::Result, j, RoleSource::Inferred);
            info.label = Some("fallback-adjacent-to-unit".to_string());
            info.confidence = round3(score);
            info.forced = true;
            info.meets_threshold = score >= result_thresh;
            entries.push(info);
        }
    }

    Some((HeaderRoles::sanitize(entries), sample))
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------
// OCR-header alignment gate
// ---------------------------------------------------------------------

/// Per-role alignment ratios for the gate's debug output.
#[derive(Debug, Clone, Default)]
pub struct AlignmentDetail {
    pub result: Option<f64>,
    pub unit: Option<f64>,
    pub reference: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Score how well the proposed roles match the body's type distribution
/// over the first `max_rows` body lines. The overall score is the mean of
/// the present sub-scores (result, unit, and reference-or-min/max).
pub fn evaluate_header_body_alignment(
    roles: &HeaderRoles,
    body: &[Line],
    max_rows: usize,
) -> (f64, AlignmentDetail) {
    let text_at = |line: &Line, j: usize| -> Option<String> {
        line.get(j).map(|t| t.text.trim().to_string()).filter(|s| !s.is_empty())
    };

    let mut hits = [0usize; 5];
    let mut considered = [0usize; 5];
    let cols = [
        roles.col(Role::Result),
        roles.col(Role::Unit),
        roles.col(Role::Reference),
        roles.col(Role::Min),
        roles.col(Role::Max),
    ];

    for line in body.iter().take(max_rows.max(1)) {
        for (slot, col) in cols.iter().enumerate() {
            let Some(j) = col else { continue };
            let Some(cell) = text_at(line, *j) else { continue };
            considered[slot] += 1;
            let expected = match slot {
                0 | 3 | 4 => CellKind::Number,
                1 => CellKind::Unit,
                _ => CellKind::Range,
            };
            if patterns::classify(&cell) == expected {
                hits[slot] += 1;
            }
        }
    }

    let sub = |slot: usize| -> Option<f64> {
        cols[slot].map(|_| ratio(hits[slot], considered[slot]))
    };
    let detail = AlignmentDetail {
        result: sub(0),
        unit: sub(1),
        reference: sub(2),
        min: sub(3),
        max: sub(4),
    };

    let mut components: Vec<f64> = Vec::new();
    if let Some(r) = detail.result {
        components.push(r);
    }
    if let Some(r) = detail.unit {
        components.push(r);
    }
    // reference-like: single reference and the min/max average each count
    // once; with both present, they average together.
    let mut ref_like = 0.0;
    let mut ref_count = 0usize;
    if let Some(r) = detail.reference {
        ref_like += r;
        ref_count += 1;
    }
    let minmax: Vec<f64> = [detail.min, detail.max].into_iter().flatten().collect();
    if !minmax.is_empty() {
        ref_like += minmax.iter().sum::<f64>() / minmax.len() as f64;
        ref_count += 1;
    }
    if ref_count > 0 {
        components.push(ref_like / ref_count as f64);
    }

    if components.is_empty() {
        (0.0, detail)
    } else {
        (
            components.iter().sum::<f64>() / components.len() as f64,
            detail,
        )
    }
}
