// Metadata extraction from the region above the table body.
//
// Hospital, client, and patient names plus the inspection date are pulled
// from free-form header lines by label synonyms, suffix patterns, and
// context-scored date matches. Everything is candidate-scored; the best
// candidate per field wins, with a mild recency bonus for lines closer to
// the body.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex_lite::Regex;
use tracing::debug;

use crate::config::Settings;
use crate::lines::{join_texts, Line};
use crate::patterns;

const PATIENT_LABELS: &[&str] = &[
    "환자명", "환자", "반려동물", "동물명", "pet", "animal", "name", "동물이름", "patient",
];
const CLIENT_LABELS: &[&str] = &["의뢰인", "보호자", "owner", "client", "고객", "고객명", "의뢰"];

const DATE_POSITIVE: &[&str] = &[
    "검사일", "검사일자", "채혈", "채취", "collection", "collected", "采血", "採血",
];
const DATE_NEUTRAL: &[&str] = &["일자", "date"];
const DATE_NEGATIVE: &[&str] = &["보고", "출력", "발행", "인쇄", "등록", "접수"];

const ADDRESS_TOKENS: &[&str] = &[
    "tel", "fax", "전화", "mobile", "http", "www", "@", "e-mail", "email", "주소", "address",
    "도로명",
];

const HEADER_LIKE_TOKENS: &[&str] = &[
    "name", "unit", "result", "reference", "min", "max", "ref range", "ref. range", "range",
    "parameter", "test", "value",
];

const GENDER_TOKENS: &[&str] = &["male", "female", "m/", "f/", "성별", "sex:"];

static KOR_HOSPITAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([가-힣A-Za-z0-9&'"()·\- ]{1,60}?(?:동물)?병원)"#).unwrap()
});
static ENG_HOSPITAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([A-Za-z0-9&' .\-]{2,80}?(?:Animal Hospital|Veterinary (?:Clinic|Hospital|Center|Centre)|Animal Medical Center|Pet Clinic|Vet Clinic|Animal Clinic))",
    )
    .unwrap()
});
static LABEL_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[:：\-~–—]\s*(.+)$").unwrap());
static LONG_NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6,}$").unwrap());
static NON_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9\W_]+$").unwrap());

/// Extracted header-region fields (None when no candidate survived).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub hospital_name: Option<String>,
    pub client_name: Option<String>,
    pub patient_name: Option<String>,
    pub inspection_date: Option<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    value: String,
    score: f64,
    line_index: usize,
}

fn norm(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_date_like_token(s: &str) -> bool {
    patterns::is_date_like(s) || LONG_NUMERIC_RE.is_match(s)
}

/// Strip trailing ID-like or date-like tokens from an extracted name.
fn prune_trailing_id_or_date(value: &str, settings: &Settings) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let normalized = norm(value);
    for tok in normalized.split(' ') {
        if LONG_NUMERIC_RE.is_match(tok) {
            break;
        }
        if settings.name_stop_on_date_like && is_date_like_token(tok) {
            break;
        }
        kept.push(tok);
    }
    norm(&kept.join(" "))
}

fn looks_like_name(value: &str) -> bool {
    let v = norm(value);
    if v.is_empty() || v.chars().count() > 40 {
        return false;
    }
    if NON_NAME_RE.is_match(&v) {
        return false;
    }
    let low = v.to_lowercase();
    !GENDER_TOKENS.iter().any(|t| low.contains(t))
}

/// Two or more column-header keywords on one line mark it as a table
/// header, not a metadata line.
fn is_header_like(text: &str) -> bool {
    let t = norm(text).to_lowercase();
    HEADER_LIKE_TOKENS.iter().filter(|w| t.contains(*w)).count() >= 2
}

fn median_gap(line: &Line) -> i32 {
    let mut spans: Vec<(i32, i32)> = line.iter().map(|t| (t.x_left, t.x_right)).collect();
    spans.sort_by_key(|s| s.0);
    let mut gaps: Vec<i32> = spans
        .windows(2)
        .map(|w| w[1].0 - w[0].1)
        .filter(|&g| g >= 0)
        .collect();
    if gaps.is_empty() {
        return 0;
    }
    gaps.sort_unstable();
    gaps[gaps.len() / 2]
}

/// Collect the name to the right of a label token using x-gaps: stop at
/// the first oversized gap, ID-like token, or date-like token; take at
/// most `name_concat_max_tokens` tokens.
fn name_after_label_by_geometry(line: &Line, label: &str, settings: &Settings) -> Option<String> {
    let label_low = label.to_lowercase();
    let anchor = line
        .iter()
        .position(|t| t.text.to_lowercase().contains(&label_low))?;

    let med = median_gap(line);
    let gap_thresh = ((settings.name_concat_max_gap_multiplier * med as f64).round() as i32)
        .max(settings.name_concat_min_gap_px);

    let mut collected: Vec<&str> = Vec::new();
    let mut prev_right = line[anchor].x_right;
    for tok in &line[anchor + 1..] {
        let text = tok.text.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, ":" | "：" | "-" | "~" | "–" | "—") {
            prev_right = tok.x_right;
            continue;
        }
        if tok.x_left - prev_right > gap_thresh {
            break;
        }
        if text.chars().all(|c| c.is_ascii_digit())
            && text.len() >= settings.name_block_long_numeric_len
        {
            break;
        }
        if settings.name_stop_on_date_like && is_date_like_token(text) {
            break;
        }
        collected.push(text);
        prev_right = tok.x_right;
        if collected.len() >= settings.name_concat_max_tokens.max(1) {
            break;
        }
    }

    let value = norm(&collected.join(" "));
    if value.is_empty() {
        None
    } else {
        Some(prune_trailing_id_or_date(&value, settings))
    }
}

/// String-parsing fallback: take what follows the label, across common
/// separators.
fn name_after_label_by_text(text: &str, label: &str, settings: &Settings) -> Option<String> {
    let low = text.to_lowercase();
    let idx = low.find(&label.to_lowercase())?;
    let tail = text.get(idx + label.len()..)?.trim_start();
    let value = if let Some(caps) = LABEL_SEPARATOR_RE.captures(tail) {
        norm(&caps[1])
    } else {
        norm(tail)
    };
    if value.is_empty() {
        return None;
    }
    let pruned = prune_trailing_id_or_date(&value, settings);
    if pruned.is_empty() {
        None
    } else {
        Some(pruned)
    }
}

fn date_context_score(text_lower: &str) -> f64 {
    let mut score = 0.0;
    for p in DATE_POSITIVE {
        if text_lower.contains(p) {
            score += 2.0;
        }
    }
    for p in DATE_NEUTRAL {
        if text_lower.contains(p) {
            score += 0.5;
        }
    }
    for n in DATE_NEGATIVE {
        if text_lower.contains(n) {
            score -= 1.5;
        }
    }
    score
}

/// A four-digit-year candidate must also be a real calendar date.
fn is_real_date(s: &str) -> bool {
    let parts: Vec<&str> = s.split(['-', '.', '/']).collect();
    if parts.len() != 3 {
        return false;
    }
    let (Ok(y), Ok(m), Ok(d)) = (
        parts[0].parse::<i32>(),
        parts[1].parse::<u32>(),
        parts[2].parse::<u32>(),
    ) else {
        return false;
    };
    NaiveDate::from_ymd_opt(y, m, d).is_some()
}

/// The byte following a Korean hospital match must not extend the word.
fn kor_match_is_word_end(text: &str, end: usize) -> bool {
    match text[end..].chars().next() {
        None => true,
        Some(c) => !(('가'..='힣').contains(&c) || c.is_ascii_alphanumeric()),
    }
}

fn push_candidate(list: &mut Vec<Candidate>, value: String, score: f64, line_index: usize) {
    list.push(Candidate {
        value,
        score,
        line_index,
    });
}

/// Extract metadata from lines `[0, body_start)` (the line right above the
/// body is always included).
pub fn extract_metadata(
    lines: &[Line],
    header_index: Option<usize>,
    body_start: usize,
    settings: &Settings,
) -> Metadata {
    let region_len = body_start.max(1).min(lines.len());
    let region = &lines[..region_len];

    let mut hospital: Vec<Candidate> = Vec::new();
    let mut client: Vec<Candidate> = Vec::new();
    let mut patient: Vec<Candidate> = Vec::new();
    let mut date: Vec<Candidate> = Vec::new();

    for (i, line) in region.iter().enumerate() {
        let text = join_texts(line, " ");
        let low = text.to_lowercase();
        let on_header_line = header_index == Some(i);

        // Patient name by label.
        for label in PATIENT_LABELS {
            if !low.contains(&label.to_lowercase()) {
                continue;
            }
            let mut value = name_after_label_by_geometry(line, label, settings)
                .or_else(|| name_after_label_by_text(&text, label, settings));
            // The bare "name" label collides with table headers; reject
            // header-shaped lines and header-shaped values for it.
            if *label == "name" {
                if on_header_line
                    || value.as_deref().map(is_header_like).unwrap_or(false)
                    || is_header_like(&text)
                {
                    value = None;
                }
            }
            if let Some(v) = value.filter(|v| looks_like_name(v)) {
                push_candidate(&mut patient, v, 1.0, i);
                break;
            }
        }

        // Hospital name (unlabeled, suffix-driven); skip address lines.
        if !ADDRESS_TOKENS.iter().any(|t| low.contains(t)) {
            for m in KOR_HOSPITAL_RE.find_iter(&text) {
                if !kor_match_is_word_end(&text, m.end()) {
                    continue;
                }
                let cand = norm(m.as_str());
                let chars = cand.chars().count();
                if cand.is_empty() || cand == "병원" || cand == "동물병원" {
                    continue;
                }
                if !(3..=60).contains(&chars) {
                    continue;
                }
                let suffix_bonus = if cand.ends_with("동물병원") { 1.6 } else { 1.2 };
                let len_bonus = (chars as f64 / 18.0).min(1.0);
                let idx_bonus = -0.2 * ((1.0 + i as f64).ln());
                push_candidate(
                    &mut hospital,
                    cand,
                    1.0 + suffix_bonus + len_bonus + idx_bonus,
                    i,
                );
            }
            for m in ENG_HOSPITAL_RE.find_iter(&text) {
                let cand = norm(m.as_str());
                let chars = cand.chars().count();
                if !(4..=80).contains(&chars) || !cand.chars().any(|c| c.is_ascii_alphabetic()) {
                    continue;
                }
                let low_c = cand.to_lowercase();
                let suffix_bonus = if low_c.contains("animal hospital") {
                    1.4
                } else if low_c.contains("veterinary hospital") {
                    1.3
                } else if low_c.contains("animal medical center") {
                    1.2
                } else if low_c.contains("veterinary clinic") {
                    1.1
                } else if low_c.contains("vet clinic")
                    || low_c.contains("pet clinic")
                    || low_c.contains("animal clinic")
                {
                    0.9
                } else {
                    0.8
                };
                let len_bonus = (chars as f64 / 20.0).min(1.0);
                let idx_bonus = -0.2 * ((1.0 + i as f64).ln());
                push_candidate(
                    &mut hospital,
                    cand,
                    1.0 + suffix_bonus + len_bonus + idx_bonus,
                    i,
                );
            }
        }

        // Client name by label; table-header lines never qualify.
        for label in CLIENT_LABELS {
            if !low.contains(&label.to_lowercase()) {
                continue;
            }
            let mut value = name_after_label_by_geometry(line, label, settings)
                .or_else(|| name_after_label_by_text(&text, label, settings));
            if on_header_line || is_header_like(&text) {
                value = None;
            }
            if let Some(v) = value.filter(|v| looks_like_name(v)) {
                push_candidate(&mut client, v, 0.9, i);
                break;
            }
        }

        // Inspection date: context score plus pattern match, unless the
        // context is strongly negative (report/print/issue dates).
        let ds = date_context_score(&low);
        if ds > -0.5 {
            if let Some((value, y4)) = patterns::find_date(&text) {
                let real_y4 = y4 && is_real_date(&value);
                let score = ds + if real_y4 { 1.5 } else { 0.7 };
                push_candidate(&mut date, value, score, i);
            }
        }
    }

    let pick = |candidates: Vec<Candidate>| -> Option<String> {
        candidates
            .into_iter()
            .max_by(|a, b| {
                let ka = a.score + 0.1 * ((1.0 + a.line_index as f64).ln());
                let kb = b.score + 0.1 * ((1.0 + b.line_index as f64).ln());
                ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|c| c.value)
    };

    let meta = Metadata {
        hospital_name: pick(hospital),
        client_name: pick(client),
        patient_name: pick(patient),
        inspection_date: pick(date),
    };
    debug!(
        hospital = meta.hospital_name.as_deref().unwrap_or(""),
        patient = meta.patient_name.as_deref().unwrap_or(""),
        date = meta.inspection_date.as_deref().unwrap_or(""),
        "metadata extracted"
    );
    meta
}

/// Plain-text rendering of the header region for the patient-name
/// fallback capability.
pub fn header_region_text(lines: &[Line], body_start: usize) -> String {
    let region_len = body_start.max(1).min(lines.len());
    lines[..region_len]
        .iter()
        .map(|l| join_texts(l, " "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Token;

    fn labeled_line(y: i32, parts: &[(&str, i32, i32)]) -> Line {
        parts
            .iter()
            .map(|(text, l, r)| Token::test_at(text, *l, *r, y, y + 20))
            .collect()
    }

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn labeled_patient_name_is_extracted_by_geometry() {
        let lines = vec![labeled_line(
            0,
            &[("환자명", 10, 70), (":", 74, 78), ("나비", 84, 120), ("123456789", 400, 500)],
        )];
        let meta = extract_metadata(&lines, None, 1, &settings());
        assert_eq!(meta.patient_name.as_deref(), Some("나비"));
    }

    #[test]
    fn client_and_patient_are_distinguished() {
        let lines = vec![
            labeled_line(0, &[("의뢰인:", 10, 80), ("홍길동", 86, 140)]),
            labeled_line(30, &[("반려동물", 10, 80), ("나비", 86, 120)]),
        ];
        let meta = extract_metadata(&lines, None, 2, &settings());
        assert_eq!(meta.client_name.as_deref(), Some("홍길동"));
        assert_eq!(meta.patient_name.as_deref(), Some("나비"));
    }

    #[test]
    fn header_like_lines_do_not_yield_names() {
        let lines = vec![labeled_line(
            0,
            &[("Name", 10, 60), ("Result", 100, 160), ("Unit", 200, 240), ("Range", 300, 360)],
        )];
        let meta = extract_metadata(&lines, None, 1, &settings());
        assert_eq!(meta.patient_name, None);
    }

    #[test]
    fn korean_hospital_suffix_wins() {
        let lines = vec![
            labeled_line(0, &[("행복한", 10, 70), ("동물병원", 76, 150)]),
            labeled_line(30, &[("주소", 10, 50), ("서울시 강남구 병원", 60, 260)]),
        ];
        let meta = extract_metadata(&lines, None, 2, &settings());
        assert_eq!(meta.hospital_name.as_deref(), Some("행복한 동물병원"));
    }

    #[test]
    fn english_hospital_is_recognized() {
        let lines = vec![labeled_line(
            0,
            &[("Happy", 10, 60), ("Paws", 70, 120), ("Animal", 130, 190), ("Hospital", 200, 280)],
        )];
        let meta = extract_metadata(&lines, None, 1, &settings());
        assert_eq!(meta.hospital_name.as_deref(), Some("Happy Paws Animal Hospital"));
    }

    #[test]
    fn collection_dates_beat_report_dates() {
        let lines = vec![
            labeled_line(0, &[("보고일:", 10, 70), ("2024-01-15", 80, 200)]),
            labeled_line(30, &[("검사일:", 10, 70), ("2024-01-11", 80, 200)]),
        ];
        let meta = extract_metadata(&lines, None, 2, &settings());
        assert_eq!(meta.inspection_date.as_deref(), Some("2024-01-11"));
    }

    #[test]
    fn impossible_calendar_dates_score_as_weak_candidates() {
        assert!(!is_real_date("2024-13-45"));
        assert!(is_real_date("2024-01-11"));
        assert!(is_real_date("2024.1.11"));
    }

    #[test]
    fn long_ids_are_pruned_from_names() {
        let pruned = prune_trailing_id_or_date("나비 20240111123", &settings());
        assert_eq!(pruned, "나비");
    }
}
