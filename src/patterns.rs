// Shared compiled patterns and the cell-type classifier.
//
// Every regex the pipeline dispatches on is compiled exactly once here and
// reached through a typed function, so cell-type decisions are made the
// same way at every stage (sampling, header inference, alignment gate,
// normalization).

use std::sync::LazyLock;

use regex_lite::Regex;

/// Plain number, optionally with a trailing H/L/N flag letter: `8.5`, `120H`.
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(?:[.,]\d+)?(?:[HhLlNn])?$").unwrap());

/// Combined reference range: `5.5-19.5`, `1.2 – 3.4`, `10 ~ 20`.
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d+(?:[.,]\d+)?\s*[\-–~]\s*[+-]?\d+(?:[.,]\d+)?$").unwrap()
});

/// Conservative whole-token unit shapes commonly seen on lab reports.
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:%|‰|g/dl|mg/dl|u/l|iu/l|mmol/l|meq/l|fL|fl|pg|ng/ml|k/µl|k/μl|k/u?l|m/µl|m/μl|m/u?l|10\^?\d+/(?:l|ul|µl|μl))$",
    )
    .unwrap()
});

/// ISO-ish dates, four- or two-digit year: `2024-01-11`, `24.1.11`.
static DATE_Y4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}[\-./]\d{1,2}[\-./]\d{1,2}\b").unwrap());
static DATE_Y2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}[\-./]\d{1,2}[\-./]\d{1,2}\b").unwrap());

/// Number immediately followed by a flag letter: `7.2H`, `-3N`.
static VALUE_FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-+]?\d+(?:\.\d+)?)([HhLlNn])\s*$").unwrap());

/// Reference range with capture groups for splitting into min/max.
static RANGE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\d+(?:[.,]\d+)?)\s*[\-–~]\s*([+-]?\d+(?:[.,]\d+)?)\s*$").unwrap()
});

/// Number with an optional flag tail, for final value normalization.
static NUMBER_NORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+(?:[.,]\d+)?)(?:[HhLlNn])?\s*$").unwrap());

/// What a single cell looks like, decided once and reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Number,
    Range,
    Unit,
    Date,
    Other,
}

/// Normalize a numeric-ish token for matching: trims and folds the OCR
/// middle-dot and decimal comma into `.`.
pub fn norm_numeric_text(s: &str) -> String {
    s.trim().replace('·', ".").replace(',', ".")
}

pub fn is_number(s: &str) -> bool {
    NUMBER_RE.is_match(&norm_numeric_text(s))
}

pub fn is_range(s: &str) -> bool {
    RANGE_RE.is_match(&norm_numeric_text(s))
}

/// Whole-token unit match, plus the short-percent escape hatch (`12%` style
/// tokens that carry a percent sign but are too noisy for the full pattern).
pub fn is_unit_like(s: &str) -> bool {
    let t = norm_numeric_text(s);
    UNIT_RE.is_match(&t) || (s.contains('%') && t.chars().count() <= 4)
}

pub fn is_date_like(s: &str) -> bool {
    DATE_Y4_RE.is_match(s) || DATE_Y2_RE.is_match(s)
}

/// True only for a full four-digit-year date match.
pub fn find_date(s: &str) -> Option<(String, bool)> {
    if let Some(m) = DATE_Y4_RE.find(s) {
        return Some((m.as_str().to_string(), true));
    }
    DATE_Y2_RE.find(s).map(|m| (m.as_str().to_string(), false))
}

/// Classify a cell. Range wins over Number (a range contains numbers),
/// Number over Unit (pure digits are never units).
pub fn classify(s: &str) -> CellKind {
    let t = s.trim();
    if t.is_empty() {
        return CellKind::Other;
    }
    if is_range(t) {
        CellKind::Range
    } else if is_number(t) {
        CellKind::Number
    } else if is_unit_like(t) {
        CellKind::Unit
    } else if is_date_like(t) {
        CellKind::Date
    } else {
        CellKind::Other
    }
}

/// Decompose a `7.2H`-style token into (numeric text, flag letter).
pub fn split_value_flag(s: &str) -> Option<(String, char)> {
    let caps = VALUE_FLAG_RE.captures(s)?;
    let num = caps.get(1)?.as_str().to_string();
    let flag = caps.get(2)?.as_str().chars().next()?.to_ascii_uppercase();
    Some((num, flag))
}

/// Split a combined reference range into its raw min/max strings,
/// preserving the original number spellings.
pub fn split_range(s: &str) -> Option<(String, String)> {
    let caps = RANGE_SPLIT_RE.captures(s)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Extract the normalized numeric string from a value cell (`"8,5H"` →
/// `"8.5"`). Returns None when the cell is not a plain number.
pub fn normalize_number(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("unknown") {
        return None;
    }
    let caps = NUMBER_NORM_RE.captures(t)?;
    let num = norm_numeric_text(&caps[1]);
    num.parse::<f64>().ok()?;
    Some(num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_beat_numbers() {
        assert_eq!(classify("5.5-19.5"), CellKind::Range);
        assert_eq!(classify("5.5"), CellKind::Number);
        assert_eq!(classify("120H"), CellKind::Number);
    }

    #[test]
    fn unit_shapes() {
        for u in ["%", "g/dL", "mg/dl", "K/µL", "k/ul", "fL", "pg", "10^3/uL"] {
            assert_eq!(classify(u), CellKind::Unit, "{u}");
        }
        assert_eq!(classify("glucose"), CellKind::Other);
    }

    #[test]
    fn date_detection_prefers_four_digit_years() {
        assert_eq!(find_date("2024-01-11").unwrap(), ("2024-01-11".into(), true));
        assert_eq!(find_date("24-01-11").unwrap(), ("24-01-11".into(), false));
        assert!(find_date("no date here").is_none());
    }

    #[test]
    fn value_flag_decomposition() {
        assert_eq!(split_value_flag("7.2H").unwrap(), ("7.2".into(), 'H'));
        assert_eq!(split_value_flag("-3n").unwrap(), ("-3".into(), 'N'));
        assert!(split_value_flag("7.2").is_none());
        assert!(split_value_flag("H").is_none());
    }

    #[test]
    fn range_split_preserves_spellings() {
        assert_eq!(
            split_range(" 6.54 - 12.2 ").unwrap(),
            ("6.54".into(), "12.2".into())
        );
        assert_eq!(split_range("5,5~19,5").unwrap(), ("5,5".into(), "19,5".into()));
        assert!(split_range("6.54").is_none());
    }

    #[test]
    fn number_normalization() {
        assert_eq!(normalize_number("8,5H").unwrap(), "8.5");
        assert_eq!(normalize_number(" 120 ").unwrap(), "120");
        assert!(normalize_number("UNKNOWN").is_none());
        assert!(normalize_number("neg").is_none());
    }
}
