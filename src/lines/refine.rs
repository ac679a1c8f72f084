// Line refinement: leading name-fragment merges, glued value+unit splits,
// value-flag annotation, and status-word removal.
//
// None of these steps mutate a surviving token's text in place — merged and
// split tokens are fresh tokens tagged with their origin, keeping the OCR
// originals reconstructible from the provenance fields.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::lines::Line;
use crate::ocr::{Token, TokenOrigin, ValueFlag};
use crate::patterns;

/// Short parenthesized tail eligible for a name merge: `(K+)`, `(Na+)`.
static PAREN_FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\([^)]{1,12}\)$").unwrap());

/// Whitespace before an opening parenthesis in a leading name token.
static SPACE_BEFORE_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\(").unwrap());

/// Spaced value+unit: optional comparator, number, whitespace, unit tail.
static FULL_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*((?:[<>]=?|[≤≥≈~])?)\s*([-+]?(?:\d+(?:[.,]\d+)?|\.\d+)(?:\s*[x×]\s*10\s*\^?\s*[-+]?\d+)?)\s+(.+?)\s*$",
    )
    .unwrap()
});

/// Glued value+unit: optional comparator, number, unit with no separator.
static GLUED_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*((?:[<>]=?|[≤≥≈~])?)\s*([-+]?(?:\d+(?:[.,]\d+)?|\.\d+)(?:\s*[x×]\s*10\s*\^?\s*[-+]?\d+)?)([A-Za-zµμ%‰/][\w%‰/µμ]*)\s*$",
    )
    .unwrap()
});

/// Single flag letter masquerading as a unit.
static LONE_FLAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[HhLlNn]$").unwrap());

fn is_numeric_or_range_or_unit(text: &str) -> bool {
    patterns::is_number(text) || patterns::is_range(text) || patterns::is_unit_like(text)
}

fn median_gap_x(line: &Line) -> i32 {
    let mut spans: Vec<(i32, i32)> = line.iter().map(|t| (t.x_left, t.x_right)).collect();
    if spans.len() < 2 {
        return 0;
    }
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

/// Fuse a leading name token with an adjacent short parenthesized fragment:
/// `POTASSIUM | (K+)` becomes `POTASSIUM(K+)`. Applied at most once per
/// line and never across numeric, range, or unit tokens.
pub fn merge_name_fragments(lines: Vec<Line>) -> Vec<Line> {
    lines
        .into_iter()
        .map(|line| {
            if line.len() < 2 {
                return line;
            }
            let first = &line[0];
            let second = &line[1];
            if is_numeric_or_range_or_unit(first.text.trim()) {
                return line;
            }
            if !PAREN_FRAGMENT_RE.is_match(second.text.trim()) {
                return line;
            }
            let med_gap = median_gap_x(&line);
            let gap_thresh = ((med_gap as f64 * 1.6).round() as i32).max(14);
            let gap = second.x_left - first.x_right;
            if gap > gap_thresh {
                return line;
            }

            let mut merged = first.clone();
            merged.text = format!("{}{}", first.text.trim(), second.text.trim());
            merged.origin = TokenOrigin::NameMerge;
            merged.x_left = first.x_left.min(second.x_left);
            merged.x_right = first.x_right.max(second.x_right);
            merged.y_top = first.y_top.min(second.y_top);
            merged.y_bottom = first.y_bottom.max(second.y_bottom);

            let mut out = Vec::with_capacity(line.len() - 1);
            out.push(merged);
            out.extend(line.into_iter().skip(2));
            out
        })
        .collect()
}

/// Remove whitespace before `(` in the leading token so `SODIUM (Na+)`
/// keys the same as `SODIUM(Na+)`.
pub fn strip_space_before_paren(mut lines: Vec<Line>) -> Vec<Line> {
    for line in &mut lines {
        if let Some(first) = line.first_mut() {
            let fixed = SPACE_BEFORE_PAREN_RE.replace_all(&first.text, "(");
            if fixed != first.text {
                first.text = fixed.into_owned();
            }
        }
    }
    lines
}

fn try_split(text: &str) -> Option<(String, String)> {
    let caps = FULL_SPLIT_RE
        .captures(text)
        .or_else(|| GLUED_SPLIT_RE.captures(text))?;
    let comp = caps[1].trim().to_string();
    let num = caps[2].trim().to_string();
    let unit = caps[3].trim().to_string();

    if LONE_FLAG_RE.is_match(&unit) {
        return None;
    }
    if unit.contains(['-', '–', '~']) {
        return None;
    }
    let unit_chars = unit.chars().count();
    if unit_chars == 0 || unit_chars > 12 {
        return None;
    }
    let value = if comp.is_empty() { num } else { format!("{comp}{num}") };
    Some((value, unit))
}

/// Split `1.9mg/dL` / `<5 ug/mL`-shaped tokens into a value token and a
/// unit-candidate token, dividing the x-range at its midpoint.
pub fn split_value_units(lines: Vec<Line>) -> Vec<Line> {
    lines
        .into_iter()
        .map(|line| {
            let mut out: Vec<Token> = Vec::with_capacity(line.len());
            for tok in line {
                let Some((value_text, unit_text)) = try_split(&tok.text) else {
                    out.push(tok);
                    continue;
                };
                let mid = ((tok.x_left + tok.x_right) as f64 / 2.0).round() as i32;
                let mid = mid.clamp(tok.x_left, tok.x_right);

                let mut left = tok.clone();
                left.raw_value = Some(tok.text.clone());
                left.text = value_text;
                left.origin = TokenOrigin::SplitValue;
                left.x_right = mid;

                let mut right = tok.clone();
                right.raw_unit = Some(unit_text.clone());
                right.text = unit_text;
                right.origin = TokenOrigin::SplitUnitCandidate;
                right.x_left = mid;

                out.push(left);
                out.push(right);
            }
            out
        })
        .collect()
}

/// Annotate `7.2H`-style tokens with their numeric part and flag letter.
/// The token text itself is left untouched; unit candidates are skipped.
pub fn annotate_value_flags(mut lines: Vec<Line>) -> Vec<Line> {
    for line in &mut lines {
        for tok in line.iter_mut() {
            if tok.origin == TokenOrigin::SplitUnitCandidate || tok.value_flag.is_some() {
                continue;
            }
            if let Some((num, flag)) = patterns::split_value_flag(&tok.text) {
                if tok.raw_value.is_none() {
                    tok.raw_value = Some(tok.text.clone());
                }
                tok.value_num = Some(num);
                tok.value_flag = ValueFlag::from_letter(flag);
            }
        }
    }
    lines
}

/// Drop bare status labels (NORMAL / LOW / HIGH); they are annotations on
/// the report, not data cells.
pub fn remove_status_words(lines: Vec<Line>) -> Vec<Line> {
    lines
        .into_iter()
        .map(|line| {
            line.into_iter()
                .filter(|tok| {
                    let t = tok.text.trim().to_lowercase();
                    t != "normal" && t != "low" && t != "high"
                })
                .collect()
        })
        .collect()
}
