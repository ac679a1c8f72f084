// Table body detection.
//
// The body starts at the first line whose leading token resolves to a
// known test code; from there on, only code-leading lines belong to the
// body. Leading tokens of kept lines are rewritten to their canonical code
// on cloned lines, so downstream stages always see canonical spellings.

use tracing::debug;

use crate::lexicon::resolve_code;
use crate::lines::{first_token_text, join_texts, Line};

/// A line discarded from the body region, kept for debugging.
#[derive(Debug, Clone)]
pub struct DroppedLine {
    pub line_index: usize,
    pub first_token: String,
    pub preview: String,
}

/// Index of the first line whose leading token is a known test code.
pub fn find_body_start(lines: &[Line]) -> Option<usize> {
    lines.iter().position(|line| {
        let first = first_token_text(line);
        !first.is_empty() && resolve_code(first).is_some()
    })
}

/// Keep only code-leading lines at or after `start`, replacing each kept
/// line's first token text with the canonical code (originals untouched).
pub fn filter_body(lines: &[Line], start: usize) -> (Vec<Line>, Vec<DroppedLine>) {
    let mut body: Vec<Line> = Vec::new();
    let mut dropped: Vec<DroppedLine> = Vec::new();

    for (idx, line) in lines.iter().enumerate().skip(start) {
        let first = first_token_text(line);
        match resolve_code(first) {
            Some(code) => {
                let mut cloned = line.clone();
                if let Some(tok) = cloned.first_mut() {
                    tok.text = code.to_string();
                }
                body.push(cloned);
            }
            None => dropped.push(DroppedLine {
                line_index: idx,
                first_token: first.to_string(),
                preview: join_texts(line, " | "),
            }),
        }
    }

    debug!(body_lines = body.len(), dropped = dropped.len(), "body filter");
    (body, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Token;

    fn line(texts: &[&str]) -> Line {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Token::test_at(t, (i as i32) * 100, (i as i32) * 100 + 60, 0, 20))
            .collect()
    }

    #[test]
    fn body_starts_at_first_code_line() {
        let lines = vec![
            line(&["Seoul", "Animal", "Hospital"]),
            line(&["Name", "Result", "Unit", "Reference"]),
            line(&["WBC", "8.5", "K/µL", "5.5-19.5"]),
            line(&["HCT", "41", "%", "29-45"]),
        ];
        assert_eq!(find_body_start(&lines), Some(2));
    }

    #[test]
    fn non_code_lines_inside_body_are_dropped_and_logged() {
        let lines = vec![
            line(&["WBC", "8.5"]),
            line(&["footer", "text"]),
            line(&["hct", "41"]),
        ];
        let (body, dropped) = filter_body(&lines, 0);
        assert_eq!(body.len(), 2);
        assert_eq!(body[0][0].text, "WBC");
        // leading token is canonicalized on a clone
        assert_eq!(body[1][0].text, "HCT");
        assert_eq!(lines[2][0].text, "hct");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].first_token, "footer");
    }

    #[test]
    fn no_codes_means_no_body() {
        let lines = vec![line(&["hello", "world"])];
        assert_eq!(find_body_start(&lines), None);
    }
}
