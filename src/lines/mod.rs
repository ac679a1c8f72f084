// Stage 1: turn a flat bag of positioned tokens into refined text lines.
//
// Order of operations: confidence filter → y-clustering → in-line x sort →
// leading name-fragment merge → paren-space fix → value/unit split →
// value-flag annotation → status-word removal. Geometry survives every
// step so later stages can band by x-coordinates.

pub mod grouping;
pub mod refine;

use tracing::debug;

use crate::config::Settings;
use crate::error::ExtractError;
use crate::ocr::{Token, TokenRecord};

/// A text line: tokens sharing a line index, ordered left to right.
pub type Line = Vec<Token>;

/// Run the full line-grouping stage on raw OCR records.
pub fn group_lines(records: Vec<TokenRecord>, settings: &Settings) -> Result<Vec<Line>, ExtractError> {
    let mut tokens: Vec<Token> = Vec::with_capacity(records.len());
    let mut dropped_low_conf = 0usize;
    let mut dropped_invalid = 0usize;

    for rec in records {
        match rec.into_token()? {
            None => dropped_invalid += 1,
            Some(tok) => {
                if let Some(conf) = tok.confidence {
                    if settings.min_token_confidence > 0.0 && conf < settings.min_token_confidence {
                        dropped_low_conf += 1;
                        continue;
                    }
                }
                tokens.push(tok);
            }
        }
    }
    if dropped_low_conf > 0 || dropped_invalid > 0 {
        debug!(
            dropped_low_conf,
            dropped_invalid,
            min_confidence = settings.min_token_confidence,
            "token filter"
        );
    }

    let lines = grouping::group_tokens_into_lines(tokens, settings.line_alpha);
    let lines = refine::merge_name_fragments(lines);
    let lines = refine::strip_space_before_paren(lines);
    let lines = refine::split_value_units(lines);
    let lines = refine::annotate_value_flags(lines);
    let lines = refine::remove_status_words(lines);
    Ok(lines)
}

/// Text of the first token on a line, or empty.
pub fn first_token_text(line: &Line) -> &str {
    line.first().map(|t| t.text.as_str()).unwrap_or("")
}

/// Space-joined preview of a line (debug output).
pub fn join_texts(line: &Line, sep: &str) -> String {
    line.iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}
