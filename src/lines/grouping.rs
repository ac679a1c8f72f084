// Vertical line clustering.
//
// Tokens are sorted by y-center and swept top to bottom. Each line owns a
// fixed band [seed - tau, seed + tau] seeded at its first token's center;
// a token whose center falls inside the band joins the line, anything else
// starts the next one. tau derives from the median token height, so dense
// small print and sparse large print cluster equally well.

use crate::lines::Line;
use crate::ocr::Token;

/// Fallback token height when no token reports a positive height.
const DEFAULT_TOKEN_HEIGHT: i64 = 16;

fn median_i64(values: &mut Vec<i64>) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        ((values[n / 2 - 1] + values[n / 2]) as f64 / 2.0).round() as i64
    })
}

/// Assign line indices by the fixed-band sweep and return lines in index
/// order, x-sorted within each line (ties keep input order).
pub fn group_tokens_into_lines(tokens: Vec<Token>, alpha: f64) -> Vec<Line> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut heights: Vec<i64> = tokens
        .iter()
        .map(|t| t.raw_h() as i64)
        .filter(|&h| h > 0)
        .collect();
    let median_h = median_i64(&mut heights).unwrap_or(DEFAULT_TOKEN_HEIGHT);
    let tau = ((median_h as f64 * alpha).round() as i64).max(1);

    let mut indexed: Vec<(usize, Token)> = tokens.into_iter().enumerate().collect();
    indexed.sort_by_key(|(src_idx, tok)| (tok.y_center, tok.y_top, *src_idx));

    let mut current_line: usize = 0;
    let mut started = false;
    let mut band_top: i64 = 0;
    let mut band_bottom: i64 = 0;

    for (_, tok) in indexed.iter_mut() {
        let center = tok.y_center as i64;
        let in_band = started && (band_top..=band_bottom).contains(&center);
        if !in_band {
            if started {
                current_line += 1;
            }
            started = true;
            band_top = center - tau;
            band_bottom = center + tau;
        }
        tok.line_index = Some(current_line);
    }

    let line_count = current_line + 1;
    let mut lines: Vec<Vec<(usize, Token)>> = vec![Vec::new(); line_count];
    for (src_idx, tok) in indexed {
        let li = tok.line_index.unwrap_or(0);
        lines[li].push((src_idx, tok));
    }
    for line in &mut lines {
        line.sort_by_key(|(src_idx, tok)| (tok.x_left, *src_idx));
    }
    lines
        .into_iter()
        .map(|line| line.into_iter().map(|(_, tok)| tok).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_on_one_baseline_share_a_line() {
        let tokens = vec![
            Token::test_at("8.5", 200, 240, 100, 120),
            Token::test_at("WBC", 10, 60, 102, 118),
            Token::test_at("K/µL", 300, 360, 99, 121),
        ];
        let lines = group_tokens_into_lines(tokens, 0.7);
        assert_eq!(lines.len(), 1);
        let texts: Vec<&str> = lines[0].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["WBC", "8.5", "K/µL"]);
    }

    #[test]
    fn distant_baselines_split_lines() {
        let tokens = vec![
            Token::test_at("WBC", 10, 60, 100, 120),
            Token::test_at("RBC", 10, 60, 160, 180),
        ];
        let lines = group_tokens_into_lines(tokens, 0.7);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][0].text, "WBC");
        assert_eq!(lines[1][0].text, "RBC");
        assert_eq!(lines[0][0].line_index, Some(0));
        assert_eq!(lines[1][0].line_index, Some(1));
    }

    #[test]
    fn empty_input_yields_no_lines() {
        assert!(group_tokens_into_lines(Vec::new(), 0.7).is_empty());
    }
}
