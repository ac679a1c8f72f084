// Column bands — pure geometry.
//
// The header fixes K (number of columns); band centers come from the
// median x-centers of sample body rows that have exactly K tokens. No
// text-type reasoning happens here: a band is just a half-open interval
// [left_edge, right_edge) plus its center.

use tracing::debug;

use crate::config::BandAssignmentMode;
use crate::lines::Line;

/// Minimum outward extrapolation for the outer edges, in pixels.
const MIN_EDGE_MARGIN: i32 = 20;

/// Half-width of the single band in a one-column table.
const SINGLE_BAND_HALF_WIDTH: i32 = 1000;

/// Computed column geometry: K centers and K+1 edges.
#[derive(Debug, Clone)]
pub struct ColumnBands {
    pub centers: Vec<i32>,
    pub edges: Vec<i32>,
    /// Body indices of the sample rows the centers came from.
    pub sample_rows: Vec<usize>,
}

impl ColumnBands {
    pub fn k(&self) -> usize {
        self.centers.len()
    }

    pub fn band(&self, j: usize) -> (i32, i32) {
        (self.edges[j], self.edges[j + 1])
    }
}

fn median_i32(values: &mut Vec<i32>) -> i32 {
    values.sort_unstable();
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (((values[n / 2 - 1] as i64 + values[n / 2] as i64) as f64) / 2.0).round() as i32
    }
}

/// Build bands from the first `sample_limit` body lines that carry exactly
/// `k` tokens. Returns None when no such line exists (`no_band_samples`).
pub fn build_bands(body: &[Line], k: usize, sample_limit: usize) -> Option<ColumnBands> {
    if k == 0 {
        return None;
    }
    let mut centers_by_col: Vec<Vec<i32>> = vec![Vec::new(); k];
    let mut sample_rows: Vec<usize> = Vec::new();

    for (i, line) in body.iter().take(sample_limit.max(1)).enumerate() {
        if line.len() != k {
            continue;
        }
        sample_rows.push(i);
        for (j, tok) in line.iter().enumerate() {
            centers_by_col[j].push(tok.x_center());
        }
    }
    if sample_rows.is_empty() {
        debug!(k, "no band samples");
        return None;
    }

    let centers: Vec<i32> = centers_by_col
        .iter_mut()
        .map(|vals| {
            if vals.len() == 1 {
                vals[0]
            } else {
                median_i32(vals)
            }
        })
        .collect();

    let edges: Vec<i32> = if k == 1 {
        vec![
            centers[0] - SINGLE_BAND_HALF_WIDTH,
            centers[0] + SINGLE_BAND_HALF_WIDTH,
        ]
    } else {
        let mut edges = Vec::with_capacity(k + 1);
        let first_gap = centers[1] - centers[0];
        let last_gap = centers[k - 1] - centers[k - 2];
        edges.push(centers[0] - MIN_EDGE_MARGIN.max(((first_gap as f64) / 2.0).round() as i32));
        for w in centers.windows(2) {
            edges.push((w[0] + w[1]) / 2);
        }
        edges.push(centers[k - 1] + MIN_EDGE_MARGIN.max(((last_gap as f64) / 2.0).round() as i32));
        edges
    };

    debug!(k, samples = sample_rows.len(), ?centers, "bands built");
    Some(ColumnBands {
        centers,
        edges,
        sample_rows,
    })
}

/// Assign every token on a line to a band and return the K cell strings
/// (space-joined token texts; empty cells stay empty here).
pub fn assign_cells(line: &Line, bands: &ColumnBands, mode: BandAssignmentMode) -> Vec<String> {
    let k = bands.k();
    let mut cells: Vec<Vec<&str>> = vec![Vec::new(); k];

    let nearest = |c: i32| -> usize {
        (0..k)
            .min_by_key(|&j| (c - bands.centers[j]).abs())
            .expect("k > 0")
    };

    for tok in line {
        let c = tok.x_center();
        match mode {
            BandAssignmentMode::Nearest => cells[nearest(c)].push(&tok.text),
            BandAssignmentMode::Include | BandAssignmentMode::Hybrid => {
                let included = (0..k).find(|&j| {
                    let (l, r) = bands.band(j);
                    l <= c && c < r
                });
                match included {
                    Some(j) => cells[j].push(&tok.text),
                    None if mode == BandAssignmentMode::Hybrid => {
                        cells[nearest(c)].push(&tok.text)
                    }
                    None => {}
                }
            }
        }
    }

    cells
        .into_iter()
        .map(|texts| texts.join(" ").trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Token;

    fn line_at(cols: &[(&str, i32)]) -> Line {
        cols.iter()
            .map(|(text, x)| Token::test_at(text, x - 30, x + 30, 0, 20))
            .collect()
    }

    fn sample_body() -> Vec<Line> {
        vec![
            line_at(&[("WBC", 50), ("8.5", 250), ("K/µL", 450), ("5.5-19.5", 650)]),
            line_at(&[("HCT", 52), ("41", 248), ("%", 452), ("29-45", 648)]),
            line_at(&[("HGB", 48), ("13.2", 252), ("g/dL", 448), ("9.8-16.2", 652)]),
        ]
    }

    #[test]
    fn centers_are_column_medians() {
        let bands = build_bands(&sample_body(), 4, 20).expect("bands");
        assert_eq!(bands.centers, vec![50, 250, 450, 650]);
        assert_eq!(bands.edges.len(), 5);
        // interior edges at midpoints, outer edges extrapolated
        assert_eq!(bands.edges[1], 150);
        assert_eq!(bands.edges[2], 350);
        assert_eq!(bands.edges[0], 50 - 100);
        assert_eq!(bands.edges[4], 650 + 100);
    }

    #[test]
    fn no_k_token_rows_means_no_bands() {
        let body = vec![line_at(&[("WBC", 50), ("8.5", 250)])];
        assert!(build_bands(&body, 4, 20).is_none());
    }

    #[test]
    fn nearest_mode_places_every_token() {
        let bands = build_bands(&sample_body(), 4, 20).unwrap();
        // Token far outside all bands still lands in the nearest one.
        let line = line_at(&[("PLT", 40), ("350", 260), ("K/µL", 440), ("150-600", 1200)]);
        let cells = assign_cells(&line, &bands, BandAssignmentMode::Nearest);
        assert_eq!(cells, vec!["PLT", "350", "K/µL", "150-600"]);
    }

    #[test]
    fn include_mode_leaves_outliers_unassigned() {
        let bands = build_bands(&sample_body(), 4, 20).unwrap();
        let line = line_at(&[("PLT", 40), ("350", 260), ("K/µL", 440), ("150-600", 5000)]);
        let cells = assign_cells(&line, &bands, BandAssignmentMode::Include);
        assert_eq!(cells, vec!["PLT", "350", "K/µL", ""]);
    }

    #[test]
    fn hybrid_mode_falls_back_to_nearest() {
        let bands = build_bands(&sample_body(), 4, 20).unwrap();
        let line = line_at(&[("PLT", 40), ("350", 260), ("K/µL", 440), ("150-600", 5000)]);
        let cells = assign_cells(&line, &bands, BandAssignmentMode::Hybrid);
        assert_eq!(cells, vec!["PLT", "350", "K/µL", "150-600"]);
    }

    #[test]
    fn crowded_band_joins_texts_with_spaces() {
        let bands = build_bands(&sample_body(), 4, 20).unwrap();
        let line = line_at(&[("WBC", 50), ("8.5", 240), ("H", 265), ("K/µL", 450), ("5.5-19.5", 650)]);
        let cells = assign_cells(&line, &bands, BandAssignmentMode::Nearest);
        assert_eq!(cells[1], "8.5 H");
    }
}
