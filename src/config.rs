// Pipeline settings — every site/clinic/analyzer-specific threshold in
// one place.
//
// Defaults are the tuned values; anything that commonly needs adjustment
// per OCR engine can also be overridden from the environment (a .env file
// is loaded by the binary via dotenvy before `from_env` runs).

use std::env;

/// How tokens are placed into column bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandAssignmentMode {
    /// Place into the band whose half-open interval contains the x-center;
    /// tokens outside every band stay unassigned.
    Include,
    /// Always place into the band with the closest center, ignoring edges.
    #[default]
    Nearest,
    /// Include first; fall back to nearest-center for tokens outside all
    /// bands.
    Hybrid,
}

impl BandAssignmentMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Some(Self::Include),
            "nearest" => Some(Self::Nearest),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Tunables for the whole extraction pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    // Line grouping
    /// Tokens below this OCR confidence are dropped as noise. Tokens with
    /// no confidence are always kept.
    pub min_token_confidence: f64,
    /// Line band half-height multiplier: tau = median(raw_h) * alpha.
    pub line_alpha: f64,

    // Header detection (OCR path)
    /// A header candidate must hit at least this many distinct roles.
    pub role_min_distinct_hits: usize,

    // Rule-based header inference
    /// Below this many sample rows, thresholds get the short-table bonus.
    pub min_rows_for_inference: usize,
    pub short_table_threshold_bonus: f64,
    pub unit_threshold: f64,
    pub reference_threshold: f64,
    pub result_threshold: f64,
    /// A column whose date ratio exceeds this can never be the result.
    pub max_date_ratio_for_result: f64,
    /// Minimum numeric ratio for the forced-result neighbor fallback.
    pub fallback_result_min_ratio: f64,
    pub prefer_result_left_of_unit_bonus: f64,
    /// How far around the unit column the forced-result fallback looks.
    pub fallback_consider_neighbors: usize,
    /// Fraction of range-bearing body rows at or above which K=4 is
    /// assumed; exactly zero range rows means K=5.
    pub sample_reference_ratio_threshold: f64,

    // Bands
    pub band_assignment_mode: BandAssignmentMode,
    /// Sample window for band centers and the alignment gate.
    pub preview_rows: usize,

    // OCR-header alignment gate
    pub header_alignment_threshold: f64,

    // Final filtering
    /// Tests whose value confidence falls below this are dropped.
    /// Empirically tuned for one OCR engine; adjust per deployment.
    pub value_conf_threshold: f64,

    // Metadata name concatenation
    pub name_concat_max_gap_multiplier: f64,
    pub name_concat_min_gap_px: i32,
    pub name_concat_max_tokens: usize,
    /// Pure-numeric tokens at least this long stop name concatenation (IDs).
    pub name_block_long_numeric_len: usize,
    pub name_stop_on_date_like: bool,

    // External fallback
    /// Process-wide cap on concurrent in-flight fallback calls.
    pub llm_max_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_token_confidence: 0.5,
            line_alpha: 0.7,
            role_min_distinct_hits: 3,
            min_rows_for_inference: 8,
            short_table_threshold_bonus: 0.05,
            unit_threshold: 0.70,
            reference_threshold: 0.50,
            result_threshold: 0.60,
            max_date_ratio_for_result: 0.10,
            fallback_result_min_ratio: 0.45,
            prefer_result_left_of_unit_bonus: 0.05,
            fallback_consider_neighbors: 1,
            sample_reference_ratio_threshold: 0.3,
            band_assignment_mode: BandAssignmentMode::Nearest,
            preview_rows: 20,
            header_alignment_threshold: 0.65,
            value_conf_threshold: 0.94,
            name_concat_max_gap_multiplier: 1.8,
            name_concat_min_gap_px: 16,
            name_concat_max_tokens: 3,
            name_block_long_numeric_len: 6,
            name_stop_on_date_like: true,
            llm_max_concurrency: 2,
        }
    }
}

impl Settings {
    /// Defaults with `WHISKER_*` environment overrides applied.
    ///
    /// Unparseable values are ignored rather than failing startup.
    pub fn from_env() -> Self {
        let mut s = Self::default();
        if let Some(v) = env_f64("WHISKER_CONF_THRESHOLD") {
            s.value_conf_threshold = v;
        }
        if let Some(v) = env_f64("WHISKER_MIN_TOKEN_CONF") {
            s.min_token_confidence = v;
        }
        if let Some(v) = env_f64("WHISKER_ALIGNMENT_THRESHOLD") {
            s.header_alignment_threshold = v;
        }
        if let Ok(v) = env::var("WHISKER_BAND_MODE") {
            if let Some(mode) = BandAssignmentMode::parse(&v) {
                s.band_assignment_mode = mode;
            }
        }
        if let Some(v) = env_usize("WHISKER_LLM_MAX_CONCURRENCY") {
            s.llm_max_concurrency = v.max(1);
        }
        s
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok()?.trim().parse().ok()
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok()?.trim().parse().ok()
}
