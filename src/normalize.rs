// Unit canonicalization — the single site where unit text is rewritten.
//
// Earlier stages only annotate (`raw_unit` snapshots); this module is the
// one place that produces canonical unit spellings. Corrections for OCR
// digit/letter confusions are accepted only when the corrected form
// resolves in the unit lexicon, so an over-eager rewrite can never invent
// a unit the reference table does not know.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Fold micro characters to the micro sign `µ` (U+00B5).
///
/// Greek mu `μ` (U+03BC) folds unconditionally. A plain `u` folds only in
/// unit contexts: at the start, after `/`, or after a `K`/`M` prefix, and
/// only when followed by `l`/`L`/`/` or a word boundary.
pub fn fold_micro(s: &str) -> String {
    static U_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(^|/|[KM])u(l|L|/|\b)").unwrap());
    let out = s.replace('μ', "µ");
    U_RE.replace_all(&out, "${1}µ${2}").into_owned()
}

/// Fold liter spellings to uppercase `L`, preserving the `l` inside unit
/// stems like `mol`/`mmol`. Only `µl`/`μl` and an `l` terminating a
/// denominator (`/dl`, `/ml`, `/ul`, `/l`) are rewritten.
pub fn fold_liter(s: &str) -> String {
    static DENOM_L_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"/(\s*[A-Za-zµμ]*?)l\b").unwrap());
    let out = s.replace("µl", "µL").replace("μl", "µL").replace('ℓ', "L");
    DENOM_L_RE.replace_all(&out, "/${1}L").into_owned()
}

/// Strip common OCR noise from a unit token: zero-width spaces, pipe
/// characters, decorative edge punctuation, and runs of whitespace.
fn clean_unit_ocr_noise(s: &str) -> String {
    static EDGE_LEFT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[\s,;:·•…~_\-—–]+").unwrap());
    static EDGE_RIGHT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\s,;:·•…~_\-—–]+$").unwrap());
    static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

    let mut t = s
        .replace(['\u{200b}', '\u{200c}', '\u{200d}'], "")
        .replace(['|', '｜'], "");
    t = EDGE_LEFT.replace(&t, "").into_owned();
    t = EDGE_RIGHT.replace(&t, "").into_owned();
    MULTI_SPACE.replace_all(&t, " ").trim().to_string()
}

/// Detect value+unit mixtures (`"12.5 mg/dL"`, `"neg pos/n"`) that must be
/// preserved verbatim rather than normalized.
fn is_value_unit_mixed(s: &str) -> bool {
    static NUMERIC_FIRST: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[-+]?\d+(?:[.,]\d+)?[HhLlNn]?$").unwrap());
    if !s.contains(' ') {
        return false;
    }
    let mut tokens = s.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    if tokens.next().is_none() {
        return false;
    }
    let first_lower = first.to_lowercase();
    const QUALITATIVE: [&str; 8] = [
        "neg", "pos", "positive", "negative", "양성", "음성", "normal", "high",
    ];
    if QUALITATIVE.contains(&first_lower.as_str()) || first_lower == "low" {
        return true;
    }
    NUMERIC_FIRST.is_match(first)
}

/// Exact-token overrides for spellings the positional rules cannot reach
/// (truncated denominators, lost characters, g↔9 confusion).
fn equals_override(u: &str) -> Option<&'static str> {
    let table: &[(&str, &str)] = &[
        ("mg/d", "mg/dL"),
        ("MG/", "mg/dL"),
        ("umol", "µmol/L"),
        ("umol/", "µmol/L"),
        ("mmol", "mmol/L"),
        ("ug/mL", "µg/mL"),
        ("ug/ml", "µg/mL"),
        ("mg'd", "mg/d"),
        ("MG'D", "mg/d"),
        ("mmH", "mmHg"),
        ("MMH", "mmHg"),
        ("P9", "pg"),
        ("p9", "pg"),
        ("ug/D", "µg/dL"),
        ("UG/D", "µg/dL"),
        ("ug/d", "µg/dL"),
        ("UG/d", "µg/dL"),
        ("G/DL", "g/dL"),
        ("mEq/", "mEq/L"),
        ("MEQ/", "mEq/L"),
        ("meq/", "mEq/L"),
        ("mEq", "mEq/L"),
        ("Pg", "pg"),
        ("PG", "pg"),
        ("pG", "pg"),
        ("Pg/mL", "pg/mL"),
        ("PG/mL", "pg/mL"),
        ("pG/mL", "pg/mL"),
        ("Pg/L", "pg/L"),
        ("PG/L", "pg/L"),
        ("pG/L", "pg/L"),
    ];
    table.iter().find(|(k, _)| *k == u).map(|(_, v)| *v)
}

/// Score how unit-like a string is (0..=2). Below 1, OCR confusion fixes
/// are skipped entirely.
fn looks_like_unit(s: &str) -> u8 {
    static FRACTION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)(per|x10|10\^)").unwrap());
    static STEM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)(mg|ug|g|mol|mmol|iu|u/l|µ|μ|L|/l)").unwrap());
    let t = s.trim();
    if t.is_empty() {
        return 0;
    }
    let mut score = 0;
    if t.contains('/') || FRACTION_RE.is_match(t) {
        score += 1;
    }
    if STEM_RE.is_match(t) {
        score += 1;
    }
    score
}

/// Apply whitelisted digit/letter confusion fixes, each verified against
/// the unit lexicon before being accepted.
fn apply_ocr_confusion_fixes(u: &str) -> String {
    static UGD1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^ug/d[1l]$").unwrap());
    static MGD1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(mg|g)/d1$").unwrap());
    static U1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(iu|u)/1$").unwrap());
    static MMO1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^mmo1/l$").unwrap());

    if looks_like_unit(u) < 1 {
        return u.to_string();
    }

    let verified = |after: String| -> Option<String> {
        crate::lexicon::units::resolve_unit(&after).map(|_| after)
    };

    let upper = u.to_uppercase();
    if upper == "UGD" || upper == "µGD" || upper == "ΜGD" {
        if let Some(fixed) = verified("µg/dL".to_string()) {
            return fixed;
        }
    }
    if UGD1_RE.is_match(u) || u.eq_ignore_ascii_case("ug/dl") {
        if let Some(fixed) = verified("µg/dL".to_string()) {
            return fixed;
        }
    }
    if let Some(caps) = MGD1_RE.captures(u) {
        let base = caps[1].to_lowercase();
        if let Some(fixed) = verified(format!("{base}/dL")) {
            return fixed;
        }
    }
    if let Some(caps) = U1_RE.captures(u) {
        let base = caps[1].to_uppercase();
        if let Some(fixed) = verified(format!("{base}/L")) {
            return fixed;
        }
    }
    if MMO1_RE.is_match(u) {
        if let Some(fixed) = verified("mmol/L".to_string()) {
            return fixed;
        }
    }
    u.to_string()
}

/// Remove spaces around `/` and `^`, then collapse remaining runs.
fn normalize_unit_spaces(s: &str) -> String {
    static SLASH_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+/\s+").unwrap());
    static CARET_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\^\s*").unwrap());
    static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
    let t = SLASH_SPACE.replace_all(s, "/");
    let t = CARET_SPACE.replace_all(&t, "^");
    MULTI_SPACE.replace_all(&t, " ").trim().to_string()
}

/// Fold power-of-ten CBC count spellings into the K/M prefix form.
fn normalize_prefixes(u: &str) -> String {
    static P10_3: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^(?:[x]?10\^3|10³)/(?:µ|μ|u)L$").unwrap());
    static P10_6: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^(?:[x]?10\^6|10⁶)/(?:µ|μ|u)L$").unwrap());
    static K_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^k/(?:µ|μ|u)L$").unwrap());
    static M_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^m/(?:µ|μ|u)L$").unwrap());
    static K_GLUED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[Kk](?:µ|μ|u)L$").unwrap());
    static M_GLUED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[Mm](?:µ|μ|u)L$").unwrap());

    if P10_3.is_match(u) || K_SLASH.is_match(u) || K_GLUED.is_match(u) {
        return "K/µL".to_string();
    }
    if P10_6.is_match(u) || M_SLASH.is_match(u) || M_GLUED.is_match(u) {
        return "M/µL".to_string();
    }
    u.to_string()
}

/// Canonicalize a unit string. Returns None for empty input and the
/// `UNKNOWN` sentinel; returns value+unit mixtures unchanged.
///
/// This transform is idempotent: every output is a fixed point.
pub fn normalize_unit_simple(unit: &str) -> Option<String> {
    static POW10_3_FRAG: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^10\s*[x×]\s*3\s*/\s*(?:(?:µ|μ|u)(?:u?L)?)?\s*$").unwrap()
    });
    static POW10_6_FRAG: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^10\s*[x×]\s*6\s*/\s*(?:(?:µ|μ|u)(?:u?L)?)?\s*$").unwrap()
    });

    let trimmed = unit.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
        return None;
    }

    let mut u = clean_unit_ocr_noise(trimmed);
    if u.is_empty() {
        return None;
    }

    // Analyzer output sometimes fragments the exponent form ("10 x3/µ",
    // "10 x6/"); repair before the mixed-value check would misread it.
    if POW10_3_FRAG.is_match(&u) {
        u = "10^3/µL".to_string();
    } else if POW10_6_FRAG.is_match(&u) {
        u = "10^6/µL".to_string();
    }

    if is_value_unit_mixed(&u) {
        return Some(u);
    }

    if let Some(over) = equals_override(&u) {
        u = over.to_string();
    }
    u = apply_ocr_confusion_fixes(&u);
    u = fold_micro(&u);
    u = fold_liter(&u);
    if let Some(over) = equals_override(&u) {
        u = over.to_string();
    }
    u = normalize_unit_spaces(&u);
    u = normalize_prefixes(&u);

    Some(u)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micro_folding_is_context_limited() {
        assert_eq!(fold_micro("u/L"), "µ/L");
        assert_eq!(fold_micro("KuL"), "KµL");
        assert_eq!(fold_micro("k/ul"), "k/µl");
        // 'u' inside a stem is not a micro prefix
        assert_eq!(fold_micro("ug/mL"), "ug/mL");
        assert_eq!(fold_micro("μg/dL"), "µg/dL");
    }

    #[test]
    fn liter_folding_preserves_mol() {
        assert_eq!(fold_liter("mg/dl"), "mg/dL");
        assert_eq!(fold_liter("mmol"), "mmol");
        assert_eq!(fold_liter("µl"), "µL");
        assert_eq!(fold_liter("mmol/l"), "mmol/L");
    }

    #[test]
    fn mixed_values_are_detected() {
        assert!(is_value_unit_mixed("12.5 mg/dL"));
        assert!(is_value_unit_mixed("neg pos/n"));
        assert!(is_value_unit_mixed("7.2H K/µL"));
        assert!(!is_value_unit_mixed("mg / dL"));
        assert!(!is_value_unit_mixed("K/µL"));
    }

    #[test]
    fn pow10_spellings_collapse_to_prefix() {
        for s in ["10^3/µL", "10³/µL", "x10^3/µL", "X10^3/uL", "k/ul", "K / UL", "KuL"] {
            assert_eq!(normalize_unit_simple(s).as_deref(), Some("K/µL"), "{s}");
        }
        for s in ["10^6/µL", "10⁶/µL", "m/ul", "MuL"] {
            assert_eq!(normalize_unit_simple(s).as_deref(), Some("M/µL"), "{s}");
        }
    }

    #[test]
    fn fragmented_exponent_forms_are_repaired() {
        assert_eq!(normalize_unit_simple("10 x3/μ").as_deref(), Some("K/µL"));
        assert_eq!(normalize_unit_simple("10 x3/μuL").as_deref(), Some("K/µL"));
        assert_eq!(normalize_unit_simple("10 x6/").as_deref(), Some("M/µL"));
    }

    #[test]
    fn equals_overrides() {
        assert_eq!(normalize_unit_simple("mg/d").as_deref(), Some("mg/dL"));
        assert_eq!(normalize_unit_simple("MG/").as_deref(), Some("mg/dL"));
        assert_eq!(normalize_unit_simple("mmol").as_deref(), Some("mmol/L"));
        assert_eq!(normalize_unit_simple("umol").as_deref(), Some("µmol/L"));
        assert_eq!(normalize_unit_simple("Pg").as_deref(), Some("pg"));
        assert_eq!(normalize_unit_simple("mmH").as_deref(), Some("mmHg"));
        assert_eq!(normalize_unit_simple("mg'd").as_deref(), Some("mg/dL"));
        assert_eq!(normalize_unit_simple("ug/mL").as_deref(), Some("µg/mL"));
        assert_eq!(normalize_unit_simple("mEq").as_deref(), Some("mEq/L"));
        assert_eq!(normalize_unit_simple("|mg/d ").as_deref(), Some("mg/dL"));
    }

    #[test]
    fn ocr_digit_fixes_require_lexicon_verification() {
        assert_eq!(normalize_unit_simple("mg/d1").as_deref(), Some("mg/dL"));
        assert_eq!(normalize_unit_simple("U/1").as_deref(), Some("U/L"));
        assert_eq!(normalize_unit_simple("mmo1/L").as_deref(), Some("mmol/L"));
        assert_eq!(normalize_unit_simple("ugD").as_deref(), Some("µg/dL"));
        assert_eq!(normalize_unit_simple("ug/d1").as_deref(), Some("µg/dL"));
    }

    #[test]
    fn mixtures_and_unknowns() {
        assert_eq!(normalize_unit_simple("neg pos/n").as_deref(), Some("neg pos/n"));
        assert_eq!(
            normalize_unit_simple("12.5 mg/dL").as_deref(),
            Some("12.5 mg/dL")
        );
        assert_eq!(normalize_unit_simple(""), None);
        assert_eq!(normalize_unit_simple("UNKNOWN"), None);
        assert_eq!(normalize_unit_simple("   "), None);
    }

    #[test]
    fn plain_units_pass_through() {
        assert_eq!(normalize_unit_simple("mg/dL").as_deref(), Some("mg/dL"));
        assert_eq!(normalize_unit_simple("g/L").as_deref(), Some("g/L"));
        assert_eq!(normalize_unit_simple("%").as_deref(), Some("%"));
        assert_eq!(normalize_unit_simple("U/L").as_deref(), Some("U/L"));
        assert_eq!(normalize_unit_simple("mg / dL").as_deref(), Some("mg/dL"));
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in [
            "10^3/µL", "k/ul", "mg/d", "ugD", "mmol", "neg pos/n", "12.5 mg/dL", "%",
            "K / UL", "Pg", "10 x3/μ", "mEq/", "U/1",
        ] {
            if let Some(once) = normalize_unit_simple(s) {
                let twice = normalize_unit_simple(&once);
                assert_eq!(twice.as_deref(), Some(once.as_str()), "not a fixed point: {s}");
            }
        }
    }
}
