// Code and unit lexicon resolution behavior.

use whisker::lexicon::{code_lexicon, expected_unit, resolve_code, resolve_unit, unit_lexicon};

// ============================================================
// Code resolution — case/whitespace robustness
// ============================================================

#[test]
fn codes_resolve_case_insensitively() {
    assert_eq!(resolve_code("WBC"), Some("WBC"));
    assert_eq!(resolve_code("wbc"), Some("WBC"));
    assert_eq!(resolve_code("Wbc"), Some("WBC"));
}

#[test]
fn codes_resolve_whitespace_insensitively() {
    assert_eq!(resolve_code(" W B C "), Some("WBC"));
    assert_eq!(resolve_code("H C T"), Some("HCT"));
}

// ============================================================
// OCR confusion fallbacks
// ============================================================

#[test]
fn zero_resolves_to_letter_o() {
    assert_eq!(resolve_code("p02"), Some("pO2"));
    assert_eq!(resolve_code("s02"), Some("sO2"));
}

#[test]
fn percent_decorations_collapse() {
    let canonical = resolve_code("LYMPH%").expect("LYMPH% is canonical");
    assert_eq!(resolve_code("LYMPH(%)"), Some(canonical));
    assert_eq!(resolve_code("LYMPH (%)"), Some(canonical));
}

#[test]
fn hash_suffix_falls_back_to_base() {
    assert_eq!(resolve_code("RETIC#"), Some("RETIC"));
}

#[test]
fn analyzer_suffix_falls_back_to_base() {
    assert_eq!(resolve_code("WBC-A"), Some("WBC"));
}

#[test]
fn trailing_dash_noise_is_tolerated() {
    assert_eq!(resolve_code("HGB-"), Some("HGB"));
}

// ============================================================
// Unknown / ambiguous inputs
// ============================================================

#[test]
fn unknown_codes_resolve_to_none() {
    assert_eq!(resolve_code("XXXYYY"), None);
    assert_eq!(resolve_code(""), None);
    assert_eq!(resolve_code("123456"), None);
}

#[test]
fn resolution_is_idempotent_over_every_canonical_code() {
    let lex = code_lexicon();
    for code in lex.canonical_codes() {
        let once = lex.resolve(code).expect("canonical resolves");
        assert_eq!(lex.resolve(once), Some(once), "{code}");
    }
}

// ============================================================
// Unit lexicon
// ============================================================

#[test]
fn unit_lexicon_builds_nonempty() {
    assert!(!unit_lexicon().is_empty());
}

#[test]
fn count_units_unify() {
    for q in ["K/µL", "k/ul", "K/UL", "10^3/uL", "x10^3/µL"] {
        assert_eq!(resolve_unit(q), Some("K/µL"), "{q}");
    }
    for q in ["M/µL", "m/ul", "10^6/uL"] {
        assert_eq!(resolve_unit(q), Some("M/µL"), "{q}");
    }
}

#[test]
fn fraction_units_resolve() {
    assert_eq!(resolve_unit("MG/DL"), Some("mg/dL"));
    assert_eq!(resolve_unit("U/L"), Some("U/L"));
    assert_eq!(resolve_unit("mmol/l"), Some("mmol/L"));
}

#[test]
fn unknown_units_resolve_to_none() {
    assert_eq!(resolve_unit("parsecs"), None);
    assert_eq!(resolve_unit(""), None);
}

// ============================================================
// Expected units from the reference table
// ============================================================

#[test]
fn expected_units_are_exposed_per_code() {
    assert_eq!(expected_unit("WBC"), Some("K/µL"));
    assert_eq!(expected_unit("HCT"), Some("%"));
    assert_eq!(expected_unit("ALT"), Some("U/L"));
    // unitless quantities
    assert_eq!(expected_unit("pH"), None);
    assert_eq!(expected_unit("NOPE"), None);
}
