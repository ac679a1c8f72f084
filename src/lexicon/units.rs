// Unit lexicon — canonical measurement units and their OCR/typographic
// variants.
//
// CBC absolute-count units are unified to the prefix form: `10^3/µL`,
// `10³/µL`, `x10^3/uL`, `k/ul` and friends all map to `K/µL` (and the
// 10^6 family to `M/µL`). Curated variants cover the micro/liter/case
// spellings analyzers actually print.

use std::collections::{BTreeSet, HashMap};
use std::sync::{LazyLock, OnceLock};

use regex_lite::Regex;

use super::data::REFERENCE_TESTS;
use crate::normalize::{fold_liter, fold_micro};

static POW10_CANON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10[\^³⁶]?(\d*)/µL$").unwrap());
static POW10_3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:10\^\s*3/µL|10³/µL)$").unwrap());
static POW10_6_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:10\^\s*6/µL|10⁶/µL)$").unwrap());
static K_CANON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^k/[µμ]L$").unwrap());
static M_CANON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^m/[µμ]L$").unwrap());
static TAIL_PER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(ML|DL|L)$").unwrap());

/// Canonical-form folding used for keys: micro/liter unification plus
/// whitespace removal. (Deliberately *not* the full `normalize_unit_simple`
/// transform — that one verifies its fixes against this lexicon, so the
/// build must stay independent of it.)
fn normalize_unit_canonical(s: &str) -> String {
    let t = fold_liter(&fold_micro(s.trim()));
    t.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Collapse exponent canonicals into the K/M prefix policy.
fn alias_pow10_to_prefix(c: &str) -> String {
    let t = normalize_unit_canonical(c);
    if POW10_3_RE.is_match(&t) {
        return "K/µL".to_string();
    }
    if POW10_6_RE.is_match(&t) {
        return "M/µL".to_string();
    }
    t
}

fn unit_keys(u: &str) -> (String, String) {
    let t = normalize_unit_canonical(u);
    let upper = t.to_uppercase();
    let alnum = upper.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    (upper, alnum)
}

/// Widely-printed variants for a canonical unit.
fn curated_variants(canonical: &str) -> BTreeSet<String> {
    let c = normalize_unit_canonical(canonical);
    let mut vars: BTreeSet<String> = BTreeSet::new();

    let pow10_family = |exp: &str, vars: &mut BTreeSet<String>| {
        for denom in ["µL", "uL", "UL"] {
            vars.insert(format!("10^{exp}/{denom}"));
            vars.insert(format!("x10^{exp}/{denom}"));
            vars.insert(format!("X10^{exp}/{denom}"));
        }
    };

    if let Some(caps) = POW10_CANON_RE.captures(&c) {
        let exp = caps[1].to_string();
        if !exp.is_empty() {
            pow10_family(&exp, &mut vars);
            if exp == "3" {
                for v in ["K/µL", "K/uL", "K/UL", "k/µl", "k/ul"] {
                    vars.insert(v.to_string());
                }
            }
            if exp == "6" {
                for v in ["M/µL", "M/uL", "M/UL", "m/µl", "m/ul"] {
                    vars.insert(v.to_string());
                }
            }
        }
    }

    if K_CANON_RE.is_match(&c) {
        for v in ["K/uL", "K/UL", "k/µl", "k/ul", "10³/µL"] {
            vars.insert(v.to_string());
        }
        pow10_family("3", &mut vars);
    }
    if M_CANON_RE.is_match(&c) {
        for v in ["M/uL", "M/UL", "m/µl", "m/ul", "10⁶/µL"] {
            vars.insert(v.to_string());
        }
        pow10_family("6", &mut vars);
    }

    // Mass/volume fractions: case and liter-glyph variants.
    let upper = c.to_uppercase();
    const COMMON_FRACTIONS: [&str; 8] = [
        "G/DL", "MG/DL", "UG/ML", "UG/L", "NG/ML", "MMOL/L", "IU/L", "U/L",
    ];
    if TAIL_PER_RE.is_match(&upper) || COMMON_FRACTIONS.contains(&upper.as_str()) {
        vars.insert(upper.clone());
        vars.insert(upper.replace("/ML", "/mL").replace("/DL", "/dL"));
        vars.insert(upper.replace("UG/ML", "µg/mL").replace("UG/L", "µg/L"));
    }

    // Bare symbolic units.
    if ["%", "SEC", "MMHG", "G/DL", "U/L", "IU/L", "MMOL/L"].contains(&c.as_str()) {
        vars.insert(c.clone());
        vars.insert(c.to_lowercase());
    }

    vars.remove(&c);
    vars
}

/// The built unit dictionary.
pub struct UnitLexicon {
    canonical: BTreeSet<String>,
    upper_index: HashMap<String, String>,
    alnum_index: HashMap<String, BTreeSet<String>>,
}

impl UnitLexicon {
    pub fn build() -> Self {
        let mut canonical: BTreeSet<String> = BTreeSet::new();
        for entry in REFERENCE_TESTS {
            if let Some(u) = entry.unit {
                if !u.trim().is_empty() {
                    canonical.insert(alias_pow10_to_prefix(u));
                }
            }
        }

        let mut upper_index: HashMap<String, String> = HashMap::new();
        let mut alnum_index: HashMap<String, BTreeSet<String>> = HashMap::new();

        for cu in &canonical {
            let (uk, ak) = unit_keys(cu);
            upper_index.insert(uk, cu.clone());
            alnum_index.entry(ak).or_default().insert(cu.clone());
        }
        for cu in canonical.clone() {
            for v in curated_variants(&cu) {
                let (uk, ak) = unit_keys(&v);
                upper_index.entry(uk).or_insert_with(|| cu.clone());
                alnum_index.entry(ak).or_default().insert(cu.clone());
            }
        }

        Self {
            canonical,
            upper_index,
            alnum_index,
        }
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn canonical_units(&self) -> impl Iterator<Item = &str> + '_ {
        self.canonical.iter().map(|s| s.as_str())
    }

    /// Resolve a token to a canonical unit, or None when unknown or
    /// ambiguous.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        let raw = token.trim();
        if raw.is_empty() {
            return None;
        }

        let t = normalize_unit_canonical(raw);
        let upper = t.to_uppercase();
        if let Some(cu) = self.upper_index.get(&upper) {
            return Some(cu.as_str());
        }

        let ak: String = upper.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let candidates = self.alnum_index.get(&ak)?;
        if candidates.len() == 1 {
            return candidates.iter().next().map(|s| s.as_str());
        }

        // Hint filtering: micro / liter / power-of-ten equivalences.
        let micro_hint = raw.contains(['µ', 'μ', 'u']);
        let liter_hint = raw.contains(['l', 'L', 'ℓ']);
        let pow10_hint =
            raw.contains(['^', '³', 'K', 'M']) || raw.contains("x10") || raw.contains("X10");
        let matches_hints = |cu: &str| -> bool {
            let cu_up = cu.to_uppercase();
            if micro_hint && !cu.contains('µ') {
                return false;
            }
            if liter_hint && !cu_up.contains('L') {
                return false;
            }
            if pow10_hint && !(cu_up.contains("10") || cu_up.contains("/UL") || cu.contains("/µL")) {
                return false;
            }
            true
        };
        if micro_hint || liter_hint || pow10_hint {
            let filtered: Vec<&str> = candidates
                .iter()
                .map(|s| s.as_str())
                .filter(|cu| matches_hints(cu))
                .collect();
            if filtered.len() == 1 {
                return filtered.first().copied();
            }
        }
        None
    }
}

static UNIT_LEXICON: OnceLock<UnitLexicon> = OnceLock::new();

/// Process-lifetime unit lexicon, built once on first use.
pub fn unit_lexicon() -> &'static UnitLexicon {
    UNIT_LEXICON.get_or_init(UnitLexicon::build)
}

/// Resolve against the shared lexicon.
pub fn resolve_unit(token: &str) -> Option<&'static str> {
    unit_lexicon().resolve(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbc_count_units_unify_to_prefix_form() {
        for q in ["K/µL", "k/uL", "K/UL", "10^3/µL", "x10^3/uL", "10³/µL"] {
            assert_eq!(resolve_unit(q), Some("K/µL"), "{q}");
        }
        assert_eq!(resolve_unit("M/uL"), Some("M/µL"));
    }

    #[test]
    fn plain_fractions_resolve_case_insensitively() {
        assert_eq!(resolve_unit("MG/DL"), Some("mg/dL"));
        assert_eq!(resolve_unit("mg/dL"), Some("mg/dL"));
        assert_eq!(resolve_unit("U/L"), Some("U/L"));
        assert_eq!(resolve_unit("mmHg"), Some("mmHg"));
    }

    #[test]
    fn micro_glyph_variants_resolve() {
        // Greek mu folds to the micro sign before key lookup. (The bare
        // ASCII `ug/dL` spelling is repaired by normalize_unit_simple's
        // lexicon-verified confusion fix, not by raw resolution.)
        assert_eq!(resolve_unit("μg/dL"), Some("µg/dL"));
        assert_eq!(resolve_unit("µg/dL"), Some("µg/dL"));
    }

    #[test]
    fn unknown_units_stay_unknown() {
        assert_eq!(resolve_unit("bogus"), None);
        assert_eq!(resolve_unit(""), None);
    }
}
