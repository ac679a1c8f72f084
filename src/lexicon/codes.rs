// Code lexicon — OCR-robust lookup from leading-token text to canonical
// test codes.
//
// Two indices back the lookup: `upper_index` (uppercase, whitespace
// stripped) for exact hits, and `alnum_index` (A-Z0-9 only) for tokens
// whose punctuation OCR mangled. Resolution is deliberately conservative:
// when the alnum key stays ambiguous after symbol-hint filtering and the
// 0→O retry, the resolver returns None and lets the caller use other
// context.

use std::collections::{BTreeSet, HashMap};
use std::sync::{LazyLock, OnceLock};

use regex_lite::Regex;

use super::data::REFERENCE_TESTS;

static PERCENT_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*%\s*\)").unwrap());
static PERCENT_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+%").unwrap());
static HASH_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*#\s*\)").unwrap());
static HASH_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+#").unwrap());
static TRAILING_DASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\-−–—]+$").unwrap());

fn upper_key(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
}

fn alnum_key(upper: &str) -> String {
    upper.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Fold `(%)`, ` %`, `(#)`, ` #` decorations into plain `%`/`#` so
/// `LYMPH(%)`, `LYMPH (%)` and `LYMPH%` share one key.
fn normalize_percent_hash(s: &str) -> String {
    let t = PERCENT_PAREN_RE.replace_all(s, "%");
    let t = PERCENT_SPACE_RE.replace_all(&t, "%");
    let t = HASH_PAREN_RE.replace_all(&t, "#");
    HASH_SPACE_RE.replace_all(&t, "#").into_owned()
}

/// Conservative code-candidate normalization for the last-resort retry:
/// drop a parenthesized tail, percent signs, and trailing dash noise.
fn normalize_code_candidate(s: &str) -> String {
    let mut t = s.trim().to_string();
    if let Some(idx) = t.find('(') {
        t.truncate(idx);
    }
    t = t.replace('%', "").trim().to_string();
    TRAILING_DASH_RE.replace(&t, "").trim().to_string()
}

/// The built code dictionary.
pub struct CodeLexicon {
    canonical: BTreeSet<&'static str>,
    upper_index: HashMap<String, &'static str>,
    alnum_index: HashMap<String, BTreeSet<&'static str>>,
}

impl CodeLexicon {
    /// Build from the static reference table. Codes differing only in case
    /// or internal whitespace collapse to one canonical spelling, preferring
    /// the all-uppercase variant.
    pub fn build() -> Self {
        let mut by_upper: HashMap<String, BTreeSet<&'static str>> = HashMap::new();
        for entry in REFERENCE_TESTS {
            by_upper.entry(upper_key(entry.code)).or_default().insert(entry.code);
        }

        let mut canonical: BTreeSet<&'static str> = BTreeSet::new();
        for variants in by_upper.values() {
            let chosen = variants
                .iter()
                .max_by_key(|s| {
                    let ups = s.chars().filter(|c| c.is_uppercase()).count();
                    let all_up = **s == s.to_uppercase();
                    (all_up, ups, std::cmp::Reverse(s.len()), **s)
                })
                .copied()
                .expect("non-empty variant group");
            canonical.insert(chosen);
        }

        let mut upper_index: HashMap<String, &'static str> = HashMap::new();
        let mut alnum_index: HashMap<String, BTreeSet<&'static str>> = HashMap::new();
        for &code in &canonical {
            let uk = upper_key(code);
            let ak = alnum_key(&uk);
            upper_index.insert(uk, code);
            alnum_index.entry(ak).or_default().insert(code);
        }

        Self {
            canonical,
            upper_index,
            alnum_index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn canonical_codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.canonical.iter().copied()
    }

    /// Resolve a token to its canonical code, or None when unknown or
    /// irreducibly ambiguous.
    pub fn resolve(&self, token: &str) -> Option<&'static str> {
        let raw = token.trim();
        if raw.is_empty() {
            return None;
        }

        // Analyzer '-A' suffix: prefer the base code when it is known.
        let lower = raw.to_lowercase();
        if let Some(base) = lower.strip_suffix("-a").map(|_| &raw[..raw.len() - 2]) {
            if self.upper_index.contains_key(&upper_key(base)) {
                if let Some(code) = self.resolve_normalized(base) {
                    return Some(code);
                }
            }
        }

        if let Some(code) = self.resolve_normalized(raw) {
            return Some(code);
        }

        // Last resort: strip parenthesized tails / percent / dash noise and
        // retry the exact index only.
        let norm = normalize_code_candidate(raw);
        if !norm.is_empty() && norm != raw {
            if let Some(&code) = self.upper_index.get(&upper_key(&norm)) {
                return Some(code);
            }
        }
        None
    }

    fn resolve_normalized(&self, raw: &str) -> Option<&'static str> {
        let raw_norm = normalize_percent_hash(raw);

        // Trailing '#': the base form wins if it is in the dictionary
        // ("RETIC#" resolves to "RETIC").
        if let Some(base) = raw_norm.trim_end().strip_suffix('#') {
            if let Some(&code) = self.upper_index.get(&upper_key(base)) {
                return Some(code);
            }
        }

        let uk = upper_key(&raw_norm);
        if let Some(&code) = self.upper_index.get(&uk) {
            return Some(code);
        }

        let ak = alnum_key(&uk);
        let mut candidates: BTreeSet<&'static str> = self
            .alnum_index
            .get(&ak)
            .cloned()
            .unwrap_or_default();
        if candidates.len() == 1 {
            return candidates.iter().next().copied();
        }

        // Symbol-hint filtering: punctuation that survived OCR narrows the
        // candidate set.
        let hints: Vec<char> = ['+', '-', '%', '/', '_', '.']
            .into_iter()
            .filter(|&h| raw_norm.contains(h))
            .collect();
        if !hints.is_empty() && !candidates.is_empty() {
            let filtered: BTreeSet<&'static str> = candidates
                .iter()
                .copied()
                .filter(|c| hints.iter().any(|&h| c.contains(h)))
                .collect();
            if filtered.len() == 1 {
                return filtered.iter().next().copied();
            }
            if !filtered.is_empty() {
                candidates = filtered;
            }
        }

        // 0→O retry for codes OCR read with digits ("p02" → "pO2").
        let uk_o = uk.replace('0', "O");
        if uk_o != uk {
            if let Some(&code) = self.upper_index.get(&uk_o) {
                return Some(code);
            }
        }
        let ak_o = ak.replace('0', "O");
        if ak_o != ak {
            if let Some(cands_o) = self.alnum_index.get(&ak_o) {
                if cands_o.len() == 1 {
                    return cands_o.iter().next().copied();
                }
                if !hints.is_empty() {
                    let filtered: Vec<&'static str> = cands_o
                        .iter()
                        .copied()
                        .filter(|c| hints.iter().any(|&h| c.contains(h)))
                        .collect();
                    if filtered.len() == 1 {
                        return filtered.first().copied();
                    }
                }
            }
        }

        None
    }
}

static CODE_LEXICON: OnceLock<CodeLexicon> = OnceLock::new();

/// Process-lifetime code lexicon, built once on first use.
pub fn code_lexicon() -> &'static CodeLexicon {
    CODE_LEXICON.get_or_init(CodeLexicon::build)
}

/// Resolve against the shared lexicon.
pub fn resolve_code(token: &str) -> Option<&'static str> {
    code_lexicon().resolve(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_whitespace_insensitive() {
        for q in ["WBC", "wbc", "Wbc", " W B C "] {
            assert_eq!(resolve_code(q), Some("WBC"), "{q}");
        }
    }

    #[test]
    fn zero_to_o_fallback() {
        assert_eq!(resolve_code("p02"), Some("pO2"));
        assert_eq!(resolve_code("pO2"), Some("pO2"));
    }

    #[test]
    fn percent_variants_collapse() {
        let expected = resolve_code("LYMPH%").expect("LYMPH% resolves");
        for q in ["LYMPH(%)", "LYMPH (%)", "LYMPH %"] {
            assert_eq!(resolve_code(q), Some(expected), "{q}");
        }
    }

    #[test]
    fn hash_suffix_prefers_base() {
        assert_eq!(resolve_code("RETIC#"), Some("RETIC"));
    }

    #[test]
    fn analyzer_suffix_prefers_base() {
        // WBC-A is itself canonical, but the base form wins.
        assert_eq!(resolve_code("WBC-A"), Some("WBC"));
    }

    #[test]
    fn unknown_and_ambiguous_return_none() {
        assert_eq!(resolve_code("XXXYYY"), None);
        assert_eq!(resolve_code(""), None);
        assert_eq!(resolve_code("   "), None);
    }

    #[test]
    fn trailing_dash_noise_is_stripped() {
        assert_eq!(resolve_code("HCT-"), Some("HCT"));
    }

    #[test]
    fn resolution_is_idempotent() {
        // Resolving a resolved code must be a fixed point. (Canonical codes
        // with an '-A' analyzer suffix resolve to their base, so the map is
        // idempotent rather than the identity.)
        let lex = code_lexicon();
        for code in lex.canonical_codes() {
            let once = lex.resolve(code).expect("canonical codes resolve");
            assert_eq!(lex.resolve(once), Some(once), "{code} not idempotent");
        }
    }
}
