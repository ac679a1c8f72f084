// Reference lexicons: test codes and measurement units.
//
// Both dictionaries are built once from the static table in `data` and
// memoized behind `OnceLock` (build under a guard, publish once), so
// concurrent documents share immutable lookups. `CodeLexicon::build` /
// `UnitLexicon::build` stay public for callers that need a fresh instance.

pub mod codes;
pub mod data;
pub mod units;

pub use codes::{code_lexicon, resolve_code, CodeLexicon};
pub use data::{expected_unit, ReferenceTest, REFERENCE_TESTS};
pub use units::{resolve_unit, unit_lexicon, UnitLexicon};
