// Fatal pipeline errors.
//
// Only unrecoverable conditions live here. "No body detected" and
// "no band samples" are NOT errors — they produce an empty-but-valid
// DocumentResult so callers can retry with different OCR or preprocessing.
// Per-row rejections are recorded in the debug channel and never fail
// the document.

use thiserror::Error;

/// Unrecoverable extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A token arrived with impossible geometry (x_right < x_left or
    /// y_bottom < y_top). This indicates a broken OCR adapter, not noise.
    #[error("impossible token geometry for {text:?}: x=[{x_left}, {x_right}], y=[{y_top}, {y_bottom}]")]
    InvalidGeometry {
        text: String,
        x_left: i32,
        x_right: i32,
        y_top: i32,
        y_bottom: i32,
    },

    /// The code lexicon built empty. Body detection is impossible without it.
    #[error("code lexicon is empty; cannot detect table body")]
    EmptyLexicon,
}
