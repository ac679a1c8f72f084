// OCR input boundary.
//
// The extractor does not run OCR. Callers hand it, per page, a flat bag of
// positioned tokens; everything downstream is pure geometry + text rules.

pub mod token;

pub use token::{Token, TokenOrigin, TokenRecord, ValueFlag};
