// Token types — the unit of input for the whole pipeline.
//
// `TokenRecord` is the loose wire shape (what an OCR adapter or a JSON file
// provides). `Token` is the validated in-pipeline form with geometry
// guaranteed present. Tokens are never mutated once built; derived stages
// emit fresh tokens tagged with a `TokenOrigin`.

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// How a token came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOrigin {
    /// Straight from the OCR engine.
    #[default]
    Ocr,
    /// Left half of a value+unit token split.
    SplitValue,
    /// Right half of a value+unit token split.
    SplitUnitCandidate,
    /// Leading name fragment fused with a short parenthesized tail.
    NameMerge,
}

/// Abnormality flag letter carried on a numeric value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueFlag {
    High,
    Low,
    Normal,
}

impl ValueFlag {
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'H' => Some(Self::High),
            'L' => Some(Self::Low),
            'N' => Some(Self::Normal),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::High => 'H',
            Self::Low => 'L',
            Self::Normal => 'N',
        }
    }
}

/// Wire-shape token as produced by an OCR adapter.
///
/// Geometry fields are optional here; `into_token` enforces the input
/// contract: text plus both x and both y bounds, confidence optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub x_left: Option<i32>,
    #[serde(default)]
    pub x_right: Option<i32>,
    #[serde(default)]
    pub y_top: Option<i32>,
    #[serde(default)]
    pub y_bottom: Option<i32>,
    #[serde(default)]
    pub y_center: Option<i32>,
}

impl TokenRecord {
    /// Validate into a pipeline token.
    ///
    /// - `Ok(None)`: missing geometry or empty text — the token is silently
    ///   dropped per the input contract.
    /// - `Err(..)`: impossible geometry — the document is non-extractable.
    pub fn into_token(self) -> Result<Option<Token>, ExtractError> {
        if self.text.trim().is_empty() {
            return Ok(None);
        }
        let (Some(x_left), Some(x_right), Some(y_top), Some(y_bottom)) =
            (self.x_left, self.x_right, self.y_top, self.y_bottom)
        else {
            return Ok(None);
        };
        if x_right < x_left || y_bottom < y_top {
            return Err(ExtractError::InvalidGeometry {
                text: self.text,
                x_left,
                x_right,
                y_top,
                y_bottom,
            });
        }
        let y_center = self
            .y_center
            .filter(|c| (y_top..=y_bottom).contains(c))
            .unwrap_or((y_top + y_bottom) / 2);
        Ok(Some(Token {
            text: self.text,
            confidence: self.confidence,
            x_left,
            x_right,
            y_top,
            y_bottom,
            y_center,
            line_index: None,
            raw_value: None,
            raw_unit: None,
            value_num: None,
            value_flag: None,
            origin: TokenOrigin::Ocr,
        }))
    }
}

/// A positioned token flowing through the pipeline.
///
/// The optional annotation fields are additive: later stages attach them
/// (on cloned tokens) without touching `text` or the geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub confidence: Option<f64>,
    pub x_left: i32,
    pub x_right: i32,
    pub y_top: i32,
    pub y_bottom: i32,
    pub y_center: i32,

    /// Assigned by the line grouper.
    #[serde(default)]
    pub line_index: Option<usize>,
    /// Original surface form of a value that was split or annotated.
    #[serde(default)]
    pub raw_value: Option<String>,
    /// Original surface form of a unit candidate produced by a split.
    #[serde(default)]
    pub raw_unit: Option<String>,
    /// Numeric part of a number+flag token (text itself is untouched).
    #[serde(default)]
    pub value_num: Option<String>,
    #[serde(default)]
    pub value_flag: Option<ValueFlag>,
    #[serde(default)]
    pub origin: TokenOrigin,
}

impl Token {
    pub fn x_center(&self) -> i32 {
        (self.x_left + self.x_right) / 2
    }

    pub fn raw_h(&self) -> i32 {
        self.y_bottom - self.y_top
    }

    #[cfg(test)]
    pub fn test_at(text: &str, x_left: i32, x_right: i32, y_top: i32, y_bottom: i32) -> Self {
        TokenRecord {
            text: text.to_string(),
            confidence: Some(0.99),
            x_left: Some(x_left),
            x_right: Some(x_right),
            y_top: Some(y_top),
            y_bottom: Some(y_bottom),
            y_center: None,
        }
        .into_token()
        .expect("valid test geometry")
        .expect("non-empty test token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_geometry_is_dropped_silently() {
        let rec = TokenRecord {
            text: "WBC".into(),
            confidence: None,
            x_left: Some(10),
            x_right: Some(40),
            y_top: None,
            y_bottom: None,
            y_center: None,
        };
        assert!(rec.into_token().unwrap().is_none());
    }

    #[test]
    fn swapped_x_bounds_are_fatal() {
        let rec = TokenRecord {
            text: "8.5".into(),
            confidence: Some(0.9),
            x_left: Some(40),
            x_right: Some(10),
            y_top: Some(0),
            y_bottom: Some(20),
            y_center: None,
        };
        assert!(matches!(
            rec.into_token(),
            Err(ExtractError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn y_center_is_derived_when_absent() {
        let t = Token::test_at("HCT", 0, 30, 10, 30);
        assert_eq!(t.y_center, 20);
        assert_eq!(t.raw_h(), 20);
        assert_eq!(t.x_center(), 15);
    }
}
