//! Cell values and canonical text rendering.
//!
//! Remote stores return loosely-typed payloads; everything is normalized
//! into the [`CellValue`] tagged union at the adapter boundary so the engine
//! never branches on raw response shape.

use serde::{Deserialize, Serialize};

/// A single cell in a table.
///
/// Serialized untagged, so cells travel as bare JSON scalars
/// (`"x"`, `1.5`, `true`, `null`) - the shape both remote value APIs speak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Boolean cell
    Bool(bool),
    /// Numeric cell
    Number(f64),
    /// Textual cell
    Text(String),
    /// Blank cell
    Empty,
}

/// Normalization rule applied to cell text before fingerprinting.
///
/// Must be applied identically to both sides of a comparison; the engine
/// owns a single rule and uses it for both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Normalization {
    /// Numbers render in canonical form, and text that parses as a finite
    /// number folds into the same form. Stores disagree about whether `1`
    /// is a number or the string `"1"` depending on render options; this
    /// rule makes them agree. Default.
    #[default]
    Numeric,
    /// Text is hashed verbatim. Numbers still render canonically, since an
    /// f64 has no single "original" spelling.
    Exact,
}

impl std::str::FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "numeric" => Ok(Normalization::Numeric),
            "exact" => Ok(Normalization::Exact),
            other => Err(format!(
                "unknown normalization '{other}' (expected 'numeric' or 'exact')"
            )),
        }
    }
}

impl CellValue {
    /// Normalize a raw JSON value from a remote store into a cell.
    ///
    /// Arrays and objects have no cell meaning in either remote API; they
    /// degrade to their compact JSON text so no content is silently lost.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => CellValue::Number(f),
                None => CellValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => {
                if s.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(s.clone())
                }
            }
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Whether the cell is blank.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Type tag and canonical text under the given normalization rule.
    ///
    /// The tag distinguishes cell kinds in the fingerprint byte stream; a
    /// text cell that folds to a number under [`Normalization::Numeric`]
    /// carries the number tag so `"1"` and `1` hash identically.
    pub(crate) fn canonical_parts(&self, normalization: Normalization) -> (u8, String) {
        match self {
            CellValue::Bool(b) => (b'b', b.to_string()),
            CellValue::Number(n) => (b'n', canonical_number(*n)),
            CellValue::Text(s) => {
                if normalization == Normalization::Numeric {
                    if let Ok(n) = s.trim().parse::<f64>() {
                        if n.is_finite() {
                            return (b'n', canonical_number(n));
                        }
                    }
                }
                (b't', s.clone())
            }
            CellValue::Empty => (b'e', String::new()),
        }
    }
}

/// Canonical text form of a number: shortest round-trip decimal, with the
/// negative-zero spelling collapsed so `-0.0` and `0` agree.
fn canonical_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}
