use serde::{Deserialize, Serialize};

/// Dynamically-typed value as exchanged with a host query engine. The
/// variants mirror the value kinds relational hosts pass to scalar
/// functions: null, integer, float, text and blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ScalarValue {
    /// Numeric coercion for scalar-column operands. `Null` coerces to zero,
    /// the convention for sparse coordinate columns; text and blobs do not
    /// coerce.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScalarValue::Null => Some(0.0),
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            ScalarValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarValue::Null | ScalarValue::Int(_) | ScalarValue::Float(_)
        )
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(v: Vec<u8>) -> Self {
        ScalarValue::Blob(v)
    }
}
