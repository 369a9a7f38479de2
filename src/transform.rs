pub mod flatten;
pub mod naming;
pub mod timestamp;
pub mod unify;

pub use flatten::{FlattenedRecord, flatten};
pub use unify::{UnifiedBatch, unify};

use serde_json::{Number, Value};

/// A normalized leaf value of a flattened record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Only used for integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// Normalizes a JSON scalar: whole-valued floats become integers and
    /// strings are trimmed. Arrays and objects are JSON-encoded.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(number) => Self::from_number(number),
            Value::String(s) => FieldValue::String(s.trim().to_string()),
            Value::Array(_) | Value::Object(_) => FieldValue::String(value.to_string()),
        }
    }

    fn from_number(number: &Number) -> Self {
        if let Some(i) = number.as_i64() {
            return FieldValue::Integer(i);
        }
        if let Some(u) = number.as_u64() {
            return FieldValue::Unsigned(u);
        }

        match number.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                FieldValue::Integer(f as i64)
            }
            Some(f) => FieldValue::Float(f),
            None => FieldValue::String(number.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Unsigned(u) => Some(*u as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text written into a Utf8 column. `None` for a preserved null.
    pub fn to_column_string(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Unsigned(u) => Some(u.to_string()),
            FieldValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some((*f as i64).to_string())
            }
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::String(s) => Some(s.clone()),
        }
    }
}
