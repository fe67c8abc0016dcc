//! Values shaped by a descriptor.
//!
//! A [`ValidatedValue`] mirrors the descriptor it was checked against, so
//! callers can tell an `Int` from a `Float` or see which union member
//! matched. [`ValidatedValue::to_json`] turns it back into the JSON it was
//! read from, with record fields in declaration order and defaults filled
//! in.

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// One of an enum's literals.
    Enum(Value),
    /// Fields in declaration order, including defaulted ones.
    Record(Vec<(String, ValidatedValue)>),
    List(Vec<ValidatedValue>),
    /// Entries in input order.
    Map(Vec<(String, ValidatedValue)>),
    /// The value matched union member `member` (zero-based).
    Union {
        member: usize,
        value: Box<ValidatedValue>,
    },
    /// Passed through unchecked: `Any` descriptors and filled-in defaults.
    Any(Value),
}

impl ValidatedValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            // Non-finite floats cannot come out of JSON input.
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::Enum(v) | Self::Any(v) => v.clone(),
            Self::Record(fields) | Self::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Union { value, .. } => value.to_json(),
        }
    }

    /// Look up a record field or map entry by name.
    pub fn get(&self, key: &str) -> Option<&ValidatedValue> {
        match self {
            Self::Record(entries) | Self::Map(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            Self::Union { value, .. } => value.get(key),
            _ => None,
        }
    }
}

impl Serialize for ValidatedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
