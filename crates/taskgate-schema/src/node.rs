//! Read-only view over one JSON Schema node.
//!
//! Only the keywords the synthesizer understands are exposed. Anything else
//! in the document (`$schema`, `format`, `minimum`, ...) is ignored.

use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Keys that give a node its shape. A `$ref` may not be combined with any
/// of them.
pub(crate) const STRUCTURAL_KEYS: &[&str] = &[
    "type",
    "properties",
    "anyOf",
    "items",
    "additionalProperties",
    "enum",
];

/// Prefix of every reference this engine resolves.
pub const DEFS_PREFIX: &str = "#/$defs/";

#[derive(Debug, Clone, Copy)]
pub(crate) struct SchemaNode<'a> {
    map: &'a Map<String, Value>,
    pointer: &'a str,
}

impl<'a> SchemaNode<'a> {
    /// Wrap a value that must be a JSON object.
    pub(crate) fn new(value: &'a Value, pointer: &'a str) -> Result<Self, SchemaError> {
        match value {
            Value::Object(map) => Ok(Self { map, pointer }),
            other => Err(SchemaError::malformed(
                pointer,
                format!("schema node must be an object, found {}", json_kind(other)),
            )),
        }
    }

    pub(crate) fn pointer(&self) -> &'a str {
        self.pointer
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub(crate) fn title(&self) -> Option<&'a str> {
        self.map.get("title").and_then(Value::as_str)
    }

    pub(crate) fn description(&self) -> Option<&'a str> {
        self.map.get("description").and_then(Value::as_str)
    }

    pub(crate) fn default(&self) -> Option<&'a Value> {
        self.map.get("default")
    }

    pub(crate) fn reference(&self) -> Result<Option<&'a str>, SchemaError> {
        match self.map.get("$ref") {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(SchemaError::malformed(self.pointer, "$ref must be a string")),
        }
    }

    pub(crate) fn type_name(&self) -> Result<Option<&'a str>, SchemaError> {
        match self.map.get("type") {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(SchemaError::malformed(
                self.pointer,
                format!("type must be a string, found {}", json_kind(other)),
            )),
        }
    }

    pub(crate) fn any_of(&self) -> Result<Option<&'a Vec<Value>>, SchemaError> {
        match self.map.get("anyOf") {
            None => Ok(None),
            Some(Value::Array(members)) if !members.is_empty() => Ok(Some(members)),
            Some(_) => Err(SchemaError::malformed(
                self.pointer,
                "anyOf must be a non-empty array",
            )),
        }
    }

    pub(crate) fn enum_values(&self) -> Result<Option<&'a Vec<Value>>, SchemaError> {
        match self.map.get("enum") {
            None => Ok(None),
            Some(Value::Array(values)) if !values.is_empty() => Ok(Some(values)),
            Some(_) => Err(SchemaError::malformed(
                self.pointer,
                "enum must be a non-empty array",
            )),
        }
    }

    pub(crate) fn properties(&self) -> Result<Option<&'a Map<String, Value>>, SchemaError> {
        match self.map.get("properties") {
            None => Ok(None),
            Some(Value::Object(props)) => Ok(Some(props)),
            Some(_) => Err(SchemaError::malformed(self.pointer, "properties must be an object")),
        }
    }

    /// `additionalProperties` when it holds a schema. The boolean form only
    /// toggles extra keys and does not describe a map.
    pub(crate) fn additional_properties(&self) -> Option<&'a Value> {
        self.map
            .get("additionalProperties")
            .filter(|v| v.is_object())
    }

    pub(crate) fn structural_sibling(&self) -> Option<&'static str> {
        STRUCTURAL_KEYS.iter().copied().find(|k| self.map.contains_key(*k))
    }
}

/// Extend a JSON pointer by one token, escaping per RFC 6901.
pub(crate) fn child_pointer(parent: &str, token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

/// JSON kind of a value, as reported in type mismatches.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
