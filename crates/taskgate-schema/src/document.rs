//! # Schema Documents
//!
//! Loading schema and message documents from disk, and the JSON Schema
//! meta-check applied to every schema before it is accepted for a task.
//!
//! The engine in this crate only understands a subset of JSON Schema, but a
//! document outside that subset must still be a valid JSON Schema. The
//! meta-check is delegated to the `jsonschema` crate so that typos such as
//! `"type": "strng"` or `"required": "name"` are rejected at registration
//! rather than at first execution.
//!
//! Schemas arrive from API callers, so the meta-check never leaves the
//! document: every external `$ref` (`file://`, `http://`, relative paths)
//! is refused without a lookup. Only `#/$defs/...` pointers are resolved
//! by this engine anyway.

use std::path::Path;

use jsonschema::{Retrieve, Uri};
use serde_json::Value;
use thiserror::Error;

/// Failure to load or accept a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file could not be read or parsed.
    #[error("document load error for '{path}': {reason}")]
    Load {
        /// Path to the document.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// The document is not a valid JSON Schema.
    #[error("invalid JSON Schema: {reason}")]
    InvalidSchema {
        /// The meta-validation failure.
        reason: String,
    },
}

/// Read a JSON or YAML document.
///
/// `.yaml` and `.yml` files are parsed as YAML; everything else as JSON.
/// Key order is preserved in both cases.
pub fn load_document(path: &Path) -> Result<Value, DocumentError> {
    let load_err = |reason: String| DocumentError::Load {
        path: path.display().to_string(),
        reason,
    };
    let content =
        std::fs::read_to_string(path).map_err(|e| load_err(format!("cannot read file: {e}")))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yaml" | "yml" => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
                .map_err(|e| load_err(format!("invalid YAML: {e}")))?;
            yaml_to_json_value(&yaml)
                .map_err(|e| load_err(format!("YAML-to-JSON conversion failed: {e}")))
        }
        _ => serde_json::from_str(&content).map_err(|e| load_err(format!("invalid JSON: {e}"))),
    }
}

/// Retriever that refuses every external resource, so compiling a schema
/// never touches the filesystem or the network.
struct NoExternalRefs;

impl Retrieve for NoExternalRefs {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("external reference {} is not allowed", uri.as_str()).into())
    }
}

/// Meta-validate `schema` as a JSON Schema document.
pub fn check_schema_document(schema: &Value) -> Result<(), DocumentError> {
    if !schema.is_object() {
        return Err(DocumentError::InvalidSchema {
            reason: "a task schema must be a JSON object".to_string(),
        });
    }
    let mut options = jsonschema::options();
    options.with_retriever(NoExternalRefs);
    options
        .build(schema)
        .map(|_| ())
        .map_err(|e| DocumentError::InvalidSchema {
            reason: e.to_string(),
        })
}

/// Convert YAML to JSON. Tags are dropped; scalar map keys become strings.
fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key: {other:?}")),
                };
                object.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}
