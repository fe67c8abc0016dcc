//! # Schema Subcommand
//!
//! Offline access to the schema engine, for task authors checking a
//! parameter schema before registering it:
//!
//! - `taskgate schema check <SCHEMA>`: definition order and descriptor.
//! - `taskgate schema validate <SCHEMA> <MESSAGE>`: the validated message.
//! - `taskgate schema args <SCHEMA> <MESSAGE>`: the arguments a job
//!   launched with this message would receive.
//!
//! Schema and message files may be JSON or YAML.
//!
//! Exit codes: 0 on success, 1 when the schema does not build or the
//! message does not validate. Unreadable files are operational errors.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value};

use taskgate_core::JobId;
use taskgate_schema::{
    build_type_with, check_schema_document, flatten_arguments, flatten_job_arguments,
    load_document, resolve_definitions_with, validate, BuildOptions, SchemaError, ValidationMode,
};

/// Arguments for the `taskgate schema` subcommand.
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Deepest schema nesting accepted.
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    #[command(subcommand)]
    pub command: SchemaCommand,
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Build a schema and print its definition order and descriptor.
    Check {
        /// Schema document (JSON or YAML).
        schema: PathBuf,
    },

    /// Validate a message against a schema and print the validated value.
    Validate {
        schema: PathBuf,
        /// Message document (JSON or YAML).
        message: PathBuf,
        /// Reject unknown fields and integers where a float is expected.
        #[arg(long)]
        strict: bool,
    },

    /// Print the command-line arguments a job would receive.
    Args {
        schema: PathBuf,
        message: PathBuf,
        /// Append `--job_id <ID>`, as the gateway does at launch.
        #[arg(long)]
        job_id: Option<JobId>,
        #[arg(long)]
        strict: bool,
    },
}

/// Outcome of a schema command: what to print, and whether it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub output: String,
    pub ok: bool,
}

impl Report {
    fn ok(output: String) -> Self {
        Self { output, ok: true }
    }

    fn failed(err: &SchemaError) -> Self {
        Self {
            output: format!("FAIL [{}]: {err}", err.kind()),
            ok: false,
        }
    }
}

/// Execute the schema subcommand.
pub fn run_schema(args: &SchemaArgs) -> Result<u8> {
    let mut options = BuildOptions::default();
    if let Some(depth) = args.max_depth {
        options.max_depth = depth;
    }

    let report = match &args.command {
        SchemaCommand::Check { schema } => check_report(&load(schema)?, &options),
        SchemaCommand::Validate {
            schema,
            message,
            strict,
        } => validate_report(&load(schema)?, &load(message)?, *strict, &options),
        SchemaCommand::Args {
            schema,
            message,
            job_id,
            strict,
        } => args_report(&load(schema)?, &load(message)?, *job_id, *strict, &options),
    };

    println!("{}", report.output);
    Ok(if report.ok { 0 } else { 1 })
}

fn load(path: &Path) -> Result<Value> {
    let value = load_document(path).with_context(|| format!("failed to load {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded document");
    Ok(value)
}

/// Meta-check and build `schema`, listing record definitions in the order
/// they are built, followed by the root descriptor as JSON.
pub fn check_report(schema: &Value, options: &BuildOptions) -> Report {
    if let Err(e) = check_schema_document(schema) {
        return Report {
            output: format!("FAIL [invalid_json_schema]: {e}"),
            ok: false,
        };
    }
    let empty = Map::new();
    let defs = schema.get("$defs").and_then(Value::as_object).unwrap_or(&empty);

    let order = match resolve_definitions_with(defs, options) {
        Ok(order) => order,
        Err(e) => return Report::failed(&e),
    };
    let descriptor = match build_type_with(schema, options) {
        Ok(descriptor) => descriptor,
        Err(e) => return Report::failed(&e),
    };

    let mut output = String::from("Definitions (build order):\n");
    if order.is_empty() {
        output.push_str("  (none)\n");
    }
    for (i, name) in order.iter().enumerate() {
        output.push_str(&format!("  {}. {name}\n", i + 1));
    }
    output.push_str(&format!("Root: {descriptor}\n"));
    output.push_str(&pretty(&descriptor));
    Report::ok(output)
}

/// Validate `message` against `schema` and render the validated value.
pub fn validate_report(schema: &Value, message: &Value, strict: bool, options: &BuildOptions) -> Report {
    match validated(schema, message, strict, options) {
        Ok(value) => Report::ok(pretty(&value)),
        Err(e) => Report::failed(&e),
    }
}

/// Validate `message` and render the job arguments, one per line.
pub fn args_report(
    schema: &Value,
    message: &Value,
    job_id: Option<JobId>,
    strict: bool,
    options: &BuildOptions,
) -> Report {
    let value = match validated(schema, message, strict, options) {
        Ok(value) => value,
        Err(e) => return Report::failed(&e),
    };
    let args = match job_id {
        Some(id) => flatten_job_arguments(&value, &id.to_string()),
        None => flatten_arguments(&value),
    };
    Report::ok(args.join("\n"))
}

fn validated(schema: &Value, message: &Value, strict: bool, options: &BuildOptions) -> Result<Value, SchemaError> {
    let descriptor = build_type_with(schema, options)?;
    let value = validate(&descriptor, message, ValidationMode::from_strict(strict))?;
    Ok(value.to_json())
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> BuildOptions {
        BuildOptions::default()
    }

    #[test]
    fn check_lists_definitions_in_build_order() {
        let schema = json!({
            "$defs": {
                "Outer": {"type": "object", "properties": {"inner": {"$ref": "#/$defs/Inner"}}},
                "Inner": {"type": "object", "properties": {"v": {"type": "integer"}}},
            },
            "type": "object",
            "properties": {"o": {"$ref": "#/$defs/Outer"}},
        });
        let report = check_report(&schema, &opts());
        assert!(report.ok, "{}", report.output);
        let inner = report.output.find("1. Inner").unwrap();
        let outer = report.output.find("2. Outer").unwrap();
        assert!(inner < outer);
        assert!(report.output.contains("Root: record Root"));
    }

    #[test]
    fn check_reports_cycles() {
        let schema = json!({
            "$defs": {"A": {"properties": {"a": {"$ref": "#/$defs/A"}}}},
            "properties": {"a": {"$ref": "#/$defs/A"}},
        });
        let report = check_report(&schema, &opts());
        assert!(!report.ok);
        assert!(report.output.starts_with("FAIL [circular_dependency]"));
    }

    #[test]
    fn check_rejects_invalid_json_schema() {
        let report = check_report(&json!({"type": 7}), &opts());
        assert!(!report.ok);
        assert!(report.output.contains("invalid_json_schema"));
    }

    #[test]
    fn check_honors_depth_limit() {
        let schema = json!({"properties": {"a": {"properties": {"b": {"properties": {"c": {"type": "string"}}}}}}});
        assert!(check_report(&schema, &opts()).ok);
        let report = check_report(&schema, &BuildOptions { max_depth: 2 });
        assert!(report.output.contains("depth_limit_exceeded"));
    }

    #[test]
    fn validate_prints_value_with_defaults() {
        let schema = json!({"properties": {"name": {"type": "string"}, "n": {"type": "integer", "default": 3}}});
        let report = validate_report(&schema, &json!({"name": "x"}), true, &opts());
        assert!(report.ok);
        let value: Value = serde_json::from_str(&report.output).unwrap();
        assert_eq!(value, json!({"name": "x", "n": 3}));
    }

    #[test]
    fn validate_failure_names_kind_and_path() {
        let schema = json!({"properties": {"name": {"type": "string"}}});
        let report = validate_report(&schema, &json!({"name": 1}), false, &opts());
        assert!(!report.ok);
        assert_eq!(report.output, "FAIL [type_mismatch]: name: expected string, found integer");
    }

    #[test]
    fn args_include_job_id_when_given() {
        let schema = json!({"properties": {"model": {"properties": {"size": {"type": "string"}}}}});
        let message = json!({"model": {"size": "large"}});
        let id: JobId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();

        let report = args_report(&schema, &message, None, false, &opts());
        assert_eq!(report.output, "--model.size\nlarge");

        let report = args_report(&schema, &message, Some(id), false, &opts());
        assert_eq!(
            report.output,
            "--model.size\nlarge\n--job_id\n67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }
}
