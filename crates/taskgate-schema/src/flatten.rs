//! Command-line rendering of validated parameters.
//!
//! A job receives its parameters as `--name value` pairs. Nested records
//! flatten to dotted names (`--model.size large`); lists are passed as a
//! single JSON-encoded argument; strings are passed verbatim; other scalars
//! use their JSON spelling (`true`, `3`, `null`).

use serde_json::Value;

/// Flatten a parameters object into `--key value` arguments, in key order.
///
/// Anything other than an object has no named parameters and yields no
/// arguments. Empty nested objects contribute nothing.
pub fn flatten_arguments(value: &Value) -> Vec<String> {
    let mut args = Vec::new();
    if let Value::Object(map) = value {
        for (key, child) in map {
            push_flattened(key, child, &mut args);
        }
    }
    args
}

/// Flatten parameters for a job launch, appending the job id as `--job_id`.
///
/// A `job_id` parameter supplied by the caller is replaced.
pub fn flatten_job_arguments(parameters: &Value, job_id: &str) -> Vec<String> {
    let mut with_id = match parameters {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    with_id.insert("job_id".to_string(), Value::String(job_id.to_string()));
    flatten_arguments(&Value::Object(with_id))
}

fn push_flattened(name: &str, value: &Value, args: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                push_flattened(&format!("{name}.{key}"), child, args);
            }
        }
        Value::String(s) => {
            args.push(format!("--{name}"));
            args.push(s.clone());
        }
        other => {
            args.push(format!("--{name}"));
            args.push(other.to_string());
        }
    }
}
