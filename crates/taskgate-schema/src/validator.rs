//! # Validator
//!
//! Checks an untyped JSON value against a [`TypeDescriptor`]. The walk is
//! depth-first and stops at the first failure, except inside a union, where
//! every member is tried and all member failures are reported together.
//!
//! ## Modes
//!
//! - [`ValidationMode::Strict`]: kinds must match exactly and records reject
//!   keys they do not declare.
//! - [`ValidationMode::Lenient`]: records ignore undeclared keys and an
//!   integer is accepted where a float is expected. No other coercion
//!   happens; in particular numeric strings are never numbers.
//!
//! In lenient mode a union is first tried strictly, member by member, and
//! only if no member matches is it retried leniently. A value that fits a
//! member exactly is therefore never captured by an earlier member through
//! coercion.
//!
//! `Int` values are `i64`. A JSON integer outside that range, such as
//! `18446744073709551615`, is a type mismatch reported as
//! `integer out of range` in either mode.

use serde_json::{Map, Value};

use crate::descriptor::{PrimitiveKind, RecordType, TypeDescriptor};
use crate::error::SchemaError;
use crate::node::json_kind;
use crate::path::{PathSegment, ValuePath};
use crate::synthesizer::build_type;
use crate::value::ValidatedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidationMode {
    #[default]
    Strict,
    Lenient,
}

impl ValidationMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Validate `value` against `descriptor`.
pub fn validate(
    descriptor: &TypeDescriptor,
    value: &Value,
    mode: ValidationMode,
) -> Result<ValidatedValue, SchemaError> {
    let mut path = ValuePath::root();
    check(descriptor, value, mode, &mut path)
}

/// Build the descriptor for `schema` and validate `message` against it.
pub fn validate_with_schema(
    schema: &Value,
    message: &Value,
    mode: ValidationMode,
) -> Result<ValidatedValue, SchemaError> {
    let descriptor = build_type(schema)?;
    validate(&descriptor, message, mode)
}

fn check(
    descriptor: &TypeDescriptor,
    value: &Value,
    mode: ValidationMode,
    path: &mut ValuePath,
) -> Result<ValidatedValue, SchemaError> {
    match descriptor {
        TypeDescriptor::Any => Ok(ValidatedValue::Any(value.clone())),
        TypeDescriptor::Primitive(kind) => check_primitive(*kind, value, mode, path),
        TypeDescriptor::Enum(e) => {
            if e.values.iter().any(|allowed| allowed == value) {
                Ok(ValidatedValue::Enum(value.clone()))
            } else {
                Err(SchemaError::InvalidEnumValue {
                    path: path.clone(),
                    value: value.clone(),
                    allowed: e.values.clone(),
                })
            }
        }
        TypeDescriptor::Record(record) => match value {
            Value::Object(map) => check_record(record, map, mode, path),
            other => Err(mismatch(descriptor, other, path)),
        },
        TypeDescriptor::List(element) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(i));
                    let checked = check(element, item, mode, path);
                    path.pop();
                    out.push(checked?);
                }
                Ok(ValidatedValue::List(out))
            }
            other => Err(mismatch(descriptor, other, path)),
        },
        TypeDescriptor::Map(values) => match value {
            Value::Object(map) => {
                let mut out = Vec::with_capacity(map.len());
                for (key, item) in map {
                    path.push(PathSegment::Key(key.clone()));
                    let checked = check(values, item, mode, path);
                    path.pop();
                    out.push((key.clone(), checked?));
                }
                Ok(ValidatedValue::Map(out))
            }
            other => Err(mismatch(descriptor, other, path)),
        },
        TypeDescriptor::Union(members) => check_union(members, value, mode, path),
    }
}

fn check_primitive(
    kind: PrimitiveKind,
    value: &Value,
    mode: ValidationMode,
    path: &ValuePath,
) -> Result<ValidatedValue, SchemaError> {
    let type_mismatch = |actual: &str| SchemaError::TypeMismatch {
        path: path.clone(),
        expected: kind.as_str().to_string(),
        actual: actual.to_string(),
    };
    match (kind, value) {
        (PrimitiveKind::Null, Value::Null) => Ok(ValidatedValue::Null),
        (PrimitiveKind::Bool, Value::Bool(b)) => Ok(ValidatedValue::Bool(*b)),
        (PrimitiveKind::String, Value::String(s)) => Ok(ValidatedValue::String(s.clone())),
        (PrimitiveKind::Int, Value::Number(n)) if !n.is_f64() => n
            .as_i64()
            .map(ValidatedValue::Int)
            .ok_or_else(|| type_mismatch("integer out of range")),
        (PrimitiveKind::Float, Value::Number(n)) if n.is_f64() => n
            .as_f64()
            .map(ValidatedValue::Float)
            .ok_or_else(|| type_mismatch("number")),
        (PrimitiveKind::Float, Value::Number(n)) if mode == ValidationMode::Lenient => n
            .as_f64()
            .map(ValidatedValue::Float)
            .ok_or_else(|| type_mismatch("integer")),
        (_, other) => Err(type_mismatch(json_kind(other))),
    }
}

fn check_record(
    record: &RecordType,
    map: &Map<String, Value>,
    mode: ValidationMode,
    path: &mut ValuePath,
) -> Result<ValidatedValue, SchemaError> {
    let mut out = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        path.push(PathSegment::Field(field.name.clone()));
        let checked = match (map.get(&field.name), &field.default) {
            (Some(v), _) => check(&field.descriptor, v, mode, path),
            // Defaults are used as declared, not validated.
            (None, Some(default)) => Ok(ValidatedValue::Any(default.clone())),
            (None, None) => Err(SchemaError::MissingField {
                path: path.clone(),
                field: field.name.clone(),
            }),
        };
        path.pop();
        out.push((field.name.clone(), checked?));
    }

    if mode == ValidationMode::Strict {
        if let Some(extra) = map.keys().find(|k| record.field(k).is_none()) {
            return Err(SchemaError::UnexpectedField {
                path: path.child(PathSegment::Field(extra.clone())),
                field: extra.clone(),
            });
        }
    }
    Ok(ValidatedValue::Record(out))
}

fn check_union(
    members: &[TypeDescriptor],
    value: &Value,
    mode: ValidationMode,
    path: &mut ValuePath,
) -> Result<ValidatedValue, SchemaError> {
    let passes: &[ValidationMode] = match mode {
        ValidationMode::Strict => &[ValidationMode::Strict],
        ValidationMode::Lenient => &[ValidationMode::Strict, ValidationMode::Lenient],
    };
    let mut failures = Vec::new();
    for &pass in passes {
        failures.clear();
        for (member, descriptor) in members.iter().enumerate() {
            match check(descriptor, value, pass, path) {
                Ok(checked) => {
                    return Ok(ValidatedValue::Union {
                        member,
                        value: Box::new(checked),
                    })
                }
                Err(e) => failures.push(e),
            }
        }
    }
    Err(SchemaError::NoUnionMemberMatched {
        path: path.clone(),
        failures,
    })
}

fn mismatch(descriptor: &TypeDescriptor, value: &Value, path: &ValuePath) -> SchemaError {
    SchemaError::TypeMismatch {
        path: path.clone(),
        expected: descriptor.to_string(),
        actual: json_kind(value).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaErrorKind;
    use serde_json::json;

    fn strict(schema: Value, message: Value) -> Result<ValidatedValue, SchemaError> {
        validate_with_schema(&schema, &message, ValidationMode::Strict)
    }

    fn lenient(schema: Value, message: Value) -> Result<ValidatedValue, SchemaError> {
        validate_with_schema(&schema, &message, ValidationMode::Lenient)
    }

    #[test]
    fn accepts_matching_record() {
        let v = strict(
            json!({"properties": {"name": {"type": "string"}, "n": {"type": "integer"}}}),
            json!({"name": "World", "n": 3}),
        )
        .unwrap();
        assert_eq!(v.get("n"), Some(&ValidatedValue::Int(3)));
        assert_eq!(v.to_json(), json!({"name": "World", "n": 3}));
    }

    #[test]
    fn missing_required_field() {
        let err = strict(json!({"properties": {"name": {"type": "string"}}}), json!({})).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::MissingField);
        assert_eq!(err.path().unwrap().to_string(), "name");
    }

    #[test]
    fn default_fills_missing_field() {
        let v = strict(
            json!({"properties": {"count": {"type": "integer", "default": 1}}}),
            json!({}),
        )
        .unwrap();
        assert_eq!(v.to_json(), json!({"count": 1}));
    }

    #[test]
    fn output_follows_declaration_order() {
        let v = strict(
            json!({"properties": {"b": {"type": "integer"}, "a": {"type": "integer"}}}),
            json!({"a": 1, "b": 2}),
        )
        .unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn unknown_keys_by_mode() {
        let schema = json!({"properties": {"a": {"type": "integer"}}});
        let err = strict(schema.clone(), json!({"a": 1, "extra": true})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnexpectedField {
                path: ValuePath::root().child(PathSegment::Field("extra".into())),
                field: "extra".into(),
            }
        );
        let v = lenient(schema, json!({"a": 1, "extra": true})).unwrap();
        assert_eq!(v.to_json(), json!({"a": 1}));
    }

    #[test]
    fn int_to_float_only_when_lenient() {
        let schema = json!({"type": "number"});
        assert!(matches!(
            strict(schema.clone(), json!(2)),
            Err(SchemaError::TypeMismatch { ref actual, .. }) if actual == "integer"
        ));
        assert_eq!(lenient(schema.clone(), json!(2)).unwrap(), ValidatedValue::Float(2.0));
        assert_eq!(strict(schema, json!(2.5)).unwrap(), ValidatedValue::Float(2.5));
    }

    #[test]
    fn no_string_coercion() {
        for mode in [ValidationMode::Strict, ValidationMode::Lenient] {
            let err = validate_with_schema(&json!({"type": "integer"}), &json!("5"), mode).unwrap_err();
            assert_eq!(
                err,
                SchemaError::TypeMismatch {
                    path: ValuePath::root(),
                    expected: "int".into(),
                    actual: "string".into(),
                }
            );
        }
    }

    #[test]
    fn float_is_not_int() {
        assert!(lenient(json!({"type": "integer"}), json!(1.0)).is_err());
    }

    #[test]
    fn int_out_of_range() {
        let err = strict(json!({"type": "integer"}), json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { ref actual, .. } if actual == "integer out of range"));
    }

    #[test]
    fn enum_membership() {
        let schema = json!({"enum": ["red", "green"]});
        assert_eq!(
            strict(schema.clone(), json!("green")).unwrap(),
            ValidatedValue::Enum(json!("green"))
        );
        let err = strict(schema, json!("blue")).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::InvalidEnumValue);
    }

    #[test]
    fn list_errors_carry_index() {
        let err = strict(
            json!({"properties": {"xs": {"type": "array", "items": {"type": "integer"}}}}),
            json!({"xs": [1, 2, "three"]}),
        )
        .unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "xs[2]");
    }

    #[test]
    fn map_errors_carry_key() {
        let err = strict(
            json!({"type": "object", "additionalProperties": {"type": "string"}}),
            json!({"ok": "x", "bad": 1}),
        )
        .unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), r#"["bad"]"#);
    }

    #[test]
    fn map_keys_pass_through() {
        let v = strict(
            json!({"type": "object", "additionalProperties": {"type": "integer"}}),
            json!({"Zeta Key": 1, "a": 2}),
        )
        .unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"Zeta Key":1,"a":2}"#);
    }

    #[test]
    fn union_first_match_wins() {
        let schema = json!({"anyOf": [{"type": "string"}, {"type": "integer"}]});
        assert!(matches!(strict(schema.clone(), json!("x")).unwrap(), ValidatedValue::Union { member: 0, .. }));
        assert!(matches!(strict(schema.clone(), json!(5)).unwrap(), ValidatedValue::Union { member: 1, .. }));
        let SchemaError::NoUnionMemberMatched { failures, .. } = strict(schema, json!(true)).unwrap_err() else {
            panic!("expected union failure");
        };
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn lenient_union_prefers_exact_match() {
        let schema = json!({"anyOf": [{"type": "number"}, {"type": "integer"}]});
        let v = lenient(schema.clone(), json!(7)).unwrap();
        assert_eq!(
            v,
            ValidatedValue::Union {
                member: 1,
                value: Box::new(ValidatedValue::Int(7)),
            }
        );
        let float_only = json!({"anyOf": [{"type": "string"}, {"type": "number"}]});
        let v = lenient(float_only.clone(), json!(7)).unwrap();
        assert_eq!(
            v,
            ValidatedValue::Union {
                member: 1,
                value: Box::new(ValidatedValue::Float(7.0)),
            }
        );
        assert!(strict(float_only, json!(7)).is_err());
    }

    #[test]
    fn nullable_field() {
        let schema = json!({"properties": {"x": {"anyOf": [{"type": "string"}, {"type": "null"}], "default": null}}});
        assert_eq!(strict(schema.clone(), json!({})).unwrap().to_json(), json!({"x": null}));
        assert_eq!(strict(schema, json!({"x": "y"})).unwrap().to_json(), json!({"x": "y"}));
    }

    #[test]
    fn record_expects_object() {
        let err = strict(json!({"title": "P", "properties": {}}), json!([1])).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                path: ValuePath::root(),
                expected: "record P".into(),
                actual: "array".into(),
            }
        );
    }

    #[test]
    fn any_passes_through() {
        let v = strict(json!({"properties": {"blob": {}}}), json!({"blob": {"deep": [1, {"x": null}]}})).unwrap();
        assert_eq!(v.to_json(), json!({"blob": {"deep": [1, {"x": null}]}}));
    }

    #[test]
    fn build_errors_pass_through() {
        let err = strict(json!({"properties": {"x": {"$ref": "#/$defs/Gone"}}}), json!({})).unwrap_err();
        assert!(err.kind().is_build_time());
    }
}
