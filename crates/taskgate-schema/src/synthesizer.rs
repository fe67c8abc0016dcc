//! # Type Synthesizer
//!
//! Maps JSON Schema nodes to [`TypeDescriptor`]s. A node's shape is decided
//! by the first rule that applies:
//!
//! 1. `$ref` → the already-built descriptor for that pointer
//! 2. `anyOf` → `Union` of the members, in order
//! 3. `enum` → `Enum` of the literals, in order
//! 4. `type: array` → `List` of `items` (or `Any`)
//! 5. `type: object` with a schema-valued `additionalProperties` → `Map`
//! 6. `properties` → `Record` with one field per property, in order
//! 7. `type` → primitive; a node without `type` accepts anything
//!
//! [`build_type`] drives the whole document: enum definitions first, then
//! the other non-record definitions in declaration order, then record
//! definitions in resolver order, then the root.
//!
//! The depth limit applies to the resolved type, not just to the nesting of
//! one node: a `$ref` contributes the height of the definition it points
//! to. Each definition's height is recorded once when it is built, so a
//! long chain of definitions costs one pass.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::descriptor::{EnumType, Field, PrimitiveKind, RecordType, TypeDescriptor};
use crate::error::SchemaError;
use crate::node::{child_pointer, SchemaNode, DEFS_PREFIX};
use crate::resolver::{is_record_definition, resolve_definitions_with};

/// Default bound on schema nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Descriptors built so far, keyed by reference pointer (`#/$defs/<name>`).
pub type Definitions = HashMap<String, TypeDescriptor>;

/// Height of each built definition, keyed like [`Definitions`].
type Heights = HashMap<String, usize>;

/// Limits applied while building descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Deepest schema nesting accepted, counting the node being built as 1.
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Where a node sits, which decides the name of a record or enum built
/// from it.
#[derive(Debug, Clone, Copy)]
enum NameHint<'a> {
    Definition(&'a str),
    Property(&'a str),
    Root,
}

struct Synthesizer<'a> {
    resolved: &'a Definitions,
    heights: &'a Heights,
    max_depth: usize,
    /// Deepest level reached so far, counting through references.
    deepest: Cell<usize>,
}

impl<'a> Synthesizer<'a> {
    fn new(resolved: &'a Definitions, heights: &'a Heights, max_depth: usize) -> Self {
        Self {
            resolved,
            heights,
            max_depth,
            deepest: Cell::new(0),
        }
    }

    fn reach(&self, level: usize) -> Result<(), SchemaError> {
        if level > self.max_depth {
            return Err(SchemaError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        self.deepest.set(self.deepest.get().max(level));
        Ok(())
    }

    fn node(
        &self,
        value: &Value,
        pointer: &str,
        hint: NameHint<'_>,
        depth: usize,
    ) -> Result<TypeDescriptor, SchemaError> {
        self.reach(depth)?;
        let node = SchemaNode::new(value, pointer)?;

        if let Some(reference) = node.reference()? {
            if let Some(key) = node.structural_sibling() {
                return Err(SchemaError::malformed(
                    pointer,
                    format!("$ref cannot be combined with {key:?}"),
                ));
            }
            let target = self.resolved.get(reference).ok_or_else(|| {
                SchemaError::UnresolvedReference {
                    reference: reference.to_string(),
                }
            })?;
            let height = match self.heights.get(reference) {
                Some(height) => *height,
                None => target.depth(),
            };
            self.reach(depth + height - 1)?;
            return Ok(target.clone());
        }

        if let Some(members) = node.any_of()? {
            let base = child_pointer(pointer, "anyOf");
            let members = members
                .iter()
                .enumerate()
                .map(|(i, m)| self.node(m, &child_pointer(&base, &i.to_string()), hint, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(TypeDescriptor::Union(members));
        }

        if let Some(values) = node.enum_values()? {
            return Ok(TypeDescriptor::Enum(Arc::new(EnumType {
                name: type_name(&node, hint),
                values: values.clone(),
            })));
        }

        let ty = node.type_name()?;

        if ty == Some("array") {
            let element = match node.get("items") {
                None => TypeDescriptor::Any,
                Some(items) => self.node(items, &child_pointer(pointer, "items"), hint, depth + 1)?,
            };
            return Ok(TypeDescriptor::List(Box::new(element)));
        }

        if ty == Some("object") {
            if let Some(values) = node.additional_properties() {
                let pointer = child_pointer(pointer, "additionalProperties");
                let value = self.node(values, &pointer, hint, depth + 1)?;
                return Ok(TypeDescriptor::Map(Box::new(value)));
            }
        }

        if let Some(props) = node.properties()? {
            return self.record(&node, props, hint, depth);
        }

        match ty {
            None | Some("any") => Ok(TypeDescriptor::Any),
            Some("string") => Ok(TypeDescriptor::Primitive(PrimitiveKind::String)),
            Some("integer") => Ok(TypeDescriptor::Primitive(PrimitiveKind::Int)),
            Some("number") => Ok(TypeDescriptor::Primitive(PrimitiveKind::Float)),
            Some("boolean") => Ok(TypeDescriptor::Primitive(PrimitiveKind::Bool)),
            Some("null") => Ok(TypeDescriptor::Primitive(PrimitiveKind::Null)),
            Some("object") => Ok(TypeDescriptor::Map(Box::new(TypeDescriptor::Any))),
            Some(other) => Err(SchemaError::malformed(
                pointer,
                format!("unknown type {other:?}"),
            )),
        }
    }

    fn record(
        &self,
        node: &SchemaNode<'_>,
        props: &Map<String, Value>,
        hint: NameHint<'_>,
        depth: usize,
    ) -> Result<TypeDescriptor, SchemaError> {
        let base = child_pointer(node.pointer(), "properties");
        let mut fields = Vec::with_capacity(props.len());
        for (name, prop) in props {
            let pointer = child_pointer(&base, name);
            let descriptor = self.node(prop, &pointer, NameHint::Property(name), depth + 1)?;
            let prop = SchemaNode::new(prop, &pointer)?;
            let default = prop.default().cloned();
            fields.push(Field {
                name: name.clone(),
                descriptor,
                description: prop.description().map(str::to_string),
                required: default.is_none(),
                default,
            });
        }
        Ok(TypeDescriptor::Record(Arc::new(RecordType {
            name: type_name(node, hint),
            fields,
        })))
    }
}

/// Definition name, else title, else property name. The root is named
/// `Root` when it has no title.
fn type_name(node: &SchemaNode<'_>, hint: NameHint<'_>) -> String {
    match (hint, node.title()) {
        (NameHint::Definition(name), _) => name.to_string(),
        (_, Some(title)) => title.to_string(),
        (NameHint::Property(name), None) => name.to_string(),
        (NameHint::Root, None) => "Root".to_string(),
    }
}

/// Synthesize one node against the descriptors built so far.
///
/// A record built here is named after its `title`, or `Root` when untitled.
pub fn synthesize(node: &Value, resolved: &Definitions) -> Result<TypeDescriptor, SchemaError> {
    Synthesizer::new(resolved, &Heights::new(), DEFAULT_MAX_DEPTH).node(node, "", NameHint::Root, 1)
}

/// Build the descriptor of a whole schema document with default options.
pub fn build_type(root: &Value) -> Result<TypeDescriptor, SchemaError> {
    build_type_with(root, &BuildOptions::default())
}

/// Build the descriptor of a whole schema document.
pub fn build_type_with(root: &Value, options: &BuildOptions) -> Result<TypeDescriptor, SchemaError> {
    SchemaNode::new(root, "")?;
    let empty = Map::new();
    let defs = match root.get("$defs") {
        None => &empty,
        Some(Value::Object(defs)) => defs,
        Some(_) => return Err(SchemaError::malformed("/$defs", "$defs must be an object")),
    };

    let order = resolve_definitions_with(defs, options)?;
    let mut resolved = Definitions::with_capacity(defs.len());
    let mut heights = Heights::with_capacity(defs.len());

    let enum_only = |def: &Value| {
        def.get("enum").is_some()
            && !is_record_definition(def)
            && def.get("$ref").is_none()
            && def.get("anyOf").is_none()
    };

    for (name, def) in defs.iter().filter(|(_, d)| enum_only(d)) {
        let (descriptor, height) = build_definition(name, def, &resolved, &heights, options)?;
        let key = format!("{DEFS_PREFIX}{name}");
        heights.insert(key.clone(), height);
        resolved.insert(key, descriptor);
    }

    for (name, def) in defs
        .iter()
        .filter(|(_, d)| !enum_only(d) && !is_record_definition(d))
    {
        let (descriptor, height) = build_definition(name, def, &resolved, &heights, options)?;
        let key = format!("{DEFS_PREFIX}{name}");
        heights.insert(key.clone(), height);
        resolved.insert(key, descriptor);
    }

    for name in &order {
        let Some(def) = defs.get(name) else {
            continue;
        };
        let (descriptor, height) = build_definition(name, def, &resolved, &heights, options)?;
        let key = format!("{DEFS_PREFIX}{name}");
        heights.insert(key.clone(), height);
        resolved.insert(key, descriptor);
    }

    Synthesizer::new(&resolved, &heights, options.max_depth).node(root, "", NameHint::Root, 1)
}

/// Build one definition, returning its descriptor and resolved height.
fn build_definition(
    name: &str,
    def: &Value,
    resolved: &Definitions,
    heights: &Heights,
    options: &BuildOptions,
) -> Result<(TypeDescriptor, usize), SchemaError> {
    let pointer = child_pointer("/$defs", name);
    let synth = Synthesizer::new(resolved, heights, options.max_depth);
    let descriptor = synth.node(def, &pointer, NameHint::Definition(name), 1)?;
    Ok((descriptor, synth.deepest.get()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(d: &TypeDescriptor) -> &RecordType {
        d.as_record().expect("record descriptor")
    }

    #[test]
    fn primitive_map() {
        let cases = [
            ("string", TypeDescriptor::Primitive(PrimitiveKind::String)),
            ("integer", TypeDescriptor::Primitive(PrimitiveKind::Int)),
            ("number", TypeDescriptor::Primitive(PrimitiveKind::Float)),
            ("boolean", TypeDescriptor::Primitive(PrimitiveKind::Bool)),
            ("null", TypeDescriptor::Primitive(PrimitiveKind::Null)),
            ("any", TypeDescriptor::Any),
            ("object", TypeDescriptor::Map(Box::new(TypeDescriptor::Any))),
            ("array", TypeDescriptor::List(Box::new(TypeDescriptor::Any))),
        ];
        for (ty, expected) in cases {
            assert_eq!(
                synthesize(&json!({"type": ty}), &Definitions::new()).unwrap(),
                expected,
                "type {ty}"
            );
        }
    }

    #[test]
    fn missing_type_is_any() {
        assert_eq!(
            synthesize(&json!({"description": "whatever"}), &Definitions::new()).unwrap(),
            TypeDescriptor::Any
        );
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = build_type(&json!({"properties": {"x": {"type": "decimal"}}})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MalformedSchema {
                pointer: "/properties/x".into(),
                reason: "unknown type \"decimal\"".into(),
            }
        );
    }

    #[test]
    fn record_fields_follow_declaration_order() {
        let d = build_type(&json!({
            "title": "Params",
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "integer", "default": 3, "description": "count"},
                "mid": {"type": "boolean"},
            }
        }))
        .unwrap();
        let r = record(&d);
        assert_eq!(r.name, "Params");
        let names: Vec<_> = r.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert!(r.fields[0].required);
        assert!(!r.fields[1].required);
        assert_eq!(r.fields[1].default, Some(json!(3)));
        assert_eq!(r.fields[1].description.as_deref(), Some("count"));
    }

    #[test]
    fn untitled_root_is_named_root() {
        let d = build_type(&json!({"properties": {}})).unwrap();
        assert_eq!(record(&d).name, "Root");
    }

    #[test]
    fn explicit_null_default_makes_field_optional() {
        let d = build_type(&json!({"properties": {"x": {"type": "string", "default": null}}})).unwrap();
        let f = &record(&d).fields[0];
        assert!(!f.required);
        assert_eq!(f.default, Some(Value::Null));
    }

    #[test]
    fn refs_resolve_in_dependency_order() {
        let d = build_type(&json!({
            "$defs": {
                "Person": {"type": "object", "properties": {"home": {"$ref": "#/$defs/Addr"}}},
                "Addr": {"type": "object", "properties": {"city": {"type": "string"}}},
            },
            "type": "object",
            "properties": {"owner": {"$ref": "#/$defs/Person"}},
        }))
        .unwrap();
        let owner = record(&record(&d).fields[0].descriptor);
        assert_eq!(owner.name, "Person");
        let home = record(&owner.fields[0].descriptor);
        assert_eq!(home.name, "Addr");
    }

    #[test]
    fn enum_naming_rules() {
        let d = build_type(&json!({
            "$defs": {"Color": {"title": "Ignored", "enum": ["red", "green"]}},
            "properties": {
                "color": {"$ref": "#/$defs/Color"},
                "size": {"title": "Size", "enum": ["s", "m"]},
                "mode": {"enum": [1, 2]},
            }
        }))
        .unwrap();
        let names: Vec<_> = record(&d)
            .fields
            .iter()
            .map(|f| match &f.descriptor {
                TypeDescriptor::Enum(e) => e.name.clone(),
                other => panic!("expected enum, got {other}"),
            })
            .collect();
        assert_eq!(names, ["Color", "Size", "mode"]);
    }

    #[test]
    fn enum_literals_keep_order() {
        let d = synthesize(&json!({"enum": ["b", "a", 3, null]}), &Definitions::new()).unwrap();
        let TypeDescriptor::Enum(e) = d else {
            panic!("expected enum")
        };
        assert_eq!(e.values, vec![json!("b"), json!("a"), json!(3), Value::Null]);
    }

    #[test]
    fn any_of_becomes_union() {
        let d = synthesize(
            &json!({"anyOf": [{"type": "string"}, {"type": "integer"}]}),
            &Definitions::new(),
        )
        .unwrap();
        assert_eq!(
            d,
            TypeDescriptor::Union(vec![
                TypeDescriptor::Primitive(PrimitiveKind::String),
                TypeDescriptor::Primitive(PrimitiveKind::Int),
            ])
        );
    }

    #[test]
    fn additional_properties_schema_becomes_map() {
        let d = synthesize(
            &json!({
                "type": "object",
                "properties": {"ignored": {"type": "string"}},
                "additionalProperties": {"type": "integer"},
            }),
            &Definitions::new(),
        )
        .unwrap();
        assert_eq!(
            d,
            TypeDescriptor::Map(Box::new(TypeDescriptor::Primitive(PrimitiveKind::Int)))
        );
    }

    #[test]
    fn boolean_additional_properties_keeps_record() {
        let d = synthesize(
            &json!({"type": "object", "additionalProperties": false, "properties": {"a": {}}}),
            &Definitions::new(),
        )
        .unwrap();
        assert!(d.as_record().is_some());
    }

    #[test]
    fn array_items() {
        let d = synthesize(
            &json!({"type": "array", "items": {"type": "number"}}),
            &Definitions::new(),
        )
        .unwrap();
        assert_eq!(
            d,
            TypeDescriptor::List(Box::new(TypeDescriptor::Primitive(PrimitiveKind::Float)))
        );
    }

    #[test]
    fn ref_with_annotation_siblings_is_allowed() {
        let d = build_type(&json!({
            "$defs": {"Id": {"type": "string"}},
            "properties": {"id": {"$ref": "#/$defs/Id", "description": "the id", "default": "x"}},
        }))
        .unwrap();
        let f = &record(&d).fields[0];
        assert_eq!(f.descriptor, TypeDescriptor::Primitive(PrimitiveKind::String));
        assert!(!f.required);
    }

    #[test]
    fn ref_with_structural_sibling_is_malformed() {
        let err = build_type(&json!({
            "$defs": {"Id": {"type": "string"}},
            "properties": {"id": {"$ref": "#/$defs/Id", "type": "string"}},
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedSchema { ref pointer, .. } if pointer == "/properties/id"));
    }

    #[test]
    fn missing_ref_is_unresolved() {
        let err = build_type(&json!({"properties": {"x": {"$ref": "#/$defs/Nope"}}})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedReference {
                reference: "#/$defs/Nope".into()
            }
        );
    }

    #[test]
    fn external_ref_is_unresolved() {
        let err = synthesize(&json!({"$ref": "other.json#/x"}), &Definitions::new()).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference { .. }));
    }

    #[test]
    fn cycle_surfaces_from_build() {
        let err = build_type(&json!({
            "$defs": {
                "A": {"properties": {"b": {"$ref": "#/$defs/B"}}},
                "B": {"properties": {"a": {"$ref": "#/$defs/A"}}},
            },
            "properties": {"a": {"$ref": "#/$defs/A"}},
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::CircularDependency { .. }));
    }

    #[test]
    fn non_record_definitions_can_reference_enums() {
        let d = build_type(&json!({
            "$defs": {
                "Tags": {"type": "array", "items": {"$ref": "#/$defs/Tag"}},
                "Tag": {"enum": ["a", "b"]},
            },
            "properties": {"tags": {"$ref": "#/$defs/Tags"}},
        }))
        .unwrap();
        let TypeDescriptor::List(inner) = &record(&d).fields[0].descriptor else {
            panic!("expected list");
        };
        assert!(matches!(inner.as_ref(), TypeDescriptor::Enum(e) if e.name == "Tag"));
    }

    #[test]
    fn non_record_definitions_cannot_reference_records() {
        let err = build_type(&json!({
            "$defs": {
                "Many": {"type": "array", "items": {"$ref": "#/$defs/One"}},
                "One": {"properties": {"x": {"type": "integer"}}},
            },
            "properties": {"m": {"$ref": "#/$defs/Many"}},
        }))
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedReference {
                reference: "#/$defs/One".into()
            }
        );
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut node = json!({"type": "string"});
        for _ in 0..10 {
            node = json!({"type": "array", "items": node});
        }
        let err = build_type_with(&node, &BuildOptions { max_depth: 8 }).unwrap_err();
        assert_eq!(err, SchemaError::DepthLimitExceeded { limit: 8 });
        assert!(build_type(&node).is_ok());
    }

    fn chained_definitions(len: usize, fan_out: usize) -> Value {
        let mut defs = Map::new();
        defs.insert("D0".into(), json!({"properties": {"v": {"type": "integer"}}}));
        for i in 1..len {
            let props: Map<String, Value> = (0..fan_out)
                .map(|f| (format!("n{f}"), json!({"$ref": format!("#/$defs/D{}", i - 1)})))
                .collect();
            defs.insert(format!("D{i}"), json!({"properties": props}));
        }
        json!({
            "$defs": defs,
            "properties": {"top": {"$ref": format!("#/$defs/D{}", len - 1)}},
        })
    }

    #[test]
    fn depth_limit_counts_through_references() {
        let schema = chained_definitions(100, 1);
        let err = build_type_with(&schema, &BuildOptions { max_depth: 8 }).unwrap_err();
        assert_eq!(err, SchemaError::DepthLimitExceeded { limit: 8 });
        let err = build_type(&schema).unwrap_err();
        assert_eq!(err, SchemaError::DepthLimitExceeded { limit: DEFAULT_MAX_DEPTH });
    }

    #[test]
    fn short_reference_chain_fits_the_limit() {
        // D0 is 2 levels, each link adds one, the root adds one more.
        let schema = chained_definitions(5, 1);
        let descriptor = build_type_with(&schema, &BuildOptions { max_depth: 7 }).unwrap();
        assert_eq!(descriptor.depth(), 7);
        let err = build_type_with(&schema, &BuildOptions { max_depth: 6 }).unwrap_err();
        assert_eq!(err, SchemaError::DepthLimitExceeded { limit: 6 });
    }

    #[test]
    fn shared_definitions_are_measured_once() {
        // Every link references the previous definition twice; walking the
        // expanded tree would visit 2^40 nodes.
        let schema = chained_definitions(40, 2);
        assert!(build_type(&schema).is_ok());
        let err = build_type_with(&schema, &BuildOptions { max_depth: 20 }).unwrap_err();
        assert_eq!(err, SchemaError::DepthLimitExceeded { limit: 20 });
    }

    #[test]
    fn non_object_root_is_malformed() {
        assert!(matches!(
            build_type(&json!("string")),
            Err(SchemaError::MalformedSchema { .. })
        ));
        assert!(matches!(
            build_type(&json!({"$defs": []})),
            Err(SchemaError::MalformedSchema { .. })
        ));
    }

    #[test]
    fn shared_definition_is_shared() {
        let d = build_type(&json!({
            "$defs": {"P": {"properties": {"v": {"type": "integer"}}}},
            "properties": {"a": {"$ref": "#/$defs/P"}, "b": {"$ref": "#/$defs/P"}},
        }))
        .unwrap();
        let r = record(&d);
        match (&r.fields[0].descriptor, &r.fields[1].descriptor) {
            (TypeDescriptor::Record(a), TypeDescriptor::Record(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected records"),
        }
    }
}
