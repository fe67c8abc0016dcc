//! # Type Descriptors
//!
//! The runtime representation of a synthesized type. Named record and enum
//! types are reference-counted so that a definition referenced from many
//! places is built once and shared.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Int,
    Float,
    Bool,
    Null,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Null => "null",
        }
    }
}

/// A closed set of literal values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumType {
    pub name: String,
    /// Literals in declared order.
    pub values: Vec<Value>,
}

/// One declared property of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub descriptor: TypeDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// True iff the property schema has no `default`.
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A named structure with fields in property declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecordType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A synthesized type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Enum(Arc<EnumType>),
    Record(Arc<RecordType>),
    List(Box<TypeDescriptor>),
    /// String-keyed map with uniformly typed values.
    Map(Box<TypeDescriptor>),
    /// Members in declared order. Validation picks the first that matches.
    Union(Vec<TypeDescriptor>),
    Any,
}

impl TypeDescriptor {
    /// The record type, if this descriptor is one.
    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Number of descriptor levels below and including this one.
    pub fn depth(&self) -> usize {
        match self {
            Self::Primitive(_) | Self::Enum(_) | Self::Any => 1,
            Self::List(inner) | Self::Map(inner) => 1 + inner.depth(),
            Self::Union(members) => 1 + members.iter().map(Self::depth).max().unwrap_or(0),
            Self::Record(record) => {
                1 + record
                    .fields
                    .iter()
                    .map(|f| f.descriptor.depth())
                    .max()
                    .unwrap_or(0)
            }
        }
    }
}

/// Short type expression used in mismatch messages, e.g. `list[int]` or
/// `record Addr`.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => f.write_str(kind.as_str()),
            Self::Enum(e) => write!(f, "enum {}", e.name),
            Self::Record(r) => write!(f, "record {}", r.name),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Map(inner) => write!(f, "map[{inner}]"),
            Self::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Self::Any => f.write_str("any"),
        }
    }
}
