//! Inferred result shapes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar end of a shape tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "leaf", content = "table", rename_all = "snake_case")]
pub enum Leaf {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    /// Opaque record id pointing at a table.
    Reference(String),
    /// Object without declared members.
    OpenMap,
    Unknown,
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::String => write!(f, "string"),
            Leaf::Number => write!(f, "number"),
            Leaf::Integer => write!(f, "integer"),
            Leaf::Boolean => write!(f, "boolean"),
            Leaf::Date => write!(f, "date"),
            Leaf::Reference(table) => write!(f, "record<{}>", table),
            Leaf::OpenMap => write!(f, "object"),
            Leaf::Unknown => write!(f, "unknown"),
        }
    }
}

/// Shape tree of a query result.
///
/// ```text
/// { title: string, author: { name: string } }[]
///   ───┬─────────  ───────────┬───────────   ┬
///      │                      │              └── Array
///      │                      └── nested Struct
///      └── Leaf member
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "of", rename_all = "snake_case")]
pub enum ShapeDescriptor {
    Struct(IndexMap<String, ShapeDescriptor>),
    Array(Box<ShapeDescriptor>),
    Optional(Box<ShapeDescriptor>),
    Leaf(Leaf),
}

impl ShapeDescriptor {
    pub fn leaf(leaf: Leaf) -> Self {
        ShapeDescriptor::Leaf(leaf)
    }

    pub fn unknown() -> Self {
        ShapeDescriptor::Leaf(Leaf::Unknown)
    }

    pub fn array(inner: ShapeDescriptor) -> Self {
        ShapeDescriptor::Array(Box::new(inner))
    }

    /// Wrap in an optional marker; already optional shapes are kept as is.
    pub fn optional(inner: ShapeDescriptor) -> Self {
        match inner {
            ShapeDescriptor::Optional(_) => inner,
            other => ShapeDescriptor::Optional(Box::new(other)),
        }
    }

    pub fn structure<K: Into<String>>(members: impl IntoIterator<Item = (K, ShapeDescriptor)>) -> Self {
        ShapeDescriptor::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Shape of a non-SELECT statement result.
    pub fn generic_success() -> Self {
        Self::structure([
            ("status", Self::leaf(Leaf::String)),
            ("time", Self::leaf(Leaf::String)),
            ("result", Self::unknown()),
        ])
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ShapeDescriptor::Array(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, ShapeDescriptor::Optional(_))
    }

    /// Struct members, looking through array and optional wrappers.
    pub fn members(&self) -> Option<&IndexMap<String, ShapeDescriptor>> {
        match self {
            ShapeDescriptor::Struct(members) => Some(members),
            ShapeDescriptor::Array(inner) | ShapeDescriptor::Optional(inner) => inner.members(),
            ShapeDescriptor::Leaf(_) => None,
        }
    }

    pub fn member(&self, name: &str) -> Option<&ShapeDescriptor> {
        self.members()?.get(name)
    }
}

impl From<Leaf> for ShapeDescriptor {
    fn from(leaf: Leaf) -> Self {
        ShapeDescriptor::Leaf(leaf)
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeDescriptor::Struct(members) if members.is_empty() => write!(f, "{{}}"),
            ShapeDescriptor::Struct(members) => {
                write!(f, "{{ ")?;
                for (i, (name, shape)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match shape {
                        ShapeDescriptor::Optional(inner) => write!(f, "{}?: {}", name, inner)?,
                        other => write!(f, "{}: {}", name, other)?,
                    }
                }
                write!(f, " }}")
            }
            ShapeDescriptor::Array(inner) if inner.is_optional() => write!(f, "({})[]", inner),
            ShapeDescriptor::Array(inner) => write!(f, "{}[]", inner),
            ShapeDescriptor::Optional(inner) => write!(f, "{} | none", inner),
            ShapeDescriptor::Leaf(leaf) => write!(f, "{}", leaf),
        }
    }
}
