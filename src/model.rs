//! Table/field model shared by every entry point.
//!
//! Both the DDL parser and the info-response normalizer produce these
//! structures, and the code-emission consumer reads them back as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized kind of a resolved type token.
///
/// Open enumeration: tokens without a dedicated variant are kept verbatim
/// (lowercased) in [`BaseKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BaseKind {
    String,
    Number,
    Integer,
    Float,
    Boolean,
    Datetime,
    Object,
    Array,
    ArrayOfFloat,
    ArrayOfRecord,
    Record,
    References,
    Other(String),
}

impl BaseKind {
    pub fn as_str(&self) -> &str {
        match self {
            BaseKind::String => "string",
            BaseKind::Number => "number",
            BaseKind::Integer => "integer",
            BaseKind::Float => "float",
            BaseKind::Boolean => "boolean",
            BaseKind::Datetime => "datetime",
            BaseKind::Object => "object",
            BaseKind::Array => "array",
            BaseKind::ArrayOfFloat => "array_of_float",
            BaseKind::ArrayOfRecord => "array_of_record",
            BaseKind::Record => "record",
            BaseKind::References => "references",
            BaseKind::Other(token) => token,
        }
    }

    /// Kinds that carry a [`Reference`] when resolved from a type token.
    pub fn is_reference_kind(&self) -> bool {
        matches!(
            self,
            BaseKind::Record | BaseKind::References | BaseKind::ArrayOfRecord
        )
    }

    /// Kinds whose values are collections of records.
    pub fn is_record_collection(&self) -> bool {
        matches!(self, BaseKind::References | BaseKind::ArrayOfRecord)
    }
}

impl From<String> for BaseKind {
    fn from(token: String) -> Self {
        match token.as_str() {
            "string" => BaseKind::String,
            "number" => BaseKind::Number,
            "integer" => BaseKind::Integer,
            "float" => BaseKind::Float,
            "boolean" => BaseKind::Boolean,
            "datetime" => BaseKind::Datetime,
            "object" => BaseKind::Object,
            "array" => BaseKind::Array,
            "array_of_float" => BaseKind::ArrayOfFloat,
            "array_of_record" => BaseKind::ArrayOfRecord,
            "record" => BaseKind::Record,
            "references" => BaseKind::References,
            _ => BaseKind::Other(token),
        }
    }
}

impl From<&str> for BaseKind {
    fn from(token: &str) -> Self {
        BaseKind::from(token.to_string())
    }
}

impl From<BaseKind> for String {
    fn from(kind: BaseKind) -> Self {
        match kind {
            BaseKind::Other(token) => token,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer from a field to another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Target table name, as written in the type token.
    pub table: String,
    /// Whether the pointer itself may be absent.
    #[serde(default)]
    pub is_optional: bool,
}

impl Reference {
    pub fn new(table: impl Into<String>, is_optional: bool) -> Self {
        Self {
            table: table.into(),
            is_optional,
        }
    }
}

/// Result of resolving a single type token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub kind: BaseKind,
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}

impl TypeDescriptor {
    pub fn new(kind: BaseKind) -> Self {
        Self {
            kind,
            is_optional: false,
            reference: None,
        }
    }

    /// The fallback for empty or malformed tokens.
    pub fn fallback() -> Self {
        Self::new(BaseKind::String)
    }
}

impl Default for TypeDescriptor {
    fn default() -> Self {
        Self::fallback()
    }
}

/// One field of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BaseKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}

impl FieldDefinition {
    /// Create a required field of the given kind.
    pub fn new(name: impl Into<String>, kind: BaseKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            description: None,
            default_value: None,
            reference: None,
        }
    }

    /// Create a field from a resolved type token.
    pub fn from_descriptor(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: descriptor.kind,
            optional: descriptor.is_optional,
            description: None,
            default_value: None,
            reference: descriptor.reference,
        }
    }

    /// Builder: mark as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Builder: attach a reference.
    pub fn references(mut self, table: &str, is_optional: bool) -> Self {
        self.reference = Some(Reference::new(table, is_optional));
        self
    }

    /// Builder: attach a description.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Element-marker fields (`tags[*]`) describe the items of another field.
    pub fn is_element_marker(name: &str) -> bool {
        name.contains("[*]")
    }
}

/// One table with its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl TableDefinition {
    /// Create a new table definition.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            fields: Vec::new(),
        }
    }

    /// Builder: add a field.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.upsert_field(field);
        self
    }

    /// Find a field by exact name.
    pub fn find_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find a field by exact name for in-place refinement.
    pub fn find_field_mut(&mut self, name: &str) -> Option<&mut FieldDefinition> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Add a field; a redeclared name replaces the earlier field in place.
    pub fn upsert_field(&mut self, field: FieldDefinition) {
        match self.find_field_mut(&field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Case-insensitive table identity.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_kind_round_trips_through_string() {
        assert_eq!(BaseKind::from("array_of_record"), BaseKind::ArrayOfRecord);
        assert_eq!(BaseKind::from("decimal"), BaseKind::Other("decimal".into()));
        assert_eq!(String::from(BaseKind::ArrayOfFloat), "array_of_float");
        assert_eq!(BaseKind::Other("duration".into()).to_string(), "duration");
    }

    #[test]
    fn test_field_serializes_kind_as_type() {
        let field = FieldDefinition::new("author", BaseKind::Record).references("user", false);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "record");
        assert_eq!(json["reference"]["table"], "user");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut table = TableDefinition::new("post")
            .field(FieldDefinition::new("title", BaseKind::String))
            .field(FieldDefinition::new("body", BaseKind::String));
        table.upsert_field(FieldDefinition::new("title", BaseKind::Integer));

        assert_eq!(table.fields.len(), 2);
        assert_eq!(table.fields[0].name, "title");
        assert_eq!(table.fields[0].kind, BaseKind::Integer);
    }
}
