//! Live-introspection (info response) normalizer.
//!
//! A live database describes itself with two structures: a database-level
//! info object listing tables, and one info object per table listing its
//! fields. Field descriptors arrive either as a raw `DEFINE FIELD` string or
//! as a structured object; the two shapes are told apart once, here, and
//! both end up as the same [`FieldDefinition`] the DDL parser produces.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clause::{extract_comment, extract_type};
use crate::ddl::{build_field, parse_field_definition, refine_element};
use crate::model::{FieldDefinition, TableDefinition};

/// Known sections of a database-level info response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub tables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzers: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accesses: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configs: Option<Map<String, Value>>,
}

/// Reshape a raw info response into its known sections.
///
/// Unknown keys are dropped; a missing or non-object input yields an empty
/// `tables` section.
pub fn normalize(raw: &Value) -> InfoResponse {
    let Some(object) = raw.as_object() else {
        return InfoResponse::default();
    };
    let section = |key: &str| object.get(key).and_then(Value::as_object).cloned();

    InfoResponse {
        tables: section("tables").unwrap_or_default(),
        functions: section("functions"),
        params: section("params"),
        analyzers: section("analyzers"),
        accesses: section("accesses"),
        users: section("users"),
        models: section("models"),
        configs: section("configs"),
    }
}

/// A table entry of the database info: raw definition or `{ name }` object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTable {
    Definition(String),
    Structured {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        comment: Option<String>,
    },
}

impl RawTable {
    fn description(&self) -> Option<String> {
        match self {
            RawTable::Definition(definition) => extract_comment(definition),
            RawTable::Structured { comment, .. } => comment.clone(),
        }
    }
}

/// A field entry of a table info: raw definition or structured descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Definition(String),
    Structured(StructuredField),
}

/// Structured field descriptor. The raw type string arrives as `type` or
/// `kind`; `type` wins when both are present.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StructuredField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub optional: Option<bool>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl StructuredField {
    /// Read whatever keys are usable, ignoring values of the wrong type.
    fn lenient(object: &Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: text("name"),
            r#type: text("type"),
            kind: text("kind"),
            optional: object.get("optional").and_then(Value::as_bool),
            comment: text("comment"),
            default: object.get("default").cloned(),
            value: object.get("value").cloned(),
        }
    }

    fn type_token(&self) -> String {
        self.r#type.clone().or_else(|| self.kind.clone()).unwrap_or_default()
    }
}

impl RawField {
    /// Decide the descriptor shape once at the boundary.
    ///
    /// Total: an object with unusable values keeps its usable keys, and any
    /// other value becomes a descriptor with no type (a `string` field).
    pub fn from_value(value: &Value) -> Self {
        if let Ok(raw) = serde_json::from_value(value.clone()) {
            return raw;
        }
        tracing::debug!(descriptor = %value, "reading field descriptor leniently");
        match value.as_object() {
            Some(object) => RawField::Structured(StructuredField::lenient(object)),
            None => RawField::Structured(StructuredField::default()),
        }
    }

    /// Raw type token, needed for element-marker refinement.
    fn type_token(&self) -> String {
        match self {
            RawField::Definition(definition) => extract_type(definition).unwrap_or_default(),
            RawField::Structured(field) => field.type_token(),
        }
    }

    /// Normalize into a field named `name`.
    pub fn into_field(self, name: &str) -> FieldDefinition {
        match self {
            RawField::Definition(definition) => match parse_field_definition(&definition) {
                Some((_, mut field)) => {
                    field.name = name.to_string();
                    field
                }
                None => {
                    let type_token = extract_type(&definition).unwrap_or_default();
                    build_field(name, &type_token, &definition, &[], None)
                }
            },
            RawField::Structured(structured) => {
                let type_token = structured.type_token();
                let mut field = build_field(name, &type_token, "", &[], structured.comment);
                field.optional |= structured.optional.unwrap_or(false);
                field.default_value = structured
                    .default
                    .or(structured.value)
                    .as_ref()
                    .and_then(render_default);
                field
            }
        }
    }
}

fn render_default(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Options for building tables from info responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Tables whose names start with any of these are system tables.
    pub system_table_prefixes: Vec<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            system_table_prefixes: vec!["_".to_string(), "sdb_".to_string()],
        }
    }
}

impl NormalizeOptions {
    fn is_system_table(&self, name: &str) -> bool {
        self.system_table_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Build the table model from a database info and per-table infos.
pub fn fetch_tables_from_responses(
    db_info: &InfoResponse,
    table_infos: &Map<String, Value>,
) -> Vec<TableDefinition> {
    fetch_tables_with(db_info, table_infos, &NormalizeOptions::default())
}

/// [`fetch_tables_from_responses`] with explicit options.
pub fn fetch_tables_with(
    db_info: &InfoResponse,
    table_infos: &Map<String, Value>,
    options: &NormalizeOptions,
) -> Vec<TableDefinition> {
    let mut tables = Vec::new();

    for (name, raw_table) in &db_info.tables {
        if options.is_system_table(name) {
            tracing::debug!(table = %name, "skipping system table");
            continue;
        }

        let mut table = TableDefinition::new(name);
        table.description = serde_json::from_value::<RawTable>(raw_table.clone())
            .ok()
            .and_then(|raw| raw.description());

        let Some(fields) = lookup_table_info(table_infos, name).and_then(field_map) else {
            tracing::debug!(table = %name, "no field info for table");
            tables.push(table);
            continue;
        };

        let mut element_markers = Vec::new();
        for (field_name, raw_field) in fields {
            let raw = RawField::from_value(raw_field);
            if FieldDefinition::is_element_marker(field_name) {
                element_markers.push((field_name.as_str(), raw.type_token()));
                continue;
            }
            table.upsert_field(raw.into_field(field_name));
        }

        for (marker, type_token) in element_markers {
            refine_element(&mut table, marker, &type_token);
        }

        tables.push(table);
    }

    tables
}

/// Per-table info by exact name, then case-insensitively.
fn lookup_table_info<'a>(table_infos: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    table_infos.get(name).or_else(|| {
        table_infos
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, info)| info)
    })
}

/// Sections of a table info other than `fields`.
const TABLE_INFO_SECTIONS: &[&str] = &["events", "indexes", "lives", "tables"];

/// The `fields` section of a table info, or the info itself when it is
/// already a bare field map.
fn field_map(info: &Value) -> Option<&Map<String, Value>> {
    if let Some(fields) = info.get("fields") {
        return fields.as_object();
    }
    let object = info.as_object()?;
    let is_table_info = TABLE_INFO_SECTIONS
        .iter()
        .any(|section| object.get(*section).is_some_and(Value::is_object));
    if is_table_info { None } else { Some(object) }
}
