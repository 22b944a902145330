//! Schema registry: read-only table index used by shape inference.
//!
//! Built once from validated tables. Updates go through [`RegistryHandle`],
//! which swaps in a freshly built registry instead of mutating the live one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use strsim::levenshtein;

use crate::model::{BaseKind, FieldDefinition, Reference, TableDefinition};

/// Field entry of a registered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: BaseKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&FieldDefinition> for FieldSchema {
    fn from(field: &FieldDefinition) -> Self {
        Self {
            name: field.name.clone(),
            kind: field.kind.clone(),
            optional: field.optional,
            reference: field.reference.clone(),
            description: field.description.clone(),
        }
    }
}

/// A registered table with its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldSchema>,
}

impl From<&TableDefinition> for TableSchema {
    fn from(table: &TableDefinition) -> Self {
        Self {
            name: table.name.clone(),
            description: table.description.clone(),
            fields: table
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldSchema::from(f)))
                .collect(),
        }
    }
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// Direct members under `prefix` (`""` for top-level, `"address."` for an object).
    ///
    /// Yields the member name relative to the prefix.
    pub fn members<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a FieldSchema)> + 'a {
        self.fields.iter().filter_map(move |(name, field)| {
            let rest = name.strip_prefix(prefix)?;
            (!rest.is_empty() && !rest.contains('.')).then_some((rest, field))
        })
    }

    /// True when dotted sub-fields, at any depth, are declared under `name`.
    pub fn has_members(&self, name: &str) -> bool {
        let prefix = format!("{}.", name);
        self.fields
            .keys()
            .any(|field| field.len() > prefix.len() && field.starts_with(&prefix))
    }
}

/// A field reached by following a dotted path.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    pub table: &'a TableSchema,
    pub field: &'a FieldSchema,
    /// An intermediate hop went through a record collection.
    pub through_collection: bool,
    /// An intermediate hop was optional.
    pub through_optional: bool,
}

/// Table-name index over a validated table model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
    order: Vec<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: &[TableDefinition]) -> Self {
        let mut registry = Self::new();
        for table in tables {
            registry.register(table);
        }
        tracing::debug!(tables = registry.len(), "schema registry built");
        registry
    }

    /// Add a table, replacing any table of the same name.
    pub fn register(&mut self, table: &TableDefinition) {
        let key = table.name.to_lowercase();
        if self.tables.insert(key.clone(), TableSchema::from(table)).is_none() {
            self.order.push(key);
        }
    }

    /// Case-insensitive table lookup.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn field(&self, table: &str, field: &str) -> Option<&FieldSchema> {
        self.table(table)?.field(field)
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.order.iter().filter_map(|key| self.tables.get(key))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Follow `path` from `table`, hopping through references and object sub-fields.
    ///
    /// `["author", "name"]` on `post` reaches `user.name` when `post.author`
    /// is a `record<user>`.
    pub fn resolve_path(&self, table: &str, path: &[&str]) -> Option<ResolvedField<'_>> {
        let mut current = self.table(table)?;
        let mut prefix = String::new();
        let mut through_collection = false;
        let mut through_optional = false;

        let (last, hops) = path.split_last()?;
        for segment in hops {
            let name = format!("{}{}", prefix, segment);
            let field = current.field(&name)?;
            through_optional |= field.optional;

            match field.reference.as_ref().and_then(|r| self.table(&r.table)) {
                Some(next) => {
                    through_collection |= field.kind.is_record_collection();
                    current = next;
                    prefix.clear();
                }
                None if field.kind == BaseKind::Object => prefix = format!("{}.", name),
                None => return None,
            }
        }

        let field = current.field(&format!("{}{}", prefix, last))?;
        Some(ResolvedField {
            table: current,
            field,
            through_collection,
            through_optional,
        })
    }

    /// Closest table name, if any is close enough.
    pub fn suggest_table(&self, name: &str) -> Option<String> {
        did_you_mean(name, self.tables().map(|t| t.name.as_str()))
    }

    /// Closest field name on `table`, if any is close enough.
    pub fn suggest_field(&self, table: &str, name: &str) -> Option<String> {
        let table = self.table(table)?;
        did_you_mean(name, table.fields.keys().map(String::as_str))
    }
}

/// Best match within a Levenshtein threshold that grows with the input length.
fn did_you_mean<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };

    let mut best_match = None;
    let mut min_dist = usize::MAX;
    for candidate in candidates {
        let dist = levenshtein(input, candidate);
        if dist <= threshold && dist < min_dist {
            min_dist = dist;
            best_match = Some(candidate.to_string());
        }
    }
    best_match
}

/// Shared, swappable registry.
///
/// Readers take a snapshot with [`load`](Self::load) and keep using it even
/// if a new registry is published meanwhile.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<SchemaRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Snapshot of the current registry.
    pub fn load(&self) -> Arc<SchemaRegistry> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the registry; returns the previous one.
    pub fn publish(&self, registry: SchemaRegistry) -> Arc<SchemaRegistry> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(tables = registry.len(), "publishing schema registry");
        std::mem::replace(&mut *slot, Arc::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tables() -> Vec<TableDefinition> {
        vec![
            TableDefinition::new("User")
                .field(FieldDefinition::new("name", BaseKind::String))
                .field(FieldDefinition::new("address", BaseKind::Object))
                .field(FieldDefinition::new("address.city", BaseKind::String))
                .field(FieldDefinition::new("address.geo", BaseKind::Object))
                .field(FieldDefinition::new("address.geo.lat", BaseKind::Float)),
            TableDefinition::new("post")
                .field(FieldDefinition::new("title", BaseKind::String))
                .field(
                    FieldDefinition::new("author", BaseKind::Record)
                        .optional()
                        .references("user", true),
                )
                .field(
                    FieldDefinition::new("comments", BaseKind::ArrayOfRecord)
                        .references("comment", false),
                ),
            TableDefinition::new("comment")
                .field(FieldDefinition::new("text", BaseKind::String))
                .field(FieldDefinition::new("author", BaseKind::Record).references("user", false)),
        ]
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = SchemaRegistry::from_tables(&tables());
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.table("USER").unwrap().name, "User");
        assert_eq!(registry.field("Post", "title").unwrap().kind, BaseKind::String);
        assert!(registry.field("post", "missing").is_none());
    }

    #[test]
    fn test_tables_keep_registration_order() {
        let registry = SchemaRegistry::from_tables(&tables());
        let names: Vec<&str> = registry.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["User", "post", "comment"]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SchemaRegistry::from_tables(&tables());
        registry.register(
            &TableDefinition::new("user").field(FieldDefinition::new("email", BaseKind::String)),
        );
        assert_eq!(registry.len(), 3);
        let user = registry.table("user").unwrap();
        assert_eq!(user.fields.len(), 1);
        assert!(user.field("email").is_some());
    }

    #[test]
    fn test_members_of_object() {
        let registry = SchemaRegistry::from_tables(&tables());
        let user = registry.table("user").unwrap();
        let top: Vec<&str> = user.members("").map(|(name, _)| name).collect();
        assert_eq!(top, vec!["name", "address"]);
        let address: Vec<&str> = user.members("address.").map(|(name, _)| name).collect();
        assert_eq!(address, vec!["city", "geo"]);
        assert!(user.has_members("address"));
        assert!(!user.has_members("name"));
    }

    #[test]
    fn test_resolve_path_through_references() {
        let registry = SchemaRegistry::from_tables(&tables());

        let resolved = registry.resolve_path("post", &["author", "name"]).unwrap();
        assert_eq!(resolved.table.name, "User");
        assert_eq!(resolved.field.kind, BaseKind::String);
        assert!(resolved.through_optional);
        assert!(!resolved.through_collection);

        let resolved = registry
            .resolve_path("post", &["comments", "author", "address", "geo", "lat"])
            .unwrap();
        assert_eq!(resolved.field.kind, BaseKind::Float);
        assert!(resolved.through_collection);
        assert!(!resolved.through_optional);

        assert!(registry.resolve_path("post", &["title", "x"]).is_none());
        assert!(registry.resolve_path("post", &[]).is_none());
        assert!(registry.resolve_path("nope", &["title"]).is_none());
    }

    #[test]
    fn test_suggestions() {
        let registry = SchemaRegistry::from_tables(&tables());
        assert_eq!(registry.suggest_table("usr"), Some("User".to_string()));
        assert_eq!(registry.suggest_field("post", "titel"), Some("title".to_string()));
        assert_eq!(registry.suggest_field("post", "ab"), None);
        assert_eq!(registry.suggest_field("missing", "title"), None);
    }

    #[test]
    fn test_handle_publish_swaps_snapshot() {
        let handle = RegistryHandle::new(SchemaRegistry::from_tables(&tables()));
        let before = handle.load();

        let previous = handle.publish(SchemaRegistry::new());
        assert_eq!(previous.len(), 3);
        assert_eq!(before.len(), 3);
        assert!(handle.load().is_empty());
    }
}
