//! Query-shape inference.
//!
//! Combines a [`ParsedQuery`] with a [`SchemaRegistry`] into the
//! [`ShapeDescriptor`] the query is expected to return. Deterministic and
//! I/O free; unknown tables and fields degrade to unknown leaves.

use indexmap::IndexMap;

use crate::model::BaseKind;
use crate::query::{self, FieldSelection, ParsedQuery, StatementKind};
use crate::registry::{FieldSchema, SchemaRegistry, TableSchema};
use crate::shape::{Leaf, ShapeDescriptor};

/// Parse and infer in one call.
pub fn infer_query(query: &str, registry: &SchemaRegistry) -> ShapeDescriptor {
    infer(&query::parse(query), registry)
}

/// Infer the result shape of a parsed query.
pub fn infer(query: &ParsedQuery, registry: &SchemaRegistry) -> ShapeDescriptor {
    if query.kind != StatementKind::Select {
        return ShapeDescriptor::generic_success();
    }

    let Some(name) = query.table() else {
        tracing::debug!("query has no FROM target");
        return ShapeDescriptor::unknown();
    };
    let Some(table) = registry.table(name) else {
        match registry.suggest_table(name) {
            Some(suggestion) => {
                tracing::debug!(table = name, suggestion = %suggestion, "unknown table, did you mean '{}'?", suggestion)
            }
            None => tracing::debug!(table = name, "unknown table"),
        }
        return ShapeDescriptor::unknown();
    };

    let inference = Inference { registry };
    let mut members = inference.select(table, "", &query.fields);

    for path in &query.fetch {
        let name = path.split('.').next().unwrap_or(path.as_str());
        if let Some(field) = table.field(name)
            && field.reference.is_some()
            && members.contains_key(name)
        {
            let expanded = inference.expand(table, field, &[FieldSelection::Wildcard]);
            members.insert(name.to_string(), expanded);
        }
    }

    let shape = ShapeDescriptor::Struct(members);
    if query.is_array_result {
        ShapeDescriptor::array(shape)
    } else {
        shape
    }
}

struct Inference<'a> {
    registry: &'a SchemaRegistry,
}

impl Inference<'_> {
    /// Struct members for a selection list over `table`, below `prefix`.
    ///
    /// An empty list or a bare `*` starts from every member; named entries
    /// then add to it or override it.
    fn select(
        &self,
        table: &TableSchema,
        prefix: &str,
        selections: &[FieldSelection],
    ) -> IndexMap<String, ShapeDescriptor> {
        let select_all = selections.is_empty() || selections.iter().any(FieldSelection::is_wildcard);
        let mut members = if select_all {
            self.all_members(table, prefix)
        } else {
            IndexMap::new()
        };

        for selection in selections {
            let FieldSelection::Field {
                name,
                alias,
                nested,
            } = selection
            else {
                continue;
            };
            if select_all && alias.is_none() && nested.is_empty() {
                continue;
            }

            let key = alias.as_deref().unwrap_or(name).to_string();
            let path = format!("{}{}", prefix, name);
            let shape = match table.field(&path) {
                Some(field) if alias.is_some() && !nested.is_empty() => {
                    self.flattened(table, field, nested)
                }
                Some(field) if nested.is_empty() => self.scalar(table, field),
                Some(field) => self.expand(table, field, nested),
                None if table.has_members(&path) => {
                    ShapeDescriptor::Struct(self.select(table, &format!("{}.", path), nested))
                }
                None => {
                    self.report_unknown(table, prefix, name);
                    ShapeDescriptor::unknown()
                }
            };
            members.insert(key, shape);
        }

        members
    }

    /// Every member below `prefix`, scalar-mapped.
    ///
    /// Dotted fields whose parent object is not declared are grouped into a
    /// struct under the missing parent's name.
    fn all_members(&self, table: &TableSchema, prefix: &str) -> IndexMap<String, ShapeDescriptor> {
        let mut members = IndexMap::new();
        for (name, field) in &table.fields {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            match rest.split_once('.') {
                None if !rest.is_empty() => {
                    members.insert(rest.to_string(), self.scalar(table, field));
                }
                Some((head, _)) if !head.is_empty() && !members.contains_key(head) => {
                    let parent = format!("{}{}", prefix, head);
                    if table.field(&parent).is_none() {
                        let nested = self.all_members(table, &format!("{}.", parent));
                        members.insert(head.to_string(), ShapeDescriptor::Struct(nested));
                    }
                }
                _ => {}
            }
        }
        members
    }

    /// Default mapping of a field without sub-selections.
    fn scalar(&self, table: &TableSchema, field: &FieldSchema) -> ShapeDescriptor {
        let reference = field.reference.as_ref().map(|r| r.table.clone());
        let shape = match &field.kind {
            BaseKind::String => Leaf::String.into(),
            BaseKind::Number | BaseKind::Float => Leaf::Number.into(),
            BaseKind::Integer => Leaf::Integer.into(),
            BaseKind::Boolean => Leaf::Boolean.into(),
            BaseKind::Datetime => Leaf::Date.into(),
            BaseKind::Record => match reference {
                Some(target) => Leaf::Reference(target).into(),
                None => Leaf::String.into(),
            },
            BaseKind::Array => ShapeDescriptor::array(ShapeDescriptor::unknown()),
            BaseKind::ArrayOfRecord | BaseKind::References => match reference {
                Some(target) => ShapeDescriptor::array(Leaf::Reference(target).into()),
                None => ShapeDescriptor::array(ShapeDescriptor::unknown()),
            },
            BaseKind::ArrayOfFloat => ShapeDescriptor::array(Leaf::Number.into()),
            BaseKind::Object if table.has_members(&field.name) => {
                ShapeDescriptor::Struct(self.all_members(table, &format!("{}.", field.name)))
            }
            BaseKind::Object => Leaf::OpenMap.into(),
            BaseKind::Other(other) if other == "decimal" => Leaf::Number.into(),
            BaseKind::Other(_) => ShapeDescriptor::unknown(),
        };

        if field.optional {
            ShapeDescriptor::optional(shape)
        } else {
            shape
        }
    }

    /// Expand a field with sub-selections through its reference or its object members.
    fn expand(
        &self,
        table: &TableSchema,
        field: &FieldSchema,
        nested: &[FieldSelection],
    ) -> ShapeDescriptor {
        let target = field
            .reference
            .as_ref()
            .and_then(|r| self.registry.table(&r.table));

        let inner = match target {
            Some(target) => ShapeDescriptor::Struct(self.select(target, "", nested)),
            None if field.kind == BaseKind::Object => {
                ShapeDescriptor::Struct(self.select(table, &format!("{}.", field.name), nested))
            }
            None => {
                tracing::debug!(
                    table = %table.name,
                    field = %field.name,
                    kind = %field.kind,
                    "field cannot be expanded"
                );
                return self.scalar(table, field);
            }
        };

        let shape = if field.kind.is_record_collection() {
            ShapeDescriptor::array(inner)
        } else {
            inner
        };
        if field.optional {
            ShapeDescriptor::optional(shape)
        } else {
            shape
        }
    }

    /// `author.name AS writer`: the shape of the path's leaf instead of a nested struct.
    fn flattened(
        &self,
        table: &TableSchema,
        field: &FieldSchema,
        nested: &[FieldSelection],
    ) -> ShapeDescriptor {
        let Some(tail) = single_chain(nested) else {
            return self.expand(table, field, nested);
        };

        let mut path = vec![field.name.as_str()];
        path.extend(tail);
        let Some(resolved) = self.registry.resolve_path(&table.name, &path) else {
            tracing::debug!(table = %table.name, path = %path.join("."), "path does not resolve");
            return ShapeDescriptor::unknown();
        };

        let mut shape = self.scalar(resolved.table, resolved.field);
        if resolved.through_collection {
            shape = ShapeDescriptor::array(shape);
        }
        if resolved.through_optional {
            shape = ShapeDescriptor::optional(shape);
        }
        shape
    }

    fn report_unknown(&self, table: &TableSchema, prefix: &str, name: &str) {
        let full = format!("{}{}", prefix, name);
        match self.registry.suggest_field(&table.name, &full) {
            Some(suggestion) => tracing::debug!(
                table = %table.name,
                field = %full,
                "unknown field, did you mean '{}'?",
                suggestion
            ),
            None => tracing::debug!(table = %table.name, field = %full, "unknown field"),
        }
    }
}

/// Names along a selection chain with exactly one plain field per level.
fn single_chain(nested: &[FieldSelection]) -> Option<Vec<&str>> {
    let mut names = Vec::new();
    let mut level = nested;
    loop {
        match level {
            [FieldSelection::Field { name, nested, .. }] => {
                names.push(name.as_str());
                if nested.is_empty() {
                    return Some(names);
                }
                level = nested;
            }
            _ => return None,
        }
    }
}
