//! Reference validation over a finished table model.
//!
//! References to undeclared tables are downgraded instead of dropped, and a
//! small set of field-name conventions is applied. The transform is
//! idempotent: validating twice changes nothing further.

use std::collections::HashSet;

use crate::model::{BaseKind, FieldDefinition, TableDefinition};

/// Field-name overrides applied during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Fields with these names that resolved to a generic `array` are float vectors.
    pub float_vector_fields: Vec<String>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            float_vector_fields: vec!["embedding".to_string()],
        }
    }
}

/// Validate with the default overrides.
pub fn validate(tables: &[TableDefinition]) -> Vec<TableDefinition> {
    validate_with(tables, &ValidateOptions::default())
}

/// Validate with explicit overrides.
pub fn validate_with(tables: &[TableDefinition], options: &ValidateOptions) -> Vec<TableDefinition> {
    let declared: HashSet<String> = tables.iter().map(|t| t.name.to_lowercase()).collect();

    tables
        .iter()
        .map(|table| TableDefinition {
            name: table.name.clone(),
            description: table.description.clone(),
            fields: table
                .fields
                .iter()
                .map(|field| validate_field(&table.name, field, &declared, options))
                .collect(),
        })
        .collect()
}

fn validate_field(
    table: &str,
    field: &FieldDefinition,
    declared: &HashSet<String>,
    options: &ValidateOptions,
) -> FieldDefinition {
    let mut field = field.clone();

    let dangling = field
        .reference
        .as_ref()
        .is_some_and(|r| !declared.contains(&r.table.to_lowercase()));
    if dangling {
        let target = field.reference.take().map(|r| r.table).unwrap_or_default();
        if field.kind.is_record_collection() {
            field.kind = BaseKind::Array;
        }
        tracing::warn!(
            table,
            field = %field.name,
            target = %target,
            kind = %field.kind,
            "reference to undeclared table downgraded"
        );
    }

    if field.kind == BaseKind::Array && options.float_vector_fields.contains(&field.name) {
        field.kind = BaseKind::ArrayOfFloat;
    }

    field
}
