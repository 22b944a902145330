//! Schema sources: where the table model comes from.
//!
//! A source is read, run through the matching entry point and validated.
//! This is the only place in the library that touches the filesystem.

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ddl;
use crate::error::{ShapeError, ShapeResult};
use crate::info::{self, NormalizeOptions};
use crate::model::TableDefinition;
use crate::validate::{self, ValidateOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A DDL document.
    Ddl(PathBuf),
    /// A JSON dump `{ "db": <db info>, "tables": { name: <table info> } }`.
    Info(PathBuf),
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Ddl(path) => write!(f, "DDL file {}", path.display()),
            SchemaSource::Info(path) => write!(f, "info dump {}", path.display()),
        }
    }
}

/// Options for [`SchemaSource::load_with`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub validate: ValidateOptions,
    pub normalize: NormalizeOptions,
}

impl SchemaSource {
    pub fn path(&self) -> &Path {
        match self {
            SchemaSource::Ddl(path) | SchemaSource::Info(path) => path,
        }
    }

    pub fn load(&self) -> ShapeResult<Vec<TableDefinition>> {
        self.load_with(&LoadOptions::default())
    }

    /// Read, parse and validate. Zero tables is an error.
    pub fn load_with(&self, options: &LoadOptions) -> ShapeResult<Vec<TableDefinition>> {
        let content = std::fs::read_to_string(self.path())?;
        let tables = match self {
            SchemaSource::Ddl(_) => ddl::parse(&content),
            SchemaSource::Info(_) => {
                let dump: Value = serde_json::from_str(&content)?;
                tables_from_dump(&dump, &options.normalize)?
            }
        };

        if tables.is_empty() {
            return Err(ShapeError::empty_schema(self.to_string()));
        }
        tracing::info!(source = %self, tables = tables.len(), "schema loaded");
        Ok(validate::validate_with(&tables, &options.validate))
    }
}

/// Parse a DDL string and validate it.
pub fn tables_from_ddl(ddl_text: &str, options: &ValidateOptions) -> ShapeResult<Vec<TableDefinition>> {
    let tables = ddl::parse(ddl_text);
    if tables.is_empty() {
        return Err(ShapeError::empty_schema("DDL text"));
    }
    Ok(validate::validate_with(&tables, options))
}

/// Build tables from an info dump with `db` and `tables` sections.
pub fn tables_from_dump(dump: &Value, options: &NormalizeOptions) -> ShapeResult<Vec<TableDefinition>> {
    let Some(db) = dump.get("db") else {
        return Err(ShapeError::InvalidInfo("missing 'db' section".to_string()));
    };
    let empty = serde_json::Map::new();
    let table_infos = match dump.get("tables") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ShapeError::InvalidInfo(
                "'tables' must be an object keyed by table name".to_string(),
            ));
        }
        None => &empty,
    };

    let db_info = info::normalize(db);
    Ok(info::fetch_tables_with(&db_info, table_infos, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BaseKind;
    use serde_json::json;

    #[test]
    fn test_tables_from_ddl_validates() {
        let tables = tables_from_ddl(
            "DEFINE TABLE t; DEFINE FIELD r ON t TYPE record<missing>;",
            &ValidateOptions::default(),
        )
        .unwrap();
        let field = &tables[0].fields[0];
        assert_eq!(field.kind, BaseKind::Record);
        assert!(field.reference.is_none());
    }

    #[test]
    fn test_empty_ddl_is_empty_schema() {
        let err = tables_from_ddl("-- nothing here\n", &ValidateOptions::default()).unwrap_err();
        assert!(matches!(err, ShapeError::EmptySchema { .. }));
    }

    #[test]
    fn test_dump_requires_db() {
        let err = tables_from_dump(&json!({ "tables": {} }), &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ShapeError::InvalidInfo(_)));

        let err = tables_from_dump(&json!({ "db": {}, "tables": [] }), &NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, ShapeError::InvalidInfo(_)));
    }

    #[test]
    fn test_dump_without_table_infos() {
        let tables = tables_from_dump(
            &json!({ "db": { "tables": { "user": "DEFINE TABLE user" } } }),
            &NormalizeOptions::default(),
        )
        .unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "user");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SchemaSource::Ddl("/definitely/not/here.surql".into()).load().unwrap_err();
        assert!(matches!(err, ShapeError::Io(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("schemashape-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let ddl_path = dir.join("schema.surql");
        std::fs::write(&ddl_path, "DEFINE TABLE user;\nDEFINE FIELD embedding ON user TYPE array;\n")
            .unwrap();
        let tables = SchemaSource::Ddl(ddl_path).load().unwrap();
        assert_eq!(tables[0].fields[0].kind, BaseKind::ArrayOfFloat);

        let empty_path = dir.join("empty.surql");
        std::fs::write(&empty_path, "").unwrap();
        let err = SchemaSource::Ddl(empty_path).load().unwrap_err();
        assert!(err.is_empty_input());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
