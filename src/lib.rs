//! # schemashape: schema DDL to type model, query to result shape
//!
//! Reads `DEFINE TABLE` / `DEFINE FIELD` DDL (or the equivalent live info
//! responses) into a normalized table model, and infers the result shape of
//! `SELECT` queries against it.
//!
//! ## Quick Example
//!
//! ```rust
//! use schemashape::prelude::*;
//!
//! let tables = schemashape::parse_schema(
//!     "DEFINE TABLE user SCHEMAFULL;
//!      DEFINE FIELD name ON user TYPE string;
//!      DEFINE FIELD age ON user TYPE option<int>;",
//! );
//! let registry = SchemaRegistry::from_tables(&tables);
//!
//! let shape = infer_query("SELECT * FROM user LIMIT 1", &registry);
//! assert_eq!(shape.to_string(), "{ name: string, age?: integer }");
//! ```
//!
//! ## Pipeline
//!
//! | Stage      | Module       | Input              | Output                |
//! |------------|--------------|--------------------|-----------------------|
//! | Resolve    | [`types`]    | type token         | `TypeDescriptor`      |
//! | Extract    | [`clause`]   | definition line    | comment / default     |
//! | Parse      | [`ddl`]      | DDL text           | `Vec<TableDefinition>`|
//! | Normalize  | [`info`]     | info responses     | `Vec<TableDefinition>`|
//! | Validate   | [`validate`] | tables             | tables                |
//! | Index      | [`registry`] | tables             | `SchemaRegistry`      |
//! | Query      | [`query`]    | query string       | `ParsedQuery`         |
//! | Infer      | [`infer`]    | query + registry   | `ShapeDescriptor`     |

pub mod clause;
pub mod config;
pub mod ddl;
pub mod error;
pub mod infer;
pub mod info;
pub mod model;
pub mod query;
pub mod registry;
pub mod shape;
pub mod source;
pub mod types;
pub mod validate;

pub mod prelude {
    pub use crate::config::{Config, OutputFormat};
    pub use crate::error::*;
    pub use crate::infer::{infer, infer_query};
    pub use crate::info::{InfoResponse, fetch_tables_from_responses, normalize};
    pub use crate::model::*;
    pub use crate::query::{FieldSelection, ParsedQuery, StatementKind};
    pub use crate::registry::{RegistryHandle, SchemaRegistry};
    pub use crate::shape::{Leaf, ShapeDescriptor};
    pub use crate::source::SchemaSource;
    pub use crate::validate::validate;
}

/// Parse DDL text and validate references in one step.
///
/// # Example
///
/// ```
/// use schemashape::parse_schema;
///
/// let tables = parse_schema("DEFINE TABLE t; DEFINE FIELD r ON t TYPE record<missing>;");
/// assert_eq!(tables[0].fields[0].kind.as_str(), "record");
/// assert!(tables[0].fields[0].reference.is_none());
/// ```
pub fn parse_schema(ddl_text: &str) -> Vec<model::TableDefinition> {
    validate::validate(&ddl::parse(ddl_text))
}

/// Build a registry straight from DDL text.
pub fn registry_from_ddl(ddl_text: &str) -> registry::SchemaRegistry {
    registry::SchemaRegistry::from_tables(&parse_schema(ddl_text))
}
