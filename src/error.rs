//! Error types for schemashape.
//!
//! The parsing and inference core never fails: it degrades to documented
//! defaults. These errors belong to the layer around it, where a schema has
//! to be located, read and found non-empty.

use thiserror::Error;

/// The main error type for schemashape operations.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// A required configuration value is absent from flags, env and config files.
    #[error("Missing configuration: {key} ({hint})")]
    MissingConfig {
        key: &'static str,
        hint: &'static str,
    },

    /// The schema source produced no tables at all.
    #[error("Schema from {origin} contains no tables")]
    EmptySchema { origin: String },

    /// An info response was structurally unusable.
    #[error("Invalid info response: {0}")]
    InvalidInfo(String),

    /// Configuration file was found but is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShapeError {
    /// Create a missing configuration error.
    pub fn missing_config(key: &'static str, hint: &'static str) -> Self {
        Self::MissingConfig { key, hint }
    }

    /// Create an empty schema error for the given source description.
    pub fn empty_schema(origin: impl Into<String>) -> Self {
        Self::EmptySchema {
            origin: origin.into(),
        }
    }

    /// True for the "nothing to do" conditions, as opposed to broken input.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptySchema { .. } | Self::MissingConfig { .. })
    }
}

/// Result type alias for schemashape operations.
pub type ShapeResult<T> = Result<T, ShapeError>;
