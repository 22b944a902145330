//! Configuration loading.
//!
//! Looks for `schemashape.toml` in the working directory, then
//! `<config dir>/schemashape/config.toml`. Command-line flags are merged on
//! top with [`Config::override_with`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShapeError, ShapeResult};
use crate::info::NormalizeOptions;
use crate::source::SchemaSource;
use crate::validate::ValidateOptions;

pub const LOCAL_CONFIG: &str = "schemashape.toml";

/// Output style of the command-line tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = ShapeError;

    fn from_str(s: &str) -> ShapeResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "json" => Ok(OutputFormat::Json),
            other => Err(ShapeError::Config(format!(
                "unknown output format '{}', expected 'pretty' or 'json'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DDL file.
    pub schema: Option<PathBuf>,
    /// JSON dump with `db` and `tables` info responses.
    pub info: Option<PathBuf>,
    pub float_vector_fields: Vec<String>,
    pub system_table_prefixes: Vec<String>,
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: None,
            info: None,
            float_vector_fields: ValidateOptions::default().float_vector_fields,
            system_table_prefixes: NormalizeOptions::default().system_table_prefixes,
            output: OutputFormat::default(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> ShapeResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> ShapeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| ShapeError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// First existing config file, or defaults when there is none.
    pub fn discover() -> ShapeResult<Self> {
        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("schemashape").join("config.toml"));
        }
        paths
    }

    /// Apply command-line values; `None` keeps the configured value.
    pub fn override_with(
        mut self,
        schema: Option<PathBuf>,
        info: Option<PathBuf>,
        output: Option<OutputFormat>,
    ) -> Self {
        if schema.is_some() {
            self.schema = schema;
            self.info = None;
        }
        if info.is_some() {
            self.info = info;
            self.schema = None;
        }
        if let Some(output) = output {
            self.output = output;
        }
        self
    }

    /// The schema source to load. A DDL file wins over an info dump.
    pub fn source(&self) -> ShapeResult<SchemaSource> {
        match (&self.schema, &self.info) {
            (Some(path), _) => Ok(SchemaSource::Ddl(path.clone())),
            (None, Some(path)) => Ok(SchemaSource::Info(path.clone())),
            (None, None) => Err(ShapeError::missing_config(
                "schema",
                "pass --schema <file.surql> or --info <file.json>, or set it in schemashape.toml",
            )),
        }
    }

    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            float_vector_fields: self.float_vector_fields.clone(),
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            system_table_prefixes: self.system_table_prefixes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.float_vector_fields, vec!["embedding".to_string()]);
        assert_eq!(config.system_table_prefixes, vec!["_".to_string(), "sdb_".to_string()]);
        assert_eq!(config.output, OutputFormat::Pretty);
    }

    #[test]
    fn test_parse_full() {
        let config = Config::from_toml(
            r#"
schema = "db/schema.surql"
float_vector_fields = ["embedding", "vector"]
system_table_prefixes = ["_"]
output = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.schema, Some(PathBuf::from("db/schema.surql")));
        assert_eq!(config.validate_options().float_vector_fields.len(), 2);
        assert_eq!(config.normalize_options().system_table_prefixes, vec!["_".to_string()]);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("output = 3").unwrap_err();
        assert!(matches!(err, ShapeError::Toml(_)));
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            schema: Some("a.surql".into()),
            ..Config::default()
        };
        let overridden = config
            .clone()
            .override_with(None, Some("dump.json".into()), Some(OutputFormat::Json));
        assert_eq!(overridden.source().unwrap(), SchemaSource::Info("dump.json".into()));
        assert_eq!(overridden.output, OutputFormat::Json);

        let kept = config.override_with(None, None, None);
        assert_eq!(kept.source().unwrap(), SchemaSource::Ddl("a.surql".into()));
    }

    #[test]
    fn test_missing_source() {
        let err = Config::default().source().unwrap_err();
        assert!(matches!(err, ShapeError::MissingConfig { key: "schema", .. }));
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
