//! Store configuration
//!
//! `NestedSetConfig` says where the database lives, how long a connection
//! waits on a locked database, and which table/columns hold the tree.

use crate::models::{is_identifier, ColumnMap, ColumnMapError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding `database_path`
pub const ENV_DB_PATH: &str = "NESTEDSET_DB_PATH";
/// Environment variable overriding `busy_timeout_ms`
pub const ENV_BUSY_TIMEOUT_MS: &str = "NESTEDSET_BUSY_TIMEOUT_MS";
/// Environment variable overriding `columns.table`
pub const ENV_TABLE: &str = "NESTEDSET_TABLE";
/// Environment variable setting `columns.scope`
pub const ENV_SCOPE_COLUMN: &str = "NESTEDSET_SCOPE_COLUMN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid column bindings: {0}")]
    Columns(#[from] ColumnMapError),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedSetConfig {
    /// Database file (created with its parent directories if missing)
    pub database_path: PathBuf,

    /// `PRAGMA busy_timeout` applied to every connection
    pub busy_timeout_ms: u64,

    /// Run `CREATE TABLE IF NOT EXISTS` for the bound table on startup
    pub create_table: bool,

    /// Extra untyped columns added to the bootstrapped table for record attributes
    pub payload_columns: Vec<String>,

    pub columns: ColumnMap,
}

impl Default for NestedSetConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./nestedset.db"),
            busy_timeout_ms: 5000,
            create_table: true,
            payload_columns: Vec::new(),
            columns: ColumnMap::default(),
        }
    }
}

impl NestedSetConfig {
    /// Default configuration pointing at `database_path`
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    pub fn with_columns(mut self, columns: ColumnMap) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_payload_column(mut self, column: impl Into<String>) -> Self {
        self.payload_columns.push(column.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Defaults overlaid with `NESTEDSET_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be an integer, got '{}'",
                    ENV_BUSY_TIMEOUT_MS, raw
                ))
            })?;
        }

        if let Some(table) = lookup(ENV_TABLE) {
            config.columns.table = table;
        }

        if let Some(scope) = lookup(ENV_SCOPE_COLUMN) {
            config.columns.scope = Some(scope);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path cannot be empty".to_string(),
            ));
        }

        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "busy_timeout_ms must be greater than 0".to_string(),
            ));
        }

        self.columns.validate()?;

        for column in &self.payload_columns {
            if !is_identifier(column) {
                return Err(ConfigError::Invalid(format!(
                    "payload column '{}' is not a valid SQL identifier",
                    column
                )));
            }
            if self.columns.is_reserved(column) {
                return Err(ConfigError::Invalid(format!(
                    "payload column '{}' collides with a nested-set column",
                    column
                )));
            }
        }

        Ok(())
    }
}
