use serde::Deserialize;

use crate::error::MapError;
use crate::registry::DEFAULT_TERMINATOR;

/// Mapper configuration, parsed from TOML.
///
/// ```toml
/// tuple_terminator = "NULL"
///
/// [bulk]
/// max_rows = 1000
/// max_parameters = 2100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowMapConfig {
    /// Column name that closes a variable-width tuple slot. Empty disables
    /// terminator handling.
    #[serde(default = "default_terminator")]
    pub tuple_terminator: String,

    #[serde(default)]
    pub bulk: BulkConfig,
}

fn default_terminator() -> String {
    DEFAULT_TERMINATOR.to_string()
}

/// Batch limits for bulk inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkConfig {
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Bound parameters allowed in one statement.
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,
}

fn default_max_rows() -> usize {
    1000
}

fn default_max_parameters() -> usize {
    2100
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            max_parameters: default_max_parameters(),
        }
    }
}

impl Default for RowMapConfig {
    fn default() -> Self {
        Self {
            tuple_terminator: default_terminator(),
            bulk: BulkConfig::default(),
        }
    }
}

impl RowMapConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, MapError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MapError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, MapError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| MapError::Config(e.to_string()))?;
        config.bulk.validate()?;
        Ok(config)
    }

    pub fn terminator(&self) -> Option<&str> {
        Some(self.tuple_terminator.as_str()).filter(|t| !t.is_empty())
    }
}

impl BulkConfig {
    pub fn validate(&self) -> Result<(), MapError> {
        if self.max_rows == 0 {
            return Err(MapError::Config("bulk.max_rows must be at least 1".into()));
        }
        if self.max_parameters == 0 {
            return Err(MapError::Config("bulk.max_parameters must be at least 1".into()));
        }
        Ok(())
    }
}
