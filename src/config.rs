use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::dialect::{AnsiDialect, Dialect, OracleDialect};
use crate::mapping_catalog::EnabledFilters;
use crate::sql_render::load_query::{QueryBuildingParameters, MAX_BATCH_SIZE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown dialect '{0}' (expected 'ansi' or 'oracle')")]
pub struct UnknownDialect(pub String);

/// Built-in SQL dialects selectable by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectName {
    #[default]
    Ansi,
    Oracle,
}

impl DialectName {
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectName::Ansi => Arc::new(AnsiDialect),
            DialectName::Oracle => Arc::new(OracleDialect),
        }
    }
}

impl FromStr for DialectName {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ansi" => Ok(DialectName::Ansi),
            "oracle" => Ok(DialectName::Oracle),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for DialectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectName::Ansi => write!(f, "ansi"),
            DialectName::Oracle => write!(f, "oracle"),
        }
    }
}

/// Compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// SQL dialect used for join syntax
    pub dialect: DialectName,

    /// Names of the filters enabled for every compilation
    pub enabled_filters: Vec<String>,

    /// Number of root keys bound per query (0 loads without key restriction)
    #[validate(range(max = 1000, message = "Batch size must be between 0 and 1000"))]
    pub batch_size: usize,

    /// Only join-fetched associations contribute columns and readers
    pub joined_fetches_only: bool,

    /// Default log filter when RUST_LOG is not set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: DialectName::Ansi,
            enabled_filters: Vec::new(),
            batch_size: 0,
            joined_fetches_only: true,
            log_level: "info".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            dialect: parse_env_var("LOADPLAN_DIALECT", "ansi")?,
            enabled_filters: parse_filter_list(&env::var("LOADPLAN_FILTERS").unwrap_or_default()),
            batch_size: parse_env_var("LOADPLAN_BATCH_SIZE", "0")?,
            joined_fetches_only: parse_env_var("LOADPLAN_JOINED_FETCHES_ONLY", "true")?,
            log_level: env::var("LOADPLAN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            dialect: cli.dialect,
            enabled_filters: cli.enabled_filters,
            batch_size: cli.batch_size,
            joined_fetches_only: !cli.all_fetches,
            log_level: cli.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file. Keys the file leaves out keep their defaults.
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_yaml_file(path)?;
        Ok(config)
    }

    /// Layer a YAML file over this configuration. Only keys present in the file override.
    pub fn apply_yaml_file<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
    ) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let overrides: ConfigOverrides =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                field: "yaml_content".to_string(),
                value: content,
                source: Box::new(e),
            })?;

        let mut layered = self.clone();
        layered.apply(overrides);
        layered.validate()?;
        *self = layered;
        Ok(())
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(dialect) = overrides.dialect {
            self.dialect = dialect;
        }
        if let Some(filters) = overrides.enabled_filters {
            self.add_filters(filters);
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(joined_fetches_only) = overrides.joined_fetches_only {
            self.joined_fetches_only = joined_fetches_only;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
    }

    fn add_filters(&mut self, filters: Vec<String>) {
        for filter in filters {
            if !self.enabled_filters.contains(&filter) {
                self.enabled_filters.push(filter);
            }
        }
    }

    /// Merge with another configuration (CLI overrides file and environment).
    /// Filters accumulate; everything else is replaced.
    pub fn merge(&mut self, other: Self) {
        self.dialect = other.dialect;
        self.add_filters(other.enabled_filters);
        self.batch_size = other.batch_size;
        self.joined_fetches_only = other.joined_fetches_only;
        self.log_level = other.log_level;
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        self.dialect.dialect()
    }

    pub fn query_building_parameters(&self) -> QueryBuildingParameters {
        QueryBuildingParameters {
            enabled_filters: self.enabled_filters.iter().cloned().collect::<EnabledFilters>(),
            batch_size: self.batch_size.min(MAX_BATCH_SIZE),
            joined_fetches_only: self.joined_fetches_only,
        }
    }
}

/// A configuration file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverrides {
    dialect: Option<DialectName>,
    enabled_filters: Option<Vec<String>>,
    batch_size: Option<usize>,
    joined_fetches_only: Option<bool>,
    log_level: Option<String>,
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub dialect: DialectName,
    pub enabled_filters: Vec<String>,
    pub batch_size: usize,
    pub all_fetches: bool,
    pub log_level: String,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

/// Comma-separated filter names, blanks dropped
fn parse_filter_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
