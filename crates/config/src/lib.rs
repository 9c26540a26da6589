//! Configuration loading, validation, and management for Peticiona.
//!
//! Loads configuration from `peticiona.toml` (or an explicit path) with
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "peticiona.toml";

/// The root configuration structure.
///
/// Maps directly to `peticiona.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the field definition tables live
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Output placement
    #[serde(default)]
    pub output: OutputConfig,

    /// Value rendering
    #[serde(default)]
    pub formatting: FormattingConfig,

    /// Batch processing
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Directory holding the relational tables and the legacy mapping
    #[serde(default = "default_schema_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_fields_table")]
    pub fields_table: String,

    #[serde(default = "default_categories_table")]
    pub categories_table: String,

    #[serde(default = "default_rules_table")]
    pub rules_table: String,

    #[serde(default = "default_types_table")]
    pub types_table: String,

    #[serde(default = "default_options_table")]
    pub options_table: String,

    /// Single-file mapping used only when the tables fail to load
    #[serde(default = "default_legacy_mapping")]
    pub legacy_mapping: String,

    /// Column delimiter of the tables
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("schema")
}
fn default_fields_table() -> String {
    "campos_definicao.csv".into()
}
fn default_categories_table() -> String {
    "categorias_campos.csv".into()
}
fn default_rules_table() -> String {
    "regras_ativacao.csv".into()
}
fn default_types_table() -> String {
    "tipos_dados.csv".into()
}
fn default_options_table() -> String {
    "opcoes_selecao.csv".into()
}
fn default_legacy_mapping() -> String {
    "mapping_campos_definicao.json".into()
}
fn default_delimiter() -> String {
    ";".into()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            dir: default_schema_dir(),
            fields_table: default_fields_table(),
            categories_table: default_categories_table(),
            rules_table: default_rules_table(),
            types_table: default_types_table(),
            options_table: default_options_table(),
            legacy_mapping: default_legacy_mapping(),
            delimiter: default_delimiter(),
        }
    }
}

impl SchemaConfig {
    pub fn table_path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.dir.join(&self.legacy_mapping)
    }

    /// The delimiter as a single byte. Validation guarantees it is ASCII.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.bytes().next().unwrap_or(b';')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output directory when no explicit output is given
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Appended to the template stem in directory mode
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_suffix() -> String {
    "_processado".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            suffix: default_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// chrono pattern for rendered dates
    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default = "default_yes_token")]
    pub yes_token: String,

    #[serde(default = "default_no_token")]
    pub no_token: String,
}

fn default_currency_symbol() -> String {
    "R$".into()
}
fn default_date_format() -> String {
    "%d/%m/%Y".into()
}
fn default_yes_token() -> String {
    "Sim".into()
}
fn default_no_token() -> String {
    "Não".into()
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            date_format: default_date_format(),
            yes_token: default_yes_token(),
            no_token: default_no_token(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Fail a record when a required field is missing instead of warning
    #[serde(default)]
    pub strict: bool,

    /// Records assembled in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            strict: false,
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from `peticiona.toml` in the
    /// working directory when no path is given.
    ///
    /// Environment variables override the file:
    /// - `PETICIONA_SCHEMA_DIR`
    /// - `PETICIONA_OUTPUT_DIR`
    /// - `PETICIONA_LOG`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("PETICIONA_SCHEMA_DIR").filter(|v| !v.is_empty()) {
            self.schema.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PETICIONA_OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("PETICIONA_LOG").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formatting.currency_symbol.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "formatting.currency_symbol must not be empty".into(),
            ));
        }

        if self.formatting.date_format.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "formatting.date_format must not be empty".into(),
            ));
        }

        if self.processing.workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.workers must be at least 1".into(),
            ));
        }

        let delimiter = self.schema.delimiter.as_bytes();
        if delimiter.len() != 1 || !delimiter[0].is_ascii() {
            return Err(ConfigError::ValidationError(format!(
                "schema.delimiter must be a single ASCII character, got '{}'",
                self.schema.delimiter
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `peticiona config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SchemaConfig::default(),
            output: OutputConfig::default(),
            formatting: FormattingConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schema.delimiter, ";");
        assert_eq!(config.output.suffix, "_processado");
        assert_eq!(config.formatting.currency_symbol, "R$");
        assert_eq!(config.processing.workers, 1);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.schema.fields_table, config.schema.fields_table);
        assert_eq!(parsed.formatting.date_format, config.formatting.date_format);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [processing]
            workers = 4

            [formatting]
            yes_token = "SIM"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.processing.workers, 4);
        assert_eq!(parsed.formatting.yes_token, "SIM");
        assert_eq!(parsed.formatting.no_token, "Não");
        assert_eq!(parsed.schema.rules_table, "regras_ativacao.csv");
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.processing.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn multi_char_delimiter_rejected() {
        let mut config = AppConfig::default();
        config.schema.delimiter = ";;".into();
        assert!(config.validate().is_err());
        config.schema.delimiter = "\t".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/peticiona.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peticiona.toml");
        std::fs::write(&path, "[formatting]\ncurrency_symbol = \"  \"\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        std::fs::write(&path, "[schema\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("PETICIONA_SCHEMA_DIR", "/data/tabelas"),
            ("PETICIONA_LOG", "debug"),
            ("PETICIONA_OUTPUT_DIR", ""),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.schema.dir, PathBuf::from("/data/tabelas"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn schema_paths_join_dir() {
        let config = AppConfig::default();
        assert_eq!(
            config.schema.table_path("tipos_dados.csv"),
            PathBuf::from("schema/tipos_dados.csv")
        );
        assert_eq!(
            config.schema.legacy_path(),
            PathBuf::from("schema/mapping_campos_definicao.json")
        );
        assert_eq!(config.schema.delimiter_byte(), b';');
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("campos_definicao.csv"));
        assert!(toml_str.contains("_processado"));
    }
}
