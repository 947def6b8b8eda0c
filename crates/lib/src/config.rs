//! # Reader Configuration
//!
//! Endpoint bases, the default credentials file and the Cloud project are read
//! from, in order: built-in defaults, an optional YAML file (with `${VAR}`
//! substitution), then `ANYREAD_*` environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "anyread.yml";

#[derive(Debug)]
pub enum ConfigError {
    /// An error from the underlying `config` crate.
    General(String),
    /// An explicitly requested configuration file does not exist.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// Base URLs of the Google services the readers talk to.
///
/// Tests point every base at one mock server with [`Endpoints::single_host`].
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    /// Public sheet CSV exports.
    pub docs_base: String,
    /// Public Drive downloads (`/uc?export=download`).
    pub drive_download_base: String,
    /// Drive v3 API.
    pub drive_api_base: String,
    /// Sheets v4 API.
    pub sheets_api_base: String,
    /// Cloud Storage JSON API.
    pub storage_api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            docs_base: "https://docs.google.com".to_string(),
            drive_download_base: "https://drive.google.com".to_string(),
            drive_api_base: "https://www.googleapis.com".to_string(),
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            storage_api_base: "https://storage.googleapis.com".to_string(),
        }
    }
}

impl Endpoints {
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            docs_base: base.clone(),
            drive_download_base: base.clone(),
            drive_api_base: base.clone(),
            sheets_api_base: base.clone(),
            storage_api_base: base,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Service-account key used when a command does not name one.
    /// Falls back to `GOOGLE_APPLICATION_CREDENTIALS`.
    #[serde(default)]
    pub credentials_path: Option<String>,
    /// Cloud project for storage reads.
    #[serde(default)]
    pub project: Option<String>,
}

// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Regex compilation failed: {e}")))?;
    let expanded = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.to_string()))
}

/// Loads the reader configuration.
///
/// An explicit `config_path_override` must exist; the default
/// [`DEFAULT_CONFIG_FILE`] is optional. Nested keys are overridden with `__`,
/// e.g. `ANYREAD_ENDPOINTS__DOCS_BASE`.
pub fn get_config(config_path_override: Option<&str>) -> Result<ReaderConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let content = match config_path_override {
        Some(path) => Some(read_and_substitute(path)?.ok_or_else(|| {
            ConfigError::NotFound(format!("Config file not found at '{path}'."))
        })?),
        None => read_and_substitute(DEFAULT_CONFIG_FILE)?,
    };
    if let Some(content) = content {
        info!(
            "Loading configuration from '{}'.",
            config_path_override.unwrap_or(DEFAULT_CONFIG_FILE)
        );
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("ANYREAD")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut config: ReaderConfig = settings.try_deserialize()?;

    if config.credentials_path.is_none() {
        if let Ok(path) = env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            if !path.is_empty() {
                config.credentials_path = Some(path);
            }
        }
    }

    Ok(config)
}
