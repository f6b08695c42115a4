//! Configuration loading from disk.
//!
//! `.json` files are read with `serde_json`, anything else as TOML. JSON files
//! in the older upper-case layout (`PROXY_SERVER`, `TEXT_MODIFYING`) are
//! mapped onto [`ProxyConfig`].

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// On-disk format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LegacySettings {
    #[serde(rename = "PROXY_SERVER")]
    proxy_server: LegacyProxyServer,
    #[serde(rename = "TEXT_MODIFYING", default)]
    text_modifying: Option<LegacyTextModifying>,
}

#[derive(Debug, Deserialize)]
struct LegacyProxyServer {
    #[serde(rename = "HOST")]
    host: String,
    #[serde(rename = "PORT")]
    port: u16,
    #[serde(rename = "REQUESTED_URL")]
    requested_url: String,
}

#[derive(Debug, Deserialize)]
struct LegacyTextModifying {
    #[serde(rename = "WORDS_LENGTH")]
    words_length: usize,
    #[serde(rename = "ADD_CHARACTER")]
    add_character: String,
}

impl From<LegacySettings> for ProxyConfig {
    fn from(legacy: LegacySettings) -> Self {
        let mut config = ProxyConfig::default();
        config.listener.host = legacy.proxy_server.host;
        config.listener.port = legacy.proxy_server.port;
        config.upstream.base_url = legacy.proxy_server.requested_url;
        match legacy.text_modifying {
            Some(text) => {
                config.rewrite.word_length = text.words_length;
                config.rewrite.marker = text.add_character;
            }
            None => config.rewrite.enabled = false,
        }
        config
    }
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ProxyConfig, ConfigError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        ConfigFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            let result = if value.get("PROXY_SERVER").is_some() {
                serde_json::from_value::<LegacySettings>(value).map(ProxyConfig::from)
            } else {
                serde_json::from_value::<ProxyConfig>(value)
            };
            result.map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }
}

/// Read a TOML or JSON file without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

/// Load and validate configuration from a TOML or JSON file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config(path)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
