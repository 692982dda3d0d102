use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::core::InvestmentConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to encode config as TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config extension for {0} (expected .toml or .json)")]
    UnsupportedFormat(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Format {
    Toml,
    Json,
}

fn format_of(path: &Path) -> Result<Format, StoreError> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(StoreError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Reads a config file. Missing keys fall back to the defaults.
pub fn load_config(path: &Path) -> Result<InvestmentConfig, StoreError> {
    let format = format_of(path)?;
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = match format {
        Format::Toml => toml::from_str(&content)?,
        Format::Json => serde_json::from_str(&content)?,
    };
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn save_config(path: &Path, config: &InvestmentConfig) -> Result<(), StoreError> {
    let content = match format_of(path)? {
        Format::Toml => toml::to_string_pretty(config)?,
        Format::Json => serde_json::to_string_pretty(config)?,
    };
    fs::write(path, content).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}
