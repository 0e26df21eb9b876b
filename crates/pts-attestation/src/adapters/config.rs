//! TOML configuration loading.
//!
//! Loads an [`AttestationConfig`] from a TOML file. Missing keys fall back
//! to the built-in defaults so a minimal deployment needs no config file at
//! all.
//!
//! # Config File Format
//!
//! ```toml
//! [attestation]
//! nonce_len = 20
//! measurement_path = "/etc/tnc_config"
//! extend_pcr = 16
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::domain::AttestationConfig;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    attestation: AttestationSection,
}

#[derive(Debug, Deserialize, Default)]
struct AttestationSection {
    nonce_len: Option<usize>,
    measurement_path: Option<String>,
    extend_pcr: Option<u32>,
}

/// Error loading or parsing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("cannot parse config file: {0}")]
    Parse(String),
}

/// Loads the responder configuration from a TOML file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<AttestationConfig, ConfigError> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
        path: path.as_ref().display().to_string(),
        error: e.to_string(),
    })?;
    parse(&content)
}

/// Parses the responder configuration from a TOML string.
pub fn parse(content: &str) -> Result<AttestationConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = AttestationConfig::default();
    Ok(AttestationConfig {
        nonce_len: file.attestation.nonce_len.unwrap_or(defaults.nonce_len),
        measurement_path: file
            .attestation
            .measurement_path
            .unwrap_or(defaults.measurement_path),
        extend_pcr: file.attestation.extend_pcr.unwrap_or(defaults.extend_pcr),
    })
}
