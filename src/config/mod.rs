//! Configuration module
//!
//! Handles application settings: logging and the named terminal
//! configurations, stored as TOML, YAML or JSON.

mod settings;

pub use settings::{AppConfig, LoggingConfig};

use crate::core::error::ConfigurationError;
use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension not recognized
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// No home directory to derive the default location from
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// No terminal with this name
    #[error("Unknown terminal: {0}")]
    UnknownTerminal(String),

    /// Two terminals share a name
    #[error("Duplicate terminal name: {0}")]
    DuplicateTerminal(String),

    /// Terminal configuration rejected
    #[error("Terminal '{terminal}': {source}")]
    Invalid {
        /// Terminal name
        terminal: String,
        /// Validation error
        #[source]
        source: ConfigurationError,
    },
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "termline", "Termline")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
