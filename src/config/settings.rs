//! Application settings

use super::ConfigError;
use crate::core::settings::TerminalSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Named terminal configurations
    pub terminals: Vec<TerminalSettings>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Toml,
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl AppConfig {
    /// Load the default config file, or defaults if it does not exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::default_config_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load and validate a config file; the format follows the extension
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;
        let config: Self = match format {
            Format::Toml => toml::from_str(&content)?,
            Format::Yaml => serde_yaml::from_str(&content)?,
            Format::Json => serde_json::from_str(&content)?,
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), terminals = config.terminals.len(), "Config loaded");
        Ok(config)
    }

    /// Save to a file; the format follows the extension
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = match Format::of(path)? {
            Format::Toml => toml::to_string_pretty(self)?,
            Format::Yaml => serde_yaml::to_string(self)?,
            Format::Json => serde_json::to_string_pretty(self)?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Terminal configuration by name
    pub fn terminal(&self, name: &str) -> Option<&TerminalSettings> {
        self.terminals.iter().find(|t| t.name == name)
    }

    /// Check every terminal, compiling its triggers
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for terminal in &self.terminals {
            if !names.insert(terminal.name.as_str()) {
                return Err(ConfigError::DuplicateTerminal(terminal.name.clone()));
            }
            terminal.validate().map_err(|source| ConfigError::Invalid {
                terminal: terminal.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
