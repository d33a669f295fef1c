//! Per-terminal settings

use crate::core::assembler::LineSettings;
use crate::core::codec::DisplaySettings;
use crate::core::error::ConfigurationError;
use crate::core::flow::FlowControl;
use crate::core::trigger::{
    AutoAction, AutoActionSettings, AutoResponseSettings, CompiledTrigger, PreparedResponse,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of one terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Terminal name
    pub name: String,
    /// Port identifier override; the transport's own id is used when unset
    pub port_id: Option<String>,
    /// Radix, encoding and rendering
    pub display: DisplaySettings,
    /// Line framing
    pub line: LineSettings,
    /// Flow control mode
    pub flow_control: FlowControl,
    /// AutoAction trigger
    pub auto_action: Option<AutoActionSettings>,
    /// AutoResponse trigger
    pub auto_response: Option<AutoResponseSettings>,
    /// Predefined commands, referenced 1-based by responses
    pub predefined_commands: Vec<String>,
    /// Lines kept per repository
    pub repository_capacity: usize,
    /// Rate window in milliseconds
    pub rate_window_ms: u64,
    /// Worker tick (rate refresh, line timeout) in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            name: "Terminal1".to_string(),
            port_id: None,
            display: DisplaySettings::default(),
            line: LineSettings::default(),
            flow_control: FlowControl::None,
            auto_action: None,
            auto_response: None,
            predefined_commands: Vec::new(),
            repository_capacity: 1000,
            rate_window_ms: 1000,
            tick_interval_ms: 250,
        }
    }
}

impl TerminalSettings {
    /// Default settings with a name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set the EOL sequence (escapes allowed)
    #[must_use]
    pub fn with_eol(mut self, eol: &str) -> Self {
        self.line.eol = eol.to_string();
        self
    }

    /// Set display settings
    #[must_use]
    pub fn with_display(mut self, display: DisplaySettings) -> Self {
        self.display = display;
        self
    }

    /// Set the AutoAction trigger
    #[must_use]
    pub fn with_auto_action(mut self, settings: AutoActionSettings) -> Self {
        self.auto_action = Some(settings);
        self
    }

    /// Set the AutoResponse trigger
    #[must_use]
    pub fn with_auto_response(mut self, settings: AutoResponseSettings) -> Self {
        self.auto_response = Some(settings);
        self
    }

    /// Set the repository capacity
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.repository_capacity = capacity;
        self
    }

    /// EOL bytes in the terminal encoding
    pub fn eol_bytes(&self) -> Result<Vec<u8>, ConfigurationError> {
        let bytes = self
            .display
            .encoding
            .encode_escaped(&self.line.eol)
            .map_err(|e| ConfigurationError::InvalidEol(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ConfigurationError::InvalidEol(
                "EOL sequence is empty".to_string(),
            ));
        }
        // Characters are matched whole, so the EOL must fill whole code units
        let unit = self.display.encoding.unit_len();
        if bytes.len() % unit != 0 {
            return Err(ConfigurationError::InvalidEol(format!(
                "{} bytes do not form whole {} code units",
                bytes.len(),
                self.display.encoding
            )));
        }
        Ok(bytes)
    }

    /// Rate window
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    /// Worker tick interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Line timeout, if enabled
    pub fn line_timeout(&self) -> Option<Duration> {
        self.line.timeout_ms.filter(|&ms| ms > 0).map(Duration::from_millis)
    }

    /// Compile the AutoAction trigger
    pub fn compile_auto_action(
        &self,
    ) -> Result<Option<(CompiledTrigger, AutoAction)>, ConfigurationError> {
        Ok(self
            .auto_action
            .as_ref()
            .map(AutoActionSettings::compile)
            .transpose()?)
    }

    /// Compile the AutoResponse trigger and resolve its reply
    pub fn compile_auto_response(
        &self,
    ) -> Result<Option<(CompiledTrigger, PreparedResponse)>, ConfigurationError> {
        let Some(settings) = &self.auto_response else {
            return Ok(None);
        };
        let eol = self.eol_bytes()?;
        Ok(Some(settings.compile(
            self.display.encoding,
            &eol,
            &self.predefined_commands,
        )?))
    }

    /// Check every setting, compiling triggers
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.eol_bytes()?;
        for (name, value) in [
            ("repository_capacity", self.repository_capacity as u64),
            ("rate_window_ms", self.rate_window_ms),
            ("tick_interval_ms", self.tick_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigurationError::InvalidSetting {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        self.compile_auto_action()?;
        self.compile_auto_response()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::TextEncoding;
    use crate::core::trigger::{ResponsePayload, TriggerSettings};

    #[test]
    fn test_defaults_are_valid() {
        let settings = TerminalSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.eol_bytes().unwrap(), b"\r\n");
        assert_eq!(settings.line_timeout(), None);
    }

    #[test]
    fn test_eol_in_utf16() {
        let mut settings = TerminalSettings::default().with_eol("\\n");
        settings.display.encoding = TextEncoding::Utf16Be;
        assert_eq!(settings.eol_bytes().unwrap(), vec![0x00, 0x0A]);
    }

    #[test]
    fn test_eol_must_fill_code_units() {
        let mut settings = TerminalSettings::default().with_eol("\\x0D");
        settings.display.encoding = TextEncoding::Utf16Le;
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::InvalidEol(_))
        ));

        let settings = settings.with_eol("\\x0D\\x00");
        assert_eq!(settings.eol_bytes().unwrap(), vec![0x0D, 0x00]);
        assert!(settings.validate().is_ok());

        let mut settings = TerminalSettings::default().with_eol("\\x0D");
        settings.display.encoding = TextEncoding::Latin1;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            TerminalSettings::default().with_eol("").validate(),
            Err(ConfigurationError::InvalidEol(_))
        ));
        assert!(matches!(
            TerminalSettings::default().with_capacity(0).validate(),
            Err(ConfigurationError::InvalidSetting { name: "repository_capacity", .. })
        ));

        let bad_regex = TerminalSettings::default().with_auto_action(AutoActionSettings::new(
            TriggerSettings::text("[").regex(true),
            AutoAction::Highlight,
        ));
        assert!(matches!(
            bad_regex.validate(),
            Err(ConfigurationError::Trigger(_))
        ));

        let bad_index = TerminalSettings::default().with_auto_response(AutoResponseSettings::new(
            TriggerSettings::text("x"),
            ResponsePayload::Predefined(1),
        ));
        assert!(bad_index.validate().is_err());
    }
}
