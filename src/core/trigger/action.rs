//! Actions and responses carried out when a trigger fires

use super::{CompiledTrigger, TriggerError, TriggerMatch, TriggerSettings};
use crate::core::codec::{numeric, Radix, TextEncoding};
use serde::{Deserialize, Serialize};

/// Local operation of the AutoAction engine
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAction {
    /// Only count matches
    #[default]
    CountOnly,
    /// Mark the matching line
    Highlight,
    /// Ask the view to beep
    Beep,
    /// Ask the view to show a message
    ShowMessage(String),
    /// Clear all repositories before the matching line is appended
    ClearRepositories,
    /// Reset repository byte/line totals
    ResetCounters,
    /// Close the terminal
    CloseTerminal,
}

/// Reply of the AutoResponse engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Text with escape sequences, sent as-is
    Text(String),
    /// Hex bytes, e.g. "06" or "0x4F 0x4B"
    Hex(String),
    /// 1-based index into the predefined commands; EOL is appended
    Predefined(usize),
    /// Echo the matched text followed by EOL
    Trigger,
}

/// AutoAction configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoActionSettings {
    /// Trigger definition
    pub trigger: TriggerSettings,
    /// Operation on match
    #[serde(default)]
    pub action: AutoAction,
}

impl AutoActionSettings {
    /// Create settings
    pub fn new(trigger: TriggerSettings, action: AutoAction) -> Self {
        Self { trigger, action }
    }

    /// Compile into an engine configuration
    pub fn compile(&self) -> Result<(CompiledTrigger, AutoAction), TriggerError> {
        Ok((self.trigger.compile()?, self.action.clone()))
    }
}

/// AutoResponse configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResponseSettings {
    /// Trigger definition
    pub trigger: TriggerSettings,
    /// Reply on match
    pub response: ResponsePayload,
}

impl AutoResponseSettings {
    /// Create settings
    pub fn new(trigger: TriggerSettings, response: ResponsePayload) -> Self {
        Self { trigger, response }
    }

    /// Compile the trigger and resolve the reply to bytes
    pub fn compile(
        &self,
        encoding: TextEncoding,
        eol: &[u8],
        predefined: &[String],
    ) -> Result<(CompiledTrigger, PreparedResponse), TriggerError> {
        let trigger = self.trigger.compile()?;

        let response = match &self.response {
            ResponsePayload::Text(text) => PreparedResponse::Fixed(encoding.encode_escaped(text)?),
            ResponsePayload::Hex(tokens) => {
                PreparedResponse::Fixed(numeric::parse_tokens(Radix::Hex, tokens)?)
            }
            ResponsePayload::Predefined(index) => {
                let command = index
                    .checked_sub(1)
                    .and_then(|i| predefined.get(i))
                    .ok_or(TriggerError::PredefinedCommandOutOfRange {
                        index: *index,
                        available: predefined.len(),
                    })?;
                let mut bytes = encoding.encode_escaped(command)?;
                bytes.extend_from_slice(eol);
                PreparedResponse::Fixed(bytes)
            }
            ResponsePayload::Trigger => PreparedResponse::EchoMatch {
                suffix: eol.to_vec(),
            },
        };

        if let PreparedResponse::Fixed(bytes) = &response {
            if bytes.is_empty() {
                return Err(TriggerError::InvalidSetting(
                    "response payload is empty".to_string(),
                ));
            }
        }

        Ok((trigger, response))
    }
}

/// Reply resolved at configuration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedResponse {
    /// Fixed bytes
    Fixed(Vec<u8>),
    /// The matched bytes followed by `suffix`
    EchoMatch {
        /// Usually the EOL sequence
        suffix: Vec<u8>,
    },
}

impl PreparedResponse {
    /// Bytes to transmit for a match
    pub fn resolve(&self, matched: &TriggerMatch) -> Vec<u8> {
        match self {
            Self::Fixed(bytes) => bytes.clone(),
            Self::EchoMatch { suffix } => {
                let mut bytes = matched.bytes.clone();
                bytes.extend_from_slice(suffix);
                bytes
            }
        }
    }
}
