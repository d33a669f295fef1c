//! Terminal-level error types

use crate::core::codec::CodecError;
use crate::core::transport::TransportError;
use crate::core::trigger::TriggerError;
use thiserror::Error;

/// Invalid terminal or trigger configuration, reported to the caller that
/// supplied it
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Trigger could not be compiled
    #[error("Trigger configuration: {0}")]
    Trigger(#[from] TriggerError),

    /// Encoding or radix problem
    #[error("Display configuration: {0}")]
    Codec(#[from] CodecError),

    /// EOL sequence unusable
    #[error("Invalid EOL sequence: {0}")]
    InvalidEol(String),

    /// Any other out-of-range setting
    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting {
        /// Setting name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Failure while carrying out a fired trigger
#[derive(Error, Debug)]
pub enum TriggerActionError {
    /// Response could not be transmitted
    #[error("Transmit failed: {0}")]
    Transmit(#[from] TransportError),

    /// Chained automatic responses exceeded the limit
    #[error("Automatic response chain stopped after {0} transmissions")]
    ChainLimit(usize),
}
