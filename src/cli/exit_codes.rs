//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::config::ConfigError;
use crate::core::codec::CodecError;
use crate::core::terminal::TerminalError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Connection timeout
    pub const TIMEOUT: u8 = 4;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 5;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 6;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 7;

    /// Transport failed while running
    pub const TRANSPORT_FAULT: u8 = 8;

    /// Input data could not be parsed
    pub const INVALID_INPUT: u8 = 9;

    /// User cancelled
    pub const CANCELLED: u8 = 10;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;

    /// Every code, in table order
    pub const ALL: [u8; 12] = [
        Self::SUCCESS,
        Self::ERROR,
        Self::INVALID_ARGS,
        Self::CONNECTION_FAILED,
        Self::TIMEOUT,
        Self::FILE_NOT_FOUND,
        Self::PERMISSION_DENIED,
        Self::CONFIG_ERROR,
        Self::TRANSPORT_FAULT,
        Self::INVALID_INPUT,
        Self::CANCELLED,
        Self::INTERNAL_ERROR,
    ];
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a summary line
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Invalid input data
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::INVALID_INPUT, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl ExitCodes {
    /// Exit code for an I/O error kind
    pub fn for_io(kind: std::io::ErrorKind) -> u8 {
        use std::io::ErrorKind;

        match kind {
            ErrorKind::NotFound => Self::FILE_NOT_FOUND,
            ErrorKind::PermissionDenied => Self::PERMISSION_DENIED,
            ErrorKind::ConnectionRefused => Self::CONNECTION_FAILED,
            ErrorKind::TimedOut => Self::TIMEOUT,
            _ => Self::ERROR,
        }
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        Self::Error(ExitCodes::for_io(err.kind()), err.to_string())
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::IoError(e) => Self::from(e),
            TransportError::ConnectionFailed(_) => {
                Self::Error(ExitCodes::CONNECTION_FAILED, err.to_string())
            }
            TransportError::Timeout(_) => Self::Error(ExitCodes::TIMEOUT, err.to_string()),
            _ => Self::Error(ExitCodes::TRANSPORT_FAULT, err.to_string()),
        }
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => Self::from(e),
            _ => Self::Error(ExitCodes::CONFIG_ERROR, err.to_string()),
        }
    }
}

impl From<CodecError> for CliResult {
    fn from(err: CodecError) -> Self {
        Self::Error(ExitCodes::INVALID_INPUT, err.to_string())
    }
}

impl From<TerminalError> for CliResult {
    fn from(err: TerminalError) -> Self {
        match err {
            TerminalError::Transport(e) => Self::from(e),
            TerminalError::Configuration(_) => Self::Error(ExitCodes::CONFIG_ERROR, err.to_string()),
            TerminalError::Worker(_) => Self::Error(ExitCodes::INTERNAL_ERROR, err.to_string()),
            TerminalError::NotRunning | TerminalError::AlreadyStarted => {
                Self::Error(ExitCodes::ERROR, err.to_string())
            }
        }
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        ExitCodes::SUCCESS => "Success",
        ExitCodes::ERROR => "General error",
        ExitCodes::INVALID_ARGS => "Invalid arguments",
        ExitCodes::CONNECTION_FAILED => "Connection failed",
        ExitCodes::TIMEOUT => "Connection timeout",
        ExitCodes::FILE_NOT_FOUND => "File not found",
        ExitCodes::PERMISSION_DENIED => "Permission denied",
        ExitCodes::CONFIG_ERROR => "Configuration error",
        ExitCodes::TRANSPORT_FAULT => "Transport fault",
        ExitCodes::INVALID_INPUT => "Invalid input data",
        ExitCodes::CANCELLED => "Operation cancelled",
        ExitCodes::INTERNAL_ERROR => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ExitCodes::ALL {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}
