//! # Termline Core Library
//!
//! A line-oriented terminal monitor library:
//! - Raw bytes decoded to String, Char, Bin, Oct, Dec, Hex or Unicode display
//! - Lines assembled on a configurable EOL sequence with timing metadata
//! - Tx, Bidir and Rx repositories with byte/line counters and rates
//! - AutoAction and AutoResponse triggers on text, regex or hex patterns
//! - Flow control signal tracking and connect time
//!
//! ## Features
//!
//! - One worker task per terminal; events arrive in a single total order
//! - Lossless event subscriptions over `crossbeam-channel`
//! - TCP and in-memory loopback transports behind an async trait
//! - TOML, YAML and JSON configuration
//! - CLI with exit codes and JSON-lines output
//!
//! ## Example
//!
//! ```rust,no_run
//! use termline_core::{
//!     AutoResponseSettings, ResponsePayload, TcpConfig, TcpTransport, Terminal,
//!     TerminalSettings, TriggerSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = TerminalSettings::new("modem").with_auto_response(
//!         AutoResponseSettings::new(
//!             TriggerSettings::text("PING").whole_word(true),
//!             ResponsePayload::Text("PONG\\r\\n".to_string()),
//!         ),
//!     );
//!
//!     let mut terminal = Terminal::new(settings)?;
//!     let events = terminal.subscribe();
//!     let transport = TcpTransport::connect(&TcpConfig::new("192.168.1.10", 4001)).await?;
//!     terminal.start(Box::new(transport))?;
//!
//!     std::thread::spawn(move || {
//!         for envelope in events {
//!             println!("{:?}", envelope.event);
//!         }
//!     });
//!
//!     terminal.send_line("AT").await?;
//!     let snapshot = terminal.close().await?;
//!     println!("{} AutoResponse matches", snapshot.auto_response.count);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError, LoggingConfig};
pub use crate::core::codec::{ByteDecoder, CodecError, DisplaySettings, Radix, TextEncoding};
pub use crate::core::error::{ConfigurationError, TriggerActionError};
pub use crate::core::event::{EventEnvelope, TerminalEvent, TriggerPayload};
pub use crate::core::line::{ByteStreamElement, Direction, DisplayLine, ElementKind, Origin};
pub use crate::core::pipeline::{Pipeline, TerminalSnapshot};
pub use crate::core::repository::{Repository, RepositoryKind};
pub use crate::core::settings::TerminalSettings;
pub use crate::core::dispatcher::TerminalState;
pub use crate::core::terminal::{Terminal, TerminalError};
pub use crate::core::transport::{
    LoopbackRemote, LoopbackTransport, TcpConfig, TcpTransport, Transport, TransportError,
    TransportType,
};
pub use crate::core::trigger::{
    AutoAction, AutoActionSettings, AutoResponseSettings, EngineKind, ResponsePayload,
    TriggerSettings, TriggerState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
