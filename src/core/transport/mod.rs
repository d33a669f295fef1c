//! Transport layer consumed by the terminal worker
//!
//! Supports:
//! - Raw TCP connections
//! - In-memory loopback pairs (tests, offline replay)

mod loopback;
mod tcp;

pub use loopback::{pair, LoopbackRemote, LoopbackTransport};
pub use tcp::{TcpConfig, TcpTransport};

use crate::core::flow::Signal;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Raw TCP
    Tcp,
    /// In-memory pair
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,

    /// Operation not offered by this transport
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Send error
    #[error("Send error: {0}")]
    SendError(String),

    /// Receive error
    #[error("Receive error: {0}")]
    ReceiveError(String),
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Write calls
    pub packets_sent: u64,
    /// Read calls that returned data
    pub packets_received: u64,
}

/// Byte-oriented transport driven by the terminal worker
///
/// `read` must be cancel safe: the worker polls it inside `tokio::select!`
/// and drops the future whenever another branch wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next chunk of bytes; an empty chunk means end of stream
    async fn read(&mut self) -> Result<Bytes, TransportError>;

    /// Write all bytes
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Token cancelled once the transport is closed by the remote side
    fn closed(&self) -> CancellationToken;

    /// Drive an output signal line
    async fn set_signal(&mut self, signal: Signal, _value: bool) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(format!("{} on this transport", signal)))
    }

    /// Port identifier shown with every line
    fn port_id(&self) -> String;

    /// Get transport type
    fn transport_type(&self) -> TransportType;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}
