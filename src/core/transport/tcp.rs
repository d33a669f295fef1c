//! TCP transport implementation

use super::{Transport, TransportError, TransportStats, TransportType};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::sync::CancellationToken;

/// TCP connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl TcpConfig {
    /// Create a new TCP configuration
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout_secs: 10,
        }
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self::new("localhost", 23)
    }
}

/// Connected TCP client
pub struct TcpTransport {
    address: String,
    reader: FramedRead<OwnedReadHalf, BytesCodec>,
    writer: OwnedWriteHalf,
    closed: CancellationToken,
    stats: TransportStats,
}

impl TcpTransport {
    /// Connect within the configured timeout
    pub async fn connect(config: &TcpConfig) -> Result<Self, TransportError> {
        let address = config.address();

        let stream = tokio::time::timeout(
            Duration::from_secs(config.timeout_secs),
            TcpStream::connect(&address),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout_secs))?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        // Set TCP_NODELAY for lower latency
        stream.set_nodelay(true).map_err(TransportError::IoError)?;

        tracing::info!(address = %address, "TCP connected");
        Ok(Self::from_stream(stream, address))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, address: String) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            address,
            reader: FramedRead::new(read_half, BytesCodec::new()),
            writer: write_half,
            closed: CancellationToken::new(),
            stats: TransportStats::default(),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read(&mut self) -> Result<Bytes, TransportError> {
        match self.reader.next().await {
            Some(Ok(buffer)) => {
                self.stats.bytes_received += buffer.len() as u64;
                self.stats.packets_received += 1;
                Ok(buffer.freeze())
            }
            Some(Err(e)) => Err(TransportError::IoError(e)),
            None => {
                tracing::debug!(address = %self.address, "TCP peer closed the connection");
                self.closed.cancel();
                Ok(Bytes::new())
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Disconnected);
        }
        self.writer
            .write_all(data)
            .await
            .map_err(TransportError::IoError)?;
        self.writer.flush().await.map_err(TransportError::IoError)?;

        self.stats.bytes_sent += data.len() as u64;
        self.stats.packets_sent += 1;
        Ok(())
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    fn port_id(&self) -> String {
        self.address.clone()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
