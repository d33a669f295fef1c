//! In-memory transport pair
//!
//! The [`LoopbackTransport`] half goes to a terminal; the [`LoopbackRemote`]
//! half plays the device: it injects received data and faults, observes
//! what the terminal wrote, and can close the link.

use super::{Transport, TransportError, TransportStats, TransportType};
use crate::core::flow::Signal;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum Incoming {
    Data(Bytes),
    Fault(String),
}

/// Create a connected pair
pub fn pair(port_id: &str) -> (LoopbackTransport, LoopbackRemote) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();
    let reject_writes = Arc::new(AtomicBool::new(false));

    let transport = LoopbackTransport {
        port_id: port_id.to_string(),
        incoming: incoming_rx,
        outgoing: outgoing_tx,
        signals: signal_tx,
        closed: closed.clone(),
        reject_writes: reject_writes.clone(),
        stats: TransportStats::default(),
    };
    let remote = LoopbackRemote {
        incoming: incoming_tx,
        outgoing: outgoing_rx,
        signals: signal_rx,
        closed,
        reject_writes,
    };
    (transport, remote)
}

/// Terminal side of a loopback pair
pub struct LoopbackTransport {
    port_id: String,
    incoming: mpsc::UnboundedReceiver<Incoming>,
    outgoing: mpsc::UnboundedSender<Bytes>,
    signals: mpsc::UnboundedSender<(Signal, bool)>,
    closed: CancellationToken,
    reject_writes: Arc<AtomicBool>,
    stats: TransportStats,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn read(&mut self) -> Result<Bytes, TransportError> {
        // Queued data is delivered before the close is noticed
        let next = tokio::select! {
            biased;
            next = self.incoming.recv() => next,
            _ = self.closed.cancelled() => None,
        };

        match next {
            Some(Incoming::Data(bytes)) => {
                self.stats.bytes_received += bytes.len() as u64;
                self.stats.packets_received += 1;
                Ok(bytes)
            }
            Some(Incoming::Fault(reason)) => Err(TransportError::ReceiveError(reason)),
            None => {
                self.closed.cancel();
                Ok(Bytes::new())
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::NotConnected);
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(TransportError::SendError("write rejected by remote".to_string()));
        }
        self.outgoing
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::Disconnected)?;
        self.stats.bytes_sent += data.len() as u64;
        self.stats.packets_sent += 1;
        Ok(())
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn set_signal(&mut self, signal: Signal, value: bool) -> Result<(), TransportError> {
        if !signal.is_output() {
            return Err(TransportError::Unsupported(format!("{} is an input", signal)));
        }
        self.signals
            .send((signal, value))
            .map_err(|_| TransportError::Disconnected)
    }

    fn port_id(&self) -> String {
        self.port_id.clone()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

/// Device side of a loopback pair
pub struct LoopbackRemote {
    incoming: mpsc::UnboundedSender<Incoming>,
    outgoing: mpsc::UnboundedReceiver<Bytes>,
    signals: mpsc::UnboundedReceiver<(Signal, bool)>,
    closed: CancellationToken,
    reject_writes: Arc<AtomicBool>,
}

impl LoopbackRemote {
    /// Deliver bytes to the terminal
    pub fn inject(&self, data: impl Into<Bytes>) {
        let _ = self.incoming.send(Incoming::Data(data.into()));
    }

    /// Make the next read fail
    pub fn fault(&self, reason: &str) {
        let _ = self.incoming.send(Incoming::Fault(reason.to_string()));
    }

    /// Reject or accept subsequent writes
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Wait for the next write of the terminal
    pub async fn next_write(&mut self) -> Option<Bytes> {
        self.outgoing.recv().await
    }

    /// Everything written so far, concatenated
    pub fn try_written(&mut self) -> Vec<u8> {
        let mut written = Vec::new();
        while let Ok(chunk) = self.outgoing.try_recv() {
            written.extend_from_slice(&chunk);
        }
        written
    }

    /// Output signal changes requested by the terminal
    pub fn try_signals(&mut self) -> Vec<(Signal, bool)> {
        let mut signals = Vec::new();
        while let Ok(change) = self.signals.try_recv() {
            signals.push(change);
        }
        signals
    }

    /// Close the link; pending data is still delivered
    pub fn close(&self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_round_trip() {
        let (mut transport, mut remote) = pair("loop0");
        remote.inject(&b"hello"[..]);
        assert_eq!(assert_ok!(transport.read().await), Bytes::from_static(b"hello"));

        assert_ok!(transport.write(b"world").await);
        assert_eq!(remote.next_write().await.unwrap(), Bytes::from_static(b"world"));
        assert_eq!(transport.stats().bytes_sent, 5);
    }

    #[tokio::test]
    async fn test_close_drains_pending_data() {
        let (mut transport, remote) = pair("loop0");
        remote.inject(&b"last"[..]);
        remote.close();
        assert_eq!(transport.read().await.unwrap(), Bytes::from_static(b"last"));
        assert!(transport.read().await.unwrap().is_empty());
        assert!(transport.closed().is_cancelled());
        assert!(matches!(
            transport.write(b"x").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_fault_and_rejected_writes() {
        let (mut transport, remote) = pair("loop0");
        remote.fault("line noise");
        assert!(matches!(
            transport.read().await,
            Err(TransportError::ReceiveError(_))
        ));

        remote.reject_writes(true);
        assert!(matches!(
            transport.write(b"x").await,
            Err(TransportError::SendError(_))
        ));
    }

    #[tokio::test]
    async fn test_output_signals_only() {
        let (mut transport, mut remote) = pair("loop0");
        assert_ok!(transport.set_signal(Signal::Dtr, true).await);
        assert!(transport.set_signal(Signal::Cts, true).await.is_err());
        assert_eq!(remote.try_signals(), vec![(Signal::Dtr, true)]);
    }
}
