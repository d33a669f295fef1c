//! Connect time bookkeeping

use crate::core::line::elapsed;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Active and cumulative connect time of a terminal
#[derive(Debug, Clone, Default)]
pub struct ConnectTime {
    connected_at: Option<DateTime<Local>>,
    accumulated: Duration,
}

/// Point-in-time view of [`ConnectTime`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectTimeSnapshot {
    /// Current connection, zero while disconnected
    pub active: Duration,
    /// All connections, including the current one
    pub total: Duration,
}

impl ConnectTime {
    /// Continue from a total carried over from earlier sessions
    pub fn with_total(total: Duration) -> Self {
        Self {
            connected_at: None,
            accumulated: total,
        }
    }

    /// Start a connection; ignored while already connected
    pub fn connect(&mut self, now: DateTime<Local>) {
        if self.connected_at.is_none() {
            self.connected_at = Some(now);
        }
    }

    /// End the connection, folding it into the total
    pub fn disconnect(&mut self, now: DateTime<Local>) {
        if let Some(since) = self.connected_at.take() {
            self.accumulated += elapsed(since, now);
        }
    }

    /// Whether a connection is active
    pub fn is_connected(&self) -> bool {
        self.connected_at.is_some()
    }

    /// Duration of the current connection
    pub fn active(&self, now: DateTime<Local>) -> Duration {
        self.connected_at.map_or(Duration::ZERO, |since| elapsed(since, now))
    }

    /// Cumulative duration
    pub fn total(&self, now: DateTime<Local>) -> Duration {
        self.accumulated + self.active(now)
    }

    /// Both values at `now`
    pub fn snapshot(&self, now: DateTime<Local>) -> ConnectTimeSnapshot {
        ConnectTimeSnapshot {
            active: self.active(now),
            total: self.total(now),
        }
    }
}
