//! Events published by a terminal
//!
//! Every payload is an owned copy; subscribers never see live pipeline state.

use crate::core::connect_time::ConnectTimeSnapshot;
use crate::core::flow::Signal;
use crate::core::line::{Direction, DisplayLine};
use crate::core::repository::RepositoryKind;
use crate::core::trigger::{AutoAction, EngineKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a fired trigger did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPayload {
    /// AutoAction operation
    Action(AutoAction),
    /// AutoResponse bytes queued for transmission
    Response(Vec<u8>),
}

/// Terminal event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TerminalEvent {
    /// Worker started on a transport
    Connected {
        /// Port identifier
        port_id: String,
    },
    /// Line appended to a repository
    LineAdded {
        /// Target repository
        repository: RepositoryKind,
        /// Stored copy, numbered by the repository
        line: DisplayLine,
    },
    /// Open line changed
    LinePending {
        /// Direction of the open line
        direction: Direction,
        /// Snapshot of the open line
        line: DisplayLine,
    },
    /// Trigger engine fired
    TriggerFired {
        /// Engine
        engine: EngineKind,
        /// Trigger pattern
        trigger: String,
        /// Matched text
        matched: String,
        /// Action taken or response queued
        payload: TriggerPayload,
        /// Engine counter after the firing
        count: u64,
    },
    /// Action or response of a fired trigger failed
    TriggerActionFailed {
        /// Engine
        engine: EngineKind,
        /// Error message
        error: String,
    },
    /// Repository byte/line count changed
    CounterChanged {
        /// Repository
        repository: RepositoryKind,
        /// Bytes held
        bytes: u64,
        /// Lines held
        lines: u64,
    },
    /// Repository rate changed on a tick
    RateChanged {
        /// Repository
        repository: RepositoryKind,
        /// Bytes per rate window
        bytes_per_interval: u64,
        /// Lines per rate window
        lines_per_interval: u64,
    },
    /// Repository cleared
    RepositoryCleared {
        /// Repository
        repository: RepositoryKind,
    },
    /// Signal line changed
    FlowChanged {
        /// Signal
        signal: Signal,
        /// New value
        value: bool,
        /// Transition counter
        transitions: u64,
    },
    /// Transport failed; the worker stops
    TransportFault {
        /// Error message
        error: String,
    },
    /// Worker stopped
    Disconnected {
        /// Connect time at the moment of disconnection
        connect_time: ConnectTimeSnapshot,
    },
}

/// Event with its terminal and sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Terminal that produced the event
    pub terminal: Uuid,
    /// Per-terminal sequence number, starting at 1
    pub sequence: u64,
    /// Event
    #[serde(flatten)]
    pub event: TerminalEvent,
}
