//! Display line data model
//!
//! A [`ByteStreamElement`] is the smallest decoded unit (a character, a radix
//! token, a control mnemonic or an error marker). A [`DisplayLine`] is a closed
//! sequence of elements with the metadata shown in the monitor columns.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Data direction relative to the local terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by the local side
    Tx,
    /// Received from the remote side
    Rx,
}

impl Direction {
    /// Both directions, Tx first
    pub const ALL: [Direction; 2] = [Direction::Tx, Direction::Rx];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Tx => 0,
            Self::Rx => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx => write!(f, "TX"),
            Self::Rx => write!(f, "RX"),
        }
    }
}

/// Producer of the bytes behind an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Bytes read from the transport
    Remote,
    /// Bytes sent on behalf of the user
    Local,
    /// Bytes transmitted by the automatic response engine
    AutoResponse,
}

/// Classification of a decoded element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Printable character or numeric token
    Data,
    /// Control character (possibly shown as a mnemonic)
    Control,
    /// Malformed input replaced by a placeholder
    Error,
}

/// One decoded unit of the byte stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByteStreamElement {
    /// Raw bytes this element was decoded from
    pub bytes: Vec<u8>,
    /// Display text
    pub text: String,
    /// Element classification
    pub kind: ElementKind,
    /// Stream direction
    pub direction: Direction,
    /// Producer of the bytes
    pub origin: Origin,
    /// Arrival time of the read that carried the bytes
    pub timestamp: DateTime<Local>,
}

impl ByteStreamElement {
    /// Create a new element
    pub fn new(
        bytes: Vec<u8>,
        text: impl Into<String>,
        kind: ElementKind,
        direction: Direction,
        origin: Origin,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            bytes,
            text: text.into(),
            kind,
            direction,
            origin,
            timestamp,
        }
    }

    /// Whether the element is an inline decode error marker
    pub fn is_error(&self) -> bool {
        self.kind == ElementKind::Error
    }
}

/// A closed (or, for pending snapshots, still open) display line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayLine {
    /// Line number, assigned by the repository the line is appended to
    pub number: u64,
    /// Arrival time of the first byte of the line
    pub timestamp: DateTime<Local>,
    /// Arrival time of the last byte of the line (including EOL)
    pub closed_at: DateTime<Local>,
    /// Time since the terminal session started
    pub time_span: Duration,
    /// Gap since the previous line was closed
    pub time_delta: Duration,
    /// First-to-last byte latency
    pub duration: Duration,
    /// Stream direction
    pub direction: Direction,
    /// Identifier of the port the line was seen on
    pub port_id: String,
    /// Producer of the first element
    pub origin: Origin,
    /// Displayed elements
    pub elements: Vec<ByteStreamElement>,
    /// Rendered text of the displayed elements
    pub text: String,
    /// Content bytes, without the EOL sequence
    pub content: Vec<u8>,
    /// EOL bytes that closed the line (empty if flushed or broken)
    pub eol: Vec<u8>,
    /// Total byte length, content plus EOL
    pub length: usize,
    /// Marked by the automatic action engine
    pub highlighted: bool,
}

impl DisplayLine {
    /// Whether any element of the line was produced by the given origin
    pub fn contains_origin(&self, origin: Origin) -> bool {
        self.origin == origin || self.elements.iter().any(|e| e.origin == origin)
    }

    /// Whether the line carries inline decode error markers
    pub fn has_errors(&self) -> bool {
        self.elements.iter().any(ByteStreamElement::is_error)
    }

    /// Whether the line was closed by an EOL sequence
    pub fn is_terminated(&self) -> bool {
        !self.eol.is_empty()
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.direction,
            self.text
        )
    }
}

/// Convert a signed chrono gap into a non-negative std duration
pub(crate) fn elapsed(from: DateTime<Local>, to: DateTime<Local>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}
