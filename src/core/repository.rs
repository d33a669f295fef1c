//! Line repositories (Tx, Bidir, Rx)
//!
//! A repository is an ordered, bounded store of closed lines. It numbers the
//! lines it receives, keeps the byte/line count of what it currently holds in
//! step with its contents, and tracks cumulative totals and a trailing-window
//! rate for the status bar.

use crate::core::line::{elapsed, Direction, DisplayLine};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Repository identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    /// Sent lines
    Tx,
    /// Lines of both directions in arrival order
    Bidir,
    /// Received lines
    Rx,
}

impl RepositoryKind {
    /// All repositories, in display order
    pub const ALL: [RepositoryKind; 3] = [Self::Tx, Self::Bidir, Self::Rx];

    /// Direction-specific repository
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Tx => Self::Tx,
            Direction::Rx => Self::Rx,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Tx => 0,
            Self::Bidir => 1,
            Self::Rx => 2,
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx => write!(f, "Tx"),
            Self::Bidir => write!(f, "Bidir"),
            Self::Rx => write!(f, "Rx"),
        }
    }
}

/// Byte and line count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteLineCount {
    /// Bytes, EOL included
    pub bytes: u64,
    /// Lines
    pub lines: u64,
}

impl ByteLineCount {
    fn add(&mut self, line: &DisplayLine) {
        self.bytes += line.length as u64;
        self.lines += 1;
    }

    fn sub(&mut self, line: &DisplayLine) {
        self.bytes = self.bytes.saturating_sub(line.length as u64);
        self.lines = self.lines.saturating_sub(1);
    }
}

/// Throughput over the rate window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// Bytes per window
    pub bytes_per_interval: u64,
    /// Lines per window
    pub lines_per_interval: u64,
}

#[derive(Debug)]
struct RateCounter {
    window: Duration,
    samples: VecDeque<(DateTime<Local>, u64)>,
    current: Rate,
}

impl RateCounter {
    fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            current: Rate::default(),
        }
    }

    fn record(&mut self, at: DateTime<Local>, bytes: u64) {
        self.prune(at);
        self.samples.push_back((at, bytes));
    }

    /// Drop samples that left the window ending at `now`
    fn prune(&mut self, now: DateTime<Local>) {
        while let Some(&(at, _)) = self.samples.front() {
            if at <= now && elapsed(at, now) >= self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn refresh(&mut self, now: DateTime<Local>) -> Rate {
        self.prune(now);
        self.current = Rate {
            bytes_per_interval: self.samples.iter().map(|(_, bytes)| bytes).sum(),
            lines_per_interval: self.samples.len() as u64,
        };
        self.current
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.current = Rate::default();
    }
}

/// Ordered, bounded line store
#[derive(Debug)]
pub struct Repository {
    kind: RepositoryKind,
    capacity: usize,
    lines: VecDeque<DisplayLine>,
    count: ByteLineCount,
    totals: ByteLineCount,
    next_number: u64,
    last_close: Option<DateTime<Local>>,
    rate: RateCounter,
}

impl Repository {
    /// Create a repository holding up to `capacity` lines
    pub fn new(kind: RepositoryKind, capacity: usize, rate_window: Duration) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            lines: VecDeque::new(),
            count: ByteLineCount::default(),
            totals: ByteLineCount::default(),
            next_number: 1,
            last_close: None,
            rate: RateCounter::new(rate_window),
        }
    }

    /// Repository identity
    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    /// Append a closed line, returning the stored copy
    pub fn append(&mut self, mut line: DisplayLine) -> &DisplayLine {
        line.number = self.next_number;
        self.next_number += 1;
        line.time_delta = self
            .last_close
            .map_or(std::time::Duration::ZERO, |prev| elapsed(prev, line.timestamp));
        self.last_close = Some(line.closed_at);

        self.count.add(&line);
        self.totals.add(&line);
        self.rate.record(line.closed_at, line.length as u64);

        while self.lines.len() >= self.capacity {
            if let Some(evicted) = self.lines.pop_front() {
                self.count.sub(&evicted);
            }
        }

        self.lines.push_back(line);
        &self.lines[self.lines.len() - 1]
    }

    /// Remove all lines; numbering and totals continue
    pub fn clear(&mut self) {
        self.lines.clear();
        self.count = ByteLineCount::default();
        self.last_close = None;
        self.rate.clear();
    }

    /// Lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &DisplayLine> + '_ {
        self.lines.iter()
    }

    /// Number of lines held
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the repository holds no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Bytes and lines currently held
    pub fn count(&self) -> ByteLineCount {
        self.count
    }

    /// Bytes and lines appended since the last counter reset
    pub fn totals(&self) -> ByteLineCount {
        self.totals
    }

    /// Reset the cumulative totals
    pub fn reset_counters(&mut self) {
        self.totals = ByteLineCount::default();
        self.rate.clear();
    }

    /// Rate as of the last tick
    pub fn rate(&self) -> Rate {
        self.rate.current
    }

    /// Recompute the rate; returns it if it changed
    pub fn tick(&mut self, now: DateTime<Local>) -> Option<Rate> {
        let before = self.rate.current;
        let after = self.rate.refresh(now);
        (before != after).then_some(after)
    }

    /// Cloned contents
    pub fn snapshot(&self) -> Vec<DisplayLine> {
        self.lines.iter().cloned().collect()
    }
}
