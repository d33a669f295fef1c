//! Flow control and signal line state
//!
//! Tracks the handshake lines, XOn/XOff and break state shown in the status
//! bar. Updates are last-write-wins; break and XOn/XOff signals also count
//! their transitions until the counters are reset.

use crate::core::line::Direction;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// XOn byte (DC1)
pub const XON: u8 = 0x11;
/// XOff byte (DC3)
pub const XOFF: u8 = 0x13;

/// Monitored signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Ready for receiving (RTS), output
    Rfr,
    /// Clear to send, input
    Cts,
    /// Data terminal ready, output
    Dtr,
    /// Data set ready, input
    Dsr,
    /// Data carrier detect, input
    Dcd,
    /// Local side sent XOff
    InputXOff,
    /// Remote side sent XOff
    OutputXOff,
    /// Break received
    InputBreak,
    /// Break sent
    OutputBreak,
}

impl Signal {
    /// All signals, in status bar order
    pub const ALL: [Signal; 9] = [
        Self::Rfr,
        Self::Cts,
        Self::Dtr,
        Self::Dsr,
        Self::Dcd,
        Self::InputXOff,
        Self::OutputXOff,
        Self::InputBreak,
        Self::OutputBreak,
    ];

    /// Whether transitions of this signal are counted
    pub fn is_counted(self) -> bool {
        matches!(
            self,
            Self::InputXOff | Self::OutputXOff | Self::InputBreak | Self::OutputBreak
        )
    }

    /// Whether the local side drives this signal
    pub fn is_output(self) -> bool {
        matches!(self, Self::Rfr | Self::Dtr | Self::OutputBreak)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rfr => "RFR",
            Self::Cts => "CTS",
            Self::Dtr => "DTR",
            Self::Dsr => "DSR",
            Self::Dcd => "DCD",
            Self::InputXOff => "InputXOff",
            Self::OutputXOff => "OutputXOff",
            Self::InputBreak => "InputBreak",
            Self::OutputBreak => "OutputBreak",
        };
        f.write_str(name)
    }
}

/// Flow control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    /// No flow control
    #[default]
    None,
    /// RFR/CTS
    Hardware,
    /// XOn/XOff in the data stream
    Software,
}

/// State of one signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    /// Current value
    pub value: bool,
    /// Time of the last change
    pub changed_at: Option<DateTime<Local>>,
    /// Counted transitions since the last reset
    pub transitions: u64,
}

/// A change reported by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowChange {
    /// Signal that changed
    pub signal: Signal,
    /// New value
    pub value: bool,
    /// Transition counter after the change
    pub transitions: u64,
}

/// Signal state of one terminal
#[derive(Debug)]
pub struct FlowStateTracker {
    mode: FlowControl,
    states: [FlowState; 9],
}

impl FlowStateTracker {
    /// Create a tracker with every signal low
    pub fn new(mode: FlowControl) -> Self {
        Self {
            mode,
            states: [FlowState::default(); 9],
        }
    }

    /// Flow control mode
    pub fn mode(&self) -> FlowControl {
        self.mode
    }

    /// Record a signal value; returns the change, if it was one
    pub fn on_signal_changed(
        &mut self,
        signal: Signal,
        value: bool,
        now: DateTime<Local>,
    ) -> Option<FlowChange> {
        let state = &mut self.states[signal.index()];
        if state.value == value {
            return None;
        }
        state.value = value;
        state.changed_at = Some(now);
        if signal.is_counted() {
            state.transitions += 1;
        }
        Some(FlowChange {
            signal,
            value,
            transitions: state.transitions,
        })
    }

    /// Follow XOn/XOff bytes in the data stream (software flow control only)
    pub fn observe_data(
        &mut self,
        direction: Direction,
        bytes: &[u8],
        now: DateTime<Local>,
    ) -> Vec<FlowChange> {
        if self.mode != FlowControl::Software {
            return Vec::new();
        }
        let signal = match direction {
            Direction::Rx => Signal::OutputXOff,
            Direction::Tx => Signal::InputXOff,
        };
        bytes
            .iter()
            .filter_map(|&byte| match byte {
                XOFF => self.on_signal_changed(signal, true, now),
                XON => self.on_signal_changed(signal, false, now),
                _ => None,
            })
            .collect()
    }

    /// State of a signal
    pub fn state(&self, signal: Signal) -> FlowState {
        self.states[signal.index()]
    }

    /// Zero the transition counters
    pub fn reset_counters(&mut self) {
        for state in &mut self.states {
            state.transitions = 0;
        }
    }

    /// All signal states
    pub fn snapshot(&self) -> Vec<(Signal, FlowState)> {
        Signal::ALL
            .iter()
            .map(|&signal| (signal, self.state(signal)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut flow = FlowStateTracker::new(FlowControl::Hardware);
        let now = Local::now();
        assert!(flow.on_signal_changed(Signal::Cts, true, now).is_some());
        assert!(flow.on_signal_changed(Signal::Cts, true, now).is_none());
        let change = flow.on_signal_changed(Signal::Cts, false, now).unwrap();
        assert!(!change.value);
        // Handshake lines are not counted
        assert_eq!(flow.state(Signal::Cts).transitions, 0);
    }

    #[test]
    fn test_break_counter_and_reset() {
        let mut flow = FlowStateTracker::new(FlowControl::None);
        let now = Local::now();
        flow.on_signal_changed(Signal::InputBreak, true, now);
        flow.on_signal_changed(Signal::InputBreak, false, now);
        assert_eq!(flow.state(Signal::InputBreak).transitions, 2);

        flow.reset_counters();
        let state = flow.state(Signal::InputBreak);
        assert_eq!(state.transitions, 0);
        assert!(!state.value);
    }

    #[test]
    fn test_software_flow_control() {
        let mut flow = FlowStateTracker::new(FlowControl::Software);
        let now = Local::now();
        let changes = flow.observe_data(Direction::Rx, &[b'a', XOFF, XOFF, b'b', XON], now);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].signal, Signal::OutputXOff);
        assert!(changes[0].value);
        assert_eq!(flow.state(Signal::OutputXOff).transitions, 2);

        let changes = flow.observe_data(Direction::Tx, &[XOFF], now);
        assert_eq!(changes[0].signal, Signal::InputXOff);
    }

    #[test]
    fn test_xoff_ignored_without_software_mode() {
        let mut flow = FlowStateTracker::new(FlowControl::Hardware);
        assert!(flow.observe_data(Direction::Rx, &[XOFF], Local::now()).is_empty());
    }

    #[test]
    fn test_signal_roles() {
        assert!(Signal::Dtr.is_output());
        assert!(!Signal::Cts.is_output());
        assert!(Signal::OutputBreak.is_counted());
        assert!(!Signal::Dcd.is_counted());
    }
}
