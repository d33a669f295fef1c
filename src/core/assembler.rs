//! Line assembly
//!
//! Accumulates decoded elements into display lines, one open line per
//! direction. The EOL sequence is matched on element boundaries against the
//! raw bytes of the elements, so a sequence split across two reads (or two
//! `feed` calls) closes exactly one line.

use crate::core::line::{elapsed, ByteStreamElement, Direction, DisplayLine, Origin};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Line framing settings of a terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    /// EOL sequence, escapes allowed (`\r`, `\n`, `\xNN`, ...)
    pub eol: String,
    /// Keep the EOL elements in the displayed line
    pub show_eol: bool,
    /// Close a line without EOL once its content reaches this many bytes
    pub max_line_length: Option<usize>,
    /// Close an open line after this much silence
    pub timeout_ms: Option<u64>,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            eol: "\\r\\n".to_string(),
            show_eol: false,
            max_line_length: None,
            timeout_ms: None,
        }
    }
}

/// Output of one [`LineAssembler::feed`] call
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    /// Lines closed by this call, in order
    pub closed: Vec<DisplayLine>,
    /// Snapshot of the line still open afterwards
    pub partial: Option<DisplayLine>,
}

#[derive(Debug, Default)]
struct OpenLine {
    content: Vec<ByteStreamElement>,
    content_len: usize,
    // Elements whose bytes are a prefix of the EOL sequence
    eol_pending: Vec<ByteStreamElement>,
}

impl OpenLine {
    fn is_empty(&self) -> bool {
        self.content.is_empty() && self.eol_pending.is_empty()
    }

    fn last_timestamp(&self) -> Option<DateTime<Local>> {
        self.eol_pending
            .last()
            .or_else(|| self.content.last())
            .map(|e| e.timestamp)
    }

    fn push_content(&mut self, element: ByteStreamElement) {
        self.content_len += element.bytes.len();
        self.content.push(element);
    }
}

/// Per-direction line assembler
#[derive(Debug)]
pub struct LineAssembler {
    eol: Vec<u8>,
    port_id: String,
    start: DateTime<Local>,
    show_eol: bool,
    max_line_length: Option<usize>,
    skip_empty_lines: bool,
    separators: [&'static str; 2],
    open: [OpenLine; 2],
    last_close: [Option<DateTime<Local>>; 2],
}

impl LineAssembler {
    /// Create an assembler closing lines on `eol`
    ///
    /// `eol` must not be empty.
    pub fn new(eol: Vec<u8>, port_id: impl Into<String>, start: DateTime<Local>) -> Self {
        Self {
            eol,
            port_id: port_id.into(),
            start,
            show_eol: false,
            max_line_length: None,
            skip_empty_lines: false,
            separators: ["", ""],
            open: Default::default(),
            last_close: [None, None],
        }
    }

    /// Keep EOL elements in displayed lines
    #[must_use]
    pub fn show_eol(mut self, show: bool) -> Self {
        self.show_eol = show;
        self
    }

    /// Close lines without EOL at this content length
    #[must_use]
    pub fn max_line_length(mut self, max: Option<usize>) -> Self {
        self.max_line_length = max.filter(|&m| m > 0);
        self
    }

    /// Drop lines without content
    #[must_use]
    pub fn skip_empty_lines(mut self, skip: bool) -> Self {
        self.skip_empty_lines = skip;
        self
    }

    /// Separator joining element texts of a direction
    #[must_use]
    pub fn separator(mut self, direction: Direction, separator: &'static str) -> Self {
        self.separators[direction.index()] = separator;
        self
    }

    /// Change the empty line policy
    pub fn set_skip_empty_lines(&mut self, skip: bool) {
        self.skip_empty_lines = skip;
    }

    /// EOL sequence
    pub fn eol(&self) -> &[u8] {
        &self.eol
    }

    /// Feed decoded elements of one direction
    pub fn feed(&mut self, direction: Direction, elements: Vec<ByteStreamElement>) -> Assembled {
        let mut closed = Vec::new();

        for element in elements {
            self.open[direction.index()].eol_pending.push(element);
            self.match_eol(direction, &mut closed);
        }

        Assembled {
            closed,
            partial: self.partial(direction),
        }
    }

    fn match_eol(&mut self, direction: Direction, closed: &mut Vec<DisplayLine>) {
        loop {
            let open = &mut self.open[direction.index()];
            if open.eol_pending.is_empty() {
                return;
            }

            let candidate: Vec<u8> = open
                .eol_pending
                .iter()
                .flat_map(|e| e.bytes.iter().copied())
                .collect();

            if candidate == self.eol {
                let eol_elements = std::mem::take(&mut open.eol_pending);
                let content = std::mem::take(&mut open.content);
                open.content_len = 0;
                if let Some(line) = self.close(direction, content, eol_elements) {
                    closed.push(line);
                }
                return;
            }

            if self.eol.starts_with(&candidate) {
                return;
            }

            let first = open.eol_pending.remove(0);
            open.push_content(first);

            if let Some(max) = self.max_line_length {
                if open.content_len >= max {
                    let content = std::mem::take(&mut open.content);
                    open.content_len = 0;
                    if let Some(line) = self.close(direction, content, Vec::new()) {
                        closed.push(line);
                    }
                }
            }
        }
    }

    /// Snapshot of the open line of a direction
    pub fn partial(&self, direction: Direction) -> Option<DisplayLine> {
        let open = &self.open[direction.index()];
        if open.is_empty() {
            return None;
        }
        let elements: Vec<_> = open
            .content
            .iter()
            .chain(open.eol_pending.iter())
            .cloned()
            .collect();
        let previous = self.last_close[direction.index()];
        Some(self.build(direction, elements, Vec::new(), previous))
    }

    /// Close the open line of a direction without EOL
    pub fn flush(&mut self, direction: Direction) -> Option<DisplayLine> {
        let open = std::mem::take(&mut self.open[direction.index()]);
        if open.is_empty() {
            return None;
        }
        let mut content = open.content;
        content.extend(open.eol_pending);
        self.close(direction, content, Vec::new())
    }

    /// Close open lines that received nothing for `timeout`
    pub fn flush_stale(&mut self, now: DateTime<Local>, timeout: Duration) -> Vec<DisplayLine> {
        Direction::ALL
            .into_iter()
            .filter(|&direction| {
                self.open[direction.index()]
                    .last_timestamp()
                    .is_some_and(|last| elapsed(last, now) >= timeout)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|direction| self.flush(direction))
            .collect()
    }

    fn close(
        &mut self,
        direction: Direction,
        content: Vec<ByteStreamElement>,
        eol_elements: Vec<ByteStreamElement>,
    ) -> Option<DisplayLine> {
        let previous = self.last_close[direction.index()];
        let line = self.build(direction, content, eol_elements, previous);
        self.last_close[direction.index()] = Some(line.closed_at);

        if self.skip_empty_lines && line.content.is_empty() {
            return None;
        }
        Some(line)
    }

    fn build(
        &self,
        direction: Direction,
        content: Vec<ByteStreamElement>,
        eol_elements: Vec<ByteStreamElement>,
        previous_close: Option<DateTime<Local>>,
    ) -> DisplayLine {
        let first = content.first().or_else(|| eol_elements.first());
        let last = eol_elements.last().or_else(|| content.last());
        let timestamp = first.map_or(self.start, |e| e.timestamp);
        let closed_at = last.map_or(timestamp, |e| e.timestamp);
        let origin = first.map_or(Origin::Remote, |e| e.origin);

        let content_bytes: Vec<u8> = content.iter().flat_map(|e| e.bytes.iter().copied()).collect();
        let eol: Vec<u8> = eol_elements
            .iter()
            .flat_map(|e| e.bytes.iter().copied())
            .collect();

        let mut elements = content;
        if self.show_eol {
            elements.extend(eol_elements);
        }
        let text = elements
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(self.separators[direction.index()]);

        DisplayLine {
            number: 0,
            timestamp,
            closed_at,
            time_span: elapsed(self.start, timestamp),
            time_delta: previous_close.map_or(Duration::ZERO, |prev| elapsed(prev, timestamp)),
            duration: elapsed(timestamp, closed_at),
            direction,
            port_id: self.port_id.clone(),
            origin,
            length: content_bytes.len() + eol.len(),
            content: content_bytes,
            eol,
            elements,
            text,
            highlighted: false,
        }
    }
}
