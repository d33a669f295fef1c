//! Trigger system for automatic actions and responses
//!
//! Provides:
//! - Trigger definitions (text, regex or hex byte patterns)
//! - Compilation with whole-word and case-sensitivity options
//! - The trigger engine state machine shared by AutoAction and AutoResponse
//! - Live stream scanning for byte patterns that do not wait for EOL

pub mod action;

pub use action::{
    AutoAction, AutoActionSettings, AutoResponseSettings, PreparedResponse, ResponsePayload,
};

use crate::core::codec::CodecError;
use crate::core::line::{Direction, DisplayLine, Origin};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the trigger pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Text, matched against the decoded line
    #[default]
    Text,
    /// Hex bytes (e.g., "FF 00 * 01" where * is a wildcard), matched against raw bytes
    Hex,
}

/// Lines a trigger listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Both directions, in Bidir order
    #[default]
    Bidir,
    /// Sent lines only
    Tx,
    /// Received lines only
    Rx,
}

impl TriggerSource {
    /// Whether data of a direction is evaluated
    pub fn accepts(self, direction: Direction) -> bool {
        match self {
            Self::Bidir => true,
            Self::Tx => direction == Direction::Tx,
            Self::Rx => direction == Direction::Rx,
        }
    }
}

/// Trigger definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    /// Pattern text
    pub pattern: String,
    /// Pattern interpretation
    pub kind: PatternKind,
    /// Case-sensitive text comparison
    pub case_sensitive: bool,
    /// Match on word boundaries only
    pub whole_word: bool,
    /// Compile the pattern as a regular expression
    pub regex: bool,
    /// Armed when configured
    pub enabled: bool,
    /// Direction filter
    pub source: TriggerSource,
    /// Scan the live stream instead of closed lines (hex patterns only)
    pub match_partial: bool,
    /// Also evaluate lines produced by automatic responses
    pub allow_self_trigger: bool,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            kind: PatternKind::Text,
            case_sensitive: true,
            whole_word: false,
            regex: false,
            enabled: true,
            source: TriggerSource::Bidir,
            match_partial: false,
            allow_self_trigger: false,
        }
    }
}

impl TriggerSettings {
    /// Create a text trigger
    pub fn text(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            ..Default::default()
        }
    }

    /// Create a hex byte trigger
    pub fn hex(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind: PatternKind::Hex,
            ..Default::default()
        }
    }

    /// Set case sensitivity
    #[must_use]
    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    /// Set whole-word matching
    #[must_use]
    pub fn whole_word(mut self, value: bool) -> Self {
        self.whole_word = value;
        self
    }

    /// Set regex mode
    #[must_use]
    pub fn regex(mut self, value: bool) -> Self {
        self.regex = value;
        self
    }

    /// Set the direction filter
    #[must_use]
    pub fn source(mut self, source: TriggerSource) -> Self {
        self.source = source;
        self
    }

    /// Set stream scanning
    #[must_use]
    pub fn match_partial(mut self, value: bool) -> Self {
        self.match_partial = value;
        self
    }

    /// Allow automatic responses to re-trigger
    #[must_use]
    pub fn allow_self_trigger(mut self, value: bool) -> Self {
        self.allow_self_trigger = value;
        self
    }

    /// Set the enabled flag
    #[must_use]
    pub fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Validate and compile the pattern
    pub fn compile(&self) -> Result<CompiledTrigger, TriggerError> {
        if self.pattern.trim().is_empty() {
            return Err(TriggerError::EmptyPattern);
        }

        let matcher = match self.kind {
            PatternKind::Text => {
                if self.match_partial {
                    return Err(TriggerError::InvalidSetting(
                        "stream matching applies to hex patterns only".to_string(),
                    ));
                }
                let mut source = if self.regex {
                    self.pattern.clone()
                } else {
                    regex::escape(&self.pattern)
                };
                if self.whole_word {
                    source = format!(r"\b(?:{})\b", source);
                }
                let regex = RegexBuilder::new(&source)
                    .case_insensitive(!self.case_sensitive)
                    .build()
                    .map_err(|source| TriggerError::InvalidRegex {
                        pattern: self.pattern.clone(),
                        source,
                    })?;
                Matcher::Text(regex)
            }
            PatternKind::Hex => {
                if self.regex {
                    return Err(TriggerError::InvalidSetting(
                        "regex matching applies to text patterns only".to_string(),
                    ));
                }
                Matcher::Bytes(parse_hex_pattern(&self.pattern)?)
            }
        };

        Ok(CompiledTrigger {
            settings: self.clone(),
            matcher,
        })
    }
}

fn parse_hex_pattern(pattern: &str) -> Result<Vec<Option<u8>>, TriggerError> {
    let mut bytes = Vec::new();
    for part in pattern.split_whitespace() {
        if part == "*" || part == "??" {
            bytes.push(None);
            continue;
        }
        let digits = part
            .strip_prefix("0x")
            .or_else(|| part.strip_prefix("0X"))
            .unwrap_or(part);
        let decoded = hex::decode(digits).map_err(|_| TriggerError::InvalidHex(part.to_string()))?;
        bytes.extend(decoded.into_iter().map(Some));
    }
    if bytes.is_empty() {
        return Err(TriggerError::EmptyPattern);
    }
    Ok(bytes)
}

/// Trigger errors, all raised while configuring
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Pattern is empty
    #[error("Trigger pattern is empty")]
    EmptyPattern,

    /// Regex failed to compile
    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        /// Pattern as entered
        pattern: String,
        /// Compile error
        #[source]
        source: regex::Error,
    },

    /// Hex pattern token is not valid hex
    #[error("Invalid hex pattern token: {0}")]
    InvalidHex(String),

    /// Option combination not supported
    #[error("Invalid trigger setting: {0}")]
    InvalidSetting(String),

    /// Response refers to a missing predefined command
    #[error("Predefined command {index} out of range (1..={available})")]
    PredefinedCommandOutOfRange {
        /// Requested 1-based index
        index: usize,
        /// Number of defined commands
        available: usize,
    },

    /// Response payload could not be encoded
    #[error("Invalid response payload: {0}")]
    InvalidPayload(#[from] CodecError),
}

#[derive(Debug, Clone)]
enum Matcher {
    Text(Regex),
    Bytes(Vec<Option<u8>>),
}

/// Matched text plus the bytes it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Display form of the match
    pub text: String,
    /// Raw bytes of the match
    pub bytes: Vec<u8>,
}

/// Validated, ready-to-match trigger
#[derive(Debug, Clone)]
pub struct CompiledTrigger {
    settings: TriggerSettings,
    matcher: Matcher,
}

impl CompiledTrigger {
    /// Settings the trigger was compiled from
    pub fn settings(&self) -> &TriggerSettings {
        &self.settings
    }

    /// Pattern as entered
    pub fn pattern(&self) -> &str {
        &self.settings.pattern
    }

    /// Length of a byte pattern, `None` for text patterns
    pub fn byte_len(&self) -> Option<usize> {
        match &self.matcher {
            Matcher::Bytes(bytes) => Some(bytes.len()),
            Matcher::Text(_) => None,
        }
    }

    /// Whether the trigger scans the live stream
    pub fn is_partial(&self) -> bool {
        self.settings.match_partial && self.byte_len().is_some()
    }

    /// First match within a line
    ///
    /// `text` is the line content decoded with the terminal encoding,
    /// `encode` turns matched text back into bytes.
    pub fn find_in_line(
        &self,
        text: &str,
        content: &[u8],
        encode: impl Fn(&str) -> Vec<u8>,
    ) -> Option<TriggerMatch> {
        match &self.matcher {
            Matcher::Text(regex) => regex.find(text).map(|m| TriggerMatch {
                text: m.as_str().to_string(),
                bytes: encode(m.as_str()),
            }),
            Matcher::Bytes(pattern) => find_bytes(pattern, content, 0).map(|(start, end)| {
                byte_match(&content[start..end])
            }),
        }
    }
}

fn byte_match(bytes: &[u8]) -> TriggerMatch {
    TriggerMatch {
        text: bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" "),
        bytes: bytes.to_vec(),
    }
}

/// Position of the first match at or after `from`
fn find_bytes(pattern: &[Option<u8>], data: &[u8], from: usize) -> Option<(usize, usize)> {
    if pattern.is_empty() || data.len() < pattern.len() {
        return None;
    }
    (from..=data.len() - pattern.len())
        .find(|&start| {
            pattern
                .iter()
                .zip(&data[start..])
                .all(|(expected, actual)| expected.map_or(true, |e| e == *actual))
        })
        .map(|start| (start, start + pattern.len()))
}

/// Trigger engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// No trigger configured
    Inactive,
    /// Waiting for a match
    Armed,
    /// Executing the action of a match
    Firing,
    /// Switched off by the user
    Deactivated,
}

/// Which engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Local action on match
    AutoAction,
    /// Transmit a reply on match
    AutoResponse,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoAction => write!(f, "AutoAction"),
            Self::AutoResponse => write!(f, "AutoResponse"),
        }
    }
}

/// One firing of an engine
#[derive(Debug, Clone)]
pub struct TriggerHit<P> {
    /// Pattern of the trigger that fired
    pub trigger: String,
    /// What matched
    pub matched: TriggerMatch,
    /// Action or response of the trigger
    pub payload: P,
    /// Counter after this firing
    pub count: u64,
}

/// Carry-over of the last bytes of each direction for stream scanning
#[derive(Debug, Default)]
struct StreamScanner {
    carry: [Vec<u8>; 2],
}

impl StreamScanner {
    fn scan(&mut self, pattern: &[Option<u8>], direction: Direction, bytes: &[u8]) -> Vec<TriggerMatch> {
        let carry = &mut self.carry[direction.index()];
        let mut window = std::mem::take(carry);
        window.extend_from_slice(bytes);

        let mut matches = Vec::new();
        let mut consumed = 0;
        while let Some((start, end)) = find_bytes(pattern, &window, consumed) {
            matches.push(byte_match(&window[start..end]));
            consumed = end;
        }

        let keep_from = consumed.max(window.len().saturating_sub(pattern.len().saturating_sub(1)));
        *carry = window[keep_from..].to_vec();
        matches
    }

    fn clear(&mut self) {
        self.carry = Default::default();
    }
}

/// Trigger state machine shared by the AutoAction and AutoResponse engines
///
/// Lines are evaluated in Bidir order; each matching line fires once. Byte
/// triggers with `match_partial` fire per stream occurrence instead and are
/// skipped on line close.
#[derive(Debug)]
pub struct TriggerEngine<P> {
    kind: EngineKind,
    trigger: Option<(CompiledTrigger, P)>,
    state: TriggerState,
    count: u64,
    scanner: StreamScanner,
}

impl<P: Clone> TriggerEngine<P> {
    /// Create an engine without trigger
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            trigger: None,
            state: TriggerState::Inactive,
            count: 0,
            scanner: StreamScanner::default(),
        }
    }

    /// Engine kind
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Install or remove the trigger; the counter restarts at zero
    pub fn configure(&mut self, trigger: Option<(CompiledTrigger, P)>) {
        self.state = match &trigger {
            None => TriggerState::Inactive,
            Some((compiled, _)) if compiled.settings().enabled => TriggerState::Armed,
            Some(_) => TriggerState::Deactivated,
        };
        self.trigger = trigger;
        self.count = 0;
        self.scanner.clear();
    }

    /// Installed trigger
    pub fn trigger(&self) -> Option<&CompiledTrigger> {
        self.trigger.as_ref().map(|(compiled, _)| compiled)
    }

    /// Re-arm a deactivated trigger, keeping its counter
    pub fn activate(&mut self) -> TriggerState {
        if self.state == TriggerState::Deactivated && self.trigger.is_some() {
            self.state = TriggerState::Armed;
        }
        self.state
    }

    /// Stop matching, keeping the counter
    pub fn deactivate(&mut self) -> TriggerState {
        if matches!(self.state, TriggerState::Armed | TriggerState::Firing) {
            self.state = TriggerState::Deactivated;
            self.scanner.clear();
        }
        self.state
    }

    /// Zero the match counter
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Match counter
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current state
    pub fn state(&self) -> TriggerState {
        self.state
    }

    fn listens_to(&self, compiled: &CompiledTrigger, direction: Direction, self_produced: bool) -> bool {
        self.state == TriggerState::Armed
            && compiled.settings().source.accepts(direction)
            && (!self_produced || compiled.settings().allow_self_trigger)
    }

    /// Match a closed line
    pub fn match_line(
        &self,
        line: &DisplayLine,
        text: &str,
        encode: impl Fn(&str) -> Vec<u8>,
    ) -> Option<TriggerMatch> {
        let (compiled, _) = self.trigger.as_ref()?;
        if compiled.is_partial()
            || !self.listens_to(compiled, line.direction, line.contains_origin(Origin::AutoResponse))
        {
            return None;
        }
        compiled.find_in_line(text, &line.content, encode)
    }

    /// Scan raw stream bytes for partial byte triggers
    pub fn match_stream(
        &mut self,
        direction: Direction,
        origin: Origin,
        bytes: &[u8],
    ) -> Vec<TriggerMatch> {
        let Some((compiled, _)) = self.trigger.as_ref() else {
            return Vec::new();
        };
        if !compiled.is_partial()
            || !self.listens_to(compiled, direction, origin == Origin::AutoResponse)
        {
            return Vec::new();
        }
        let Matcher::Bytes(pattern) = &compiled.matcher else {
            return Vec::new();
        };
        self.scanner.scan(pattern, direction, bytes)
    }

    /// Armed → Firing: count the match and hand out the payload
    pub fn fire(&mut self, matched: TriggerMatch) -> Option<TriggerHit<P>> {
        if self.state != TriggerState::Armed {
            return None;
        }
        let (compiled, payload) = self.trigger.as_ref()?;
        self.state = TriggerState::Firing;
        self.count += 1;

        tracing::debug!(
            engine = %self.kind,
            pattern = compiled.pattern(),
            matched = %matched.text,
            count = self.count,
            "Trigger fired"
        );

        Some(TriggerHit {
            trigger: compiled.pattern().to_string(),
            matched,
            payload: payload.clone(),
            count: self.count,
        })
    }

    /// Firing → Armed once the action or response has been carried out
    pub fn complete(&mut self) {
        if self.state == TriggerState::Firing {
            self.state = TriggerState::Armed;
        }
    }

    /// Match and fire on a closed line in one step
    pub fn evaluate_line(
        &mut self,
        line: &DisplayLine,
        text: &str,
        encode: impl Fn(&str) -> Vec<u8>,
    ) -> Option<TriggerHit<P>> {
        let matched = self.match_line(line, text, encode)?;
        self.fire(matched)
    }
}
