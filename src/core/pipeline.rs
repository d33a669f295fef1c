//! Single-writer terminal pipeline
//!
//! The pipeline owns every piece of mutable terminal state: decoder,
//! assembler, the three repositories, both trigger engines, flow state and
//! connect time. Each call returns the events it produced, in order, plus
//! the side effects the worker has to carry out (transmissions, close).
//!
//! It is also usable without a worker for offline replay.

use crate::core::assembler::LineAssembler;
use crate::core::codec::{ByteDecoder, TextEncoding};
use crate::core::connect_time::{ConnectTime, ConnectTimeSnapshot};
use crate::core::error::ConfigurationError;
use crate::core::event::{TerminalEvent, TriggerPayload};
use crate::core::flow::{FlowChange, FlowState, FlowStateTracker, Signal};
use crate::core::line::{Direction, DisplayLine, Origin};
use crate::core::repository::{ByteLineCount, Rate, Repository, RepositoryKind};
use crate::core::settings::TerminalSettings;
use crate::core::transport::TransportStats;
use crate::core::trigger::{
    AutoAction, AutoActionSettings, AutoResponseSettings, CompiledTrigger, EngineKind,
    PreparedResponse, TriggerEngine, TriggerHit, TriggerMatch, TriggerState,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;

/// Side effect requested by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Transmit an automatic response on the Tx path
    Transmit(Vec<u8>),
    /// Close the terminal
    Close,
}

/// Events and effects of one pipeline call
#[derive(Debug, Default)]
pub struct Output {
    /// Events in production order
    pub events: Vec<TerminalEvent>,
    /// Effects in request order
    pub effects: Vec<Effect>,
}

impl Output {
    fn event(&mut self, event: TerminalEvent) {
        self.events.push(event);
    }

    /// Append another output
    pub fn extend(&mut self, other: Output) {
        self.events.extend(other.events);
        self.effects.extend(other.effects);
    }

    /// Closed lines reported for a repository
    pub fn lines(&self, repository: RepositoryKind) -> impl Iterator<Item = &DisplayLine> + '_ {
        self.events.iter().filter_map(move |event| match event {
            TerminalEvent::LineAdded { repository: r, line } if *r == repository => Some(line),
            _ => None,
        })
    }
}

/// Contents and counters of one repository
#[derive(Debug, Clone, Serialize)]
pub struct RepositorySnapshot {
    /// Repository
    pub kind: RepositoryKind,
    /// Lines, oldest first
    pub lines: Vec<DisplayLine>,
    /// Bytes and lines held
    pub count: ByteLineCount,
    /// Bytes and lines since the last counter reset
    pub totals: ByteLineCount,
    /// Rate as of the last tick
    pub rate: Rate,
}

/// State of one trigger engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    /// Engine
    pub kind: EngineKind,
    /// State
    pub state: TriggerState,
    /// Match counter
    pub count: u64,
    /// Configured pattern
    pub pattern: Option<String>,
}

/// Copy of the complete terminal state
#[derive(Debug, Clone, Serialize)]
pub struct TerminalSnapshot {
    /// Tx, Bidir and Rx repositories, in that order
    pub repositories: Vec<RepositorySnapshot>,
    /// Open lines
    pub pending: Vec<DisplayLine>,
    /// AutoAction engine
    pub auto_action: EngineSnapshot,
    /// AutoResponse engine
    pub auto_response: EngineSnapshot,
    /// Signal states
    pub flow: Vec<(Signal, FlowState)>,
    /// Connect time
    pub connect_time: ConnectTimeSnapshot,
    /// Transport statistics, when a transport was attached
    pub transport: Option<TransportStats>,
}

impl TerminalSnapshot {
    /// Snapshot of one repository
    pub fn repository(&self, kind: RepositoryKind) -> Option<&RepositorySnapshot> {
        self.repositories.iter().find(|r| r.kind == kind)
    }

    /// Snapshot of one engine
    pub fn engine(&self, kind: EngineKind) -> &EngineSnapshot {
        match kind {
            EngineKind::AutoAction => &self.auto_action,
            EngineKind::AutoResponse => &self.auto_response,
        }
    }
}

/// Terminal pipeline
#[derive(Debug)]
pub struct Pipeline {
    port_id: String,
    encoding: TextEncoding,
    eol: Vec<u8>,
    predefined_commands: Vec<String>,
    decoder: ByteDecoder,
    assembler: LineAssembler,
    repositories: [Repository; 3],
    auto_action: TriggerEngine<AutoAction>,
    auto_response: TriggerEngine<PreparedResponse>,
    flow: FlowStateTracker,
    connect_time: ConnectTime,
    line_timeout: Option<Duration>,
}

impl Pipeline {
    /// Build a pipeline, compiling every trigger
    pub fn new(
        settings: &TerminalSettings,
        port_id: &str,
        start: DateTime<Local>,
    ) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        let eol = settings.eol_bytes()?;
        let display = settings.display.clone();

        let assembler = LineAssembler::new(eol.clone(), port_id, start)
            .show_eol(settings.line.show_eol)
            .max_line_length(settings.line.max_line_length)
            .separator(Direction::Tx, display.radix_for(Direction::Tx).separator())
            .separator(Direction::Rx, display.radix_for(Direction::Rx).separator());

        let window = settings.rate_window();
        let capacity = settings.repository_capacity;
        let repositories = RepositoryKind::ALL.map(|kind| Repository::new(kind, capacity, window));

        let mut auto_action = TriggerEngine::new(EngineKind::AutoAction);
        auto_action.configure(settings.compile_auto_action()?);
        let mut auto_response = TriggerEngine::new(EngineKind::AutoResponse);
        auto_response.configure(settings.compile_auto_response()?);

        Ok(Self {
            port_id: port_id.to_string(),
            encoding: display.encoding,
            eol,
            predefined_commands: settings.predefined_commands.clone(),
            decoder: ByteDecoder::new(display),
            assembler,
            repositories,
            auto_action,
            auto_response,
            flow: FlowStateTracker::new(settings.flow_control),
            connect_time: ConnectTime::default(),
            line_timeout: settings.line_timeout(),
        })
    }

    /// Continue the cumulative connect time of earlier sessions
    #[must_use]
    pub fn with_connect_total(mut self, total: Duration) -> Self {
        self.connect_time = ConnectTime::with_total(total);
        self
    }

    /// Port identifier stamped on lines
    pub fn port_id(&self) -> &str {
        &self.port_id
    }

    /// Drop empty lines (offline replay only)
    pub fn set_skip_empty_lines(&mut self, skip: bool) {
        self.assembler.set_skip_empty_lines(skip);
    }

    /// Run bytes of one read or write through the pipeline
    pub fn ingest(
        &mut self,
        direction: Direction,
        origin: Origin,
        bytes: &[u8],
        now: DateTime<Local>,
    ) -> Output {
        let mut out = Output::default();
        if bytes.is_empty() {
            return out;
        }

        for change in self.flow.observe_data(direction, bytes, now) {
            out.event(flow_event(change));
        }

        self.scan_stream(direction, origin, bytes, &mut out);

        let elements = self.decoder.decode(direction, origin, bytes, now);
        let fed = !elements.is_empty();
        let assembled = self.assembler.feed(direction, elements);
        for line in assembled.closed {
            self.commit_line(line, &mut out);
        }
        if let Some(line) = assembled.partial.filter(|_| fed) {
            out.event(TerminalEvent::LinePending { direction, line });
        }
        out
    }

    /// Offline replay: empty lines are skipped and the tail is flushed
    pub fn replay(&mut self, direction: Direction, bytes: &[u8], now: DateTime<Local>) -> Output {
        self.set_skip_empty_lines(true);
        let origin = match direction {
            Direction::Tx => Origin::Local,
            Direction::Rx => Origin::Remote,
        };
        let mut out = self.ingest(direction, origin, bytes, now);
        out.extend(self.flush(now));
        out
    }

    /// Close all open lines, turning dangling partial sequences into errors
    pub fn flush(&mut self, now: DateTime<Local>) -> Output {
        let mut out = Output::default();
        for direction in Direction::ALL {
            if let Some(element) = self.decoder.flush(direction, now) {
                let assembled = self.assembler.feed(direction, vec![element]);
                for line in assembled.closed {
                    self.commit_line(line, &mut out);
                }
            }
            if let Some(line) = self.assembler.flush(direction) {
                self.commit_line(line, &mut out);
            }
        }
        out
    }

    /// Periodic work: line timeout and rate refresh
    pub fn tick(&mut self, now: DateTime<Local>) -> Output {
        let mut out = Output::default();
        if let Some(timeout) = self.line_timeout {
            for line in self.assembler.flush_stale(now, timeout) {
                self.commit_line(line, &mut out);
            }
        }
        for repository in &mut self.repositories {
            if let Some(rate) = repository.tick(now) {
                out.event(TerminalEvent::RateChanged {
                    repository: repository.kind(),
                    bytes_per_interval: rate.bytes_per_interval,
                    lines_per_interval: rate.lines_per_interval,
                });
            }
        }
        out
    }

    /// Record a signal line change
    pub fn signal_changed(&mut self, signal: Signal, value: bool, now: DateTime<Local>) -> Output {
        let mut out = Output::default();
        if let Some(change) = self.flow.on_signal_changed(signal, value, now) {
            out.event(flow_event(change));
        }
        out
    }

    /// Clear one repository, or all of them
    pub fn clear_repository(&mut self, kind: Option<RepositoryKind>) -> Output {
        let mut out = Output::default();
        for repository in &mut self.repositories {
            if kind.is_some_and(|k| k != repository.kind()) {
                continue;
            }
            repository.clear();
            out.event(TerminalEvent::RepositoryCleared {
                repository: repository.kind(),
            });
            out.event(counter_event(repository));
        }
        out
    }

    /// Reset repository totals and flow transition counters
    pub fn reset_counters(&mut self) {
        for repository in &mut self.repositories {
            repository.reset_counters();
        }
        self.flow.reset_counters();
    }

    /// Replace the AutoAction trigger
    pub fn configure_auto_action(
        &mut self,
        settings: Option<&AutoActionSettings>,
    ) -> Result<(), ConfigurationError> {
        let compiled = settings.map(AutoActionSettings::compile).transpose()?;
        self.set_auto_action(compiled);
        Ok(())
    }

    /// Replace the AutoResponse trigger
    pub fn configure_auto_response(
        &mut self,
        settings: Option<&AutoResponseSettings>,
    ) -> Result<(), ConfigurationError> {
        let compiled = settings
            .map(|s| s.compile(self.encoding, &self.eol, &self.predefined_commands))
            .transpose()?;
        self.set_auto_response(compiled);
        Ok(())
    }

    /// Install an already compiled AutoAction trigger
    pub fn set_auto_action(&mut self, trigger: Option<(CompiledTrigger, AutoAction)>) {
        self.auto_action.configure(trigger);
    }

    /// Install an already compiled AutoResponse trigger
    pub fn set_auto_response(&mut self, trigger: Option<(CompiledTrigger, PreparedResponse)>) {
        self.auto_response.configure(trigger);
    }

    /// Activate or deactivate an engine
    pub fn set_trigger_active(&mut self, engine: EngineKind, active: bool) -> TriggerState {
        match (engine, active) {
            (EngineKind::AutoAction, true) => self.auto_action.activate(),
            (EngineKind::AutoAction, false) => self.auto_action.deactivate(),
            (EngineKind::AutoResponse, true) => self.auto_response.activate(),
            (EngineKind::AutoResponse, false) => self.auto_response.deactivate(),
        }
    }

    /// Zero an engine counter
    pub fn reset_trigger(&mut self, engine: EngineKind) {
        match engine {
            EngineKind::AutoAction => self.auto_action.reset(),
            EngineKind::AutoResponse => self.auto_response.reset(),
        }
    }

    /// Start connect time
    pub fn connect(&mut self, now: DateTime<Local>) -> TerminalEvent {
        self.connect_time.connect(now);
        TerminalEvent::Connected {
            port_id: self.port_id.clone(),
        }
    }

    /// Stop connect time
    pub fn disconnect(&mut self, now: DateTime<Local>) -> TerminalEvent {
        let connect_time = self.connect_time.snapshot(now);
        self.connect_time.disconnect(now);
        TerminalEvent::Disconnected { connect_time }
    }

    /// Repository by kind
    pub fn repository(&self, kind: RepositoryKind) -> &Repository {
        &self.repositories[kind.index()]
    }

    /// Copy of the complete state
    pub fn snapshot(&self, now: DateTime<Local>) -> TerminalSnapshot {
        TerminalSnapshot {
            repositories: self
                .repositories
                .iter()
                .map(|r| RepositorySnapshot {
                    kind: r.kind(),
                    lines: r.snapshot(),
                    count: r.count(),
                    totals: r.totals(),
                    rate: r.rate(),
                })
                .collect(),
            pending: Direction::ALL
                .into_iter()
                .filter_map(|d| self.assembler.partial(d))
                .collect(),
            auto_action: engine_snapshot(&self.auto_action),
            auto_response: engine_snapshot(&self.auto_response),
            flow: self.flow.snapshot(),
            connect_time: self.connect_time.snapshot(now),
            transport: None,
        }
    }

    fn scan_stream(&mut self, direction: Direction, origin: Origin, bytes: &[u8], out: &mut Output) {
        for matched in self.auto_action.match_stream(direction, origin, bytes) {
            if let Some(hit) = self.auto_action.fire(matched) {
                self.run_action(&hit, None, out);
                out.event(action_fired(hit));
                self.auto_action.complete();
            }
        }
        for matched in self.auto_response.match_stream(direction, origin, bytes) {
            if let Some(hit) = self.auto_response.fire(matched) {
                self.queue_response(hit, out);
            }
        }
    }

    fn commit_line(&mut self, mut line: DisplayLine, out: &mut Output) {
        let encoding = self.encoding;
        let text = encoding.decode_lossy(&line.content);

        // AutoAction runs before the line is stored so highlight and clear apply to it
        let action_hit = self
            .auto_action
            .match_line(&line, &text, |s| encoding.encode(s))
            .and_then(|matched| self.auto_action.fire(matched));
        if let Some(hit) = &action_hit {
            self.run_action(hit, Some(&mut line), out);
        }

        let direction_repo = RepositoryKind::for_direction(line.direction);
        for kind in [direction_repo, RepositoryKind::Bidir] {
            let repository = &mut self.repositories[kind.index()];
            let stored = repository.append(line.clone()).clone();
            out.event(TerminalEvent::LineAdded {
                repository: kind,
                line: stored,
            });
            out.event(counter_event(repository));
        }

        if let Some(hit) = action_hit {
            out.event(action_fired(hit));
            self.auto_action.complete();
        }

        let response_hit = self
            .auto_response
            .match_line(&line, &text, |s| encoding.encode(s))
            .and_then(|matched| self.auto_response.fire(matched));
        if let Some(hit) = response_hit {
            self.queue_response(hit, out);
        }
    }

    fn run_action(
        &mut self,
        hit: &TriggerHit<AutoAction>,
        line: Option<&mut DisplayLine>,
        out: &mut Output,
    ) {
        match &hit.payload {
            AutoAction::Highlight => {
                if let Some(line) = line {
                    line.highlighted = true;
                }
            }
            AutoAction::ClearRepositories => out.extend(self.clear_repository(None)),
            AutoAction::ResetCounters => self.reset_counters(),
            AutoAction::CloseTerminal => out.effects.push(Effect::Close),
            AutoAction::CountOnly | AutoAction::Beep | AutoAction::ShowMessage(_) => {}
        }
    }

    fn queue_response(&mut self, hit: TriggerHit<PreparedResponse>, out: &mut Output) {
        let bytes = hit.payload.resolve(&hit.matched);
        out.event(TerminalEvent::TriggerFired {
            engine: EngineKind::AutoResponse,
            trigger: hit.trigger,
            matched: hit.matched.text,
            payload: TriggerPayload::Response(bytes.clone()),
            count: hit.count,
        });
        out.effects.push(Effect::Transmit(bytes));
        self.auto_response.complete();
    }
}

fn action_fired(hit: TriggerHit<AutoAction>) -> TerminalEvent {
    let TriggerHit {
        trigger,
        matched: TriggerMatch { text, .. },
        payload,
        count,
    } = hit;
    TerminalEvent::TriggerFired {
        engine: EngineKind::AutoAction,
        trigger,
        matched: text,
        payload: TriggerPayload::Action(payload),
        count,
    }
}

fn counter_event(repository: &Repository) -> TerminalEvent {
    let count = repository.count();
    TerminalEvent::CounterChanged {
        repository: repository.kind(),
        bytes: count.bytes,
        lines: count.lines,
    }
}

fn flow_event(change: FlowChange) -> TerminalEvent {
    TerminalEvent::FlowChanged {
        signal: change.signal,
        value: change.value,
        transitions: change.transitions,
    }
}

fn engine_snapshot<P: Clone>(engine: &TriggerEngine<P>) -> EngineSnapshot {
    EngineSnapshot {
        kind: engine.kind(),
        state: engine.state(),
        count: engine.count(),
        pattern: engine.trigger().map(|t| t.pattern().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{DisplaySettings, Radix};
    use crate::core::flow::{FlowControl, XOFF};
    use crate::core::trigger::{ResponsePayload, TriggerSettings, TriggerSource};
    use chrono::Duration as ChronoDuration;

    fn pipeline(settings: TerminalSettings) -> Pipeline {
        Pipeline::new(&settings, "COM1", Local::now()).unwrap()
    }

    fn ping_pong() -> TerminalSettings {
        TerminalSettings::new("test").with_auto_response(AutoResponseSettings::new(
            TriggerSettings::text("PING").whole_word(true).case_sensitive(false),
            ResponsePayload::Text("PONG\\r\\n".to_string()),
        ))
    }

    fn texts<'a>(out: &'a Output, kind: RepositoryKind) -> Vec<&'a str> {
        out.lines(kind).map(|l| l.text.as_str()).collect()
    }

    fn fired(out: &Output) -> Vec<(EngineKind, u64)> {
        out.events
            .iter()
            .filter_map(|e| match e {
                TerminalEvent::TriggerFired { engine, count, .. } => Some((*engine, *count)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ping_pong() {
        let mut p = pipeline(ping_pong());
        let out = p.ingest(Direction::Rx, Origin::Remote, b"PING\r\n", Local::now());

        assert_eq!(texts(&out, RepositoryKind::Bidir), vec!["PING"]);
        assert_eq!(texts(&out, RepositoryKind::Rx), vec!["PING"]);
        assert_eq!(fired(&out), vec![(EngineKind::AutoResponse, 1)]);
        assert_eq!(out.effects, vec![Effect::Transmit(b"PONG\r\n".to_vec())]);
        assert_eq!(p.snapshot(Local::now()).auto_response.state, TriggerState::Armed);
    }

    #[test]
    fn test_response_echo_does_not_self_trigger() {
        let mut p = pipeline(
            TerminalSettings::new("echo").with_auto_response(AutoResponseSettings::new(
                TriggerSettings::text("ECHO"),
                ResponsePayload::Trigger,
            )),
        );
        let now = Local::now();
        let out = p.ingest(Direction::Rx, Origin::Remote, b"ECHO\r\n", now);
        let Some(Effect::Transmit(reply)) = out.effects.first().cloned() else {
            panic!("expected a transmission");
        };
        assert_eq!(reply, b"ECHO\r\n");

        let echoed = p.ingest(Direction::Tx, Origin::AutoResponse, &reply, now);
        assert_eq!(texts(&echoed, RepositoryKind::Tx), vec!["ECHO"]);
        assert!(echoed.effects.is_empty());
        assert_eq!(p.snapshot(now).auto_response.count, 1);
    }

    #[test]
    fn test_bidir_receives_both_directions_in_order() {
        let mut p = pipeline(TerminalSettings::new("order"));
        let now = Local::now();
        let mut out = p.ingest(Direction::Rx, Origin::Remote, b"r1\r\n", now);
        out.extend(p.ingest(Direction::Tx, Origin::Local, b"t1\r\n", now));
        out.extend(p.ingest(Direction::Rx, Origin::Remote, b"r2\r\n", now));

        assert_eq!(texts(&out, RepositoryKind::Bidir), vec!["r1", "t1", "r2"]);
        assert_eq!(texts(&out, RepositoryKind::Tx), vec!["t1"]);
        assert_eq!(texts(&out, RepositoryKind::Rx), vec!["r1", "r2"]);

        let numbers: Vec<_> = out.lines(RepositoryKind::Bidir).map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_highlight_and_clear_actions() {
        let mut p = pipeline(TerminalSettings::new("act").with_auto_action(
            AutoActionSettings::new(TriggerSettings::text("WARN"), AutoAction::Highlight),
        ));
        let out = p.ingest(Direction::Rx, Origin::Remote, b"ok\r\nWARN 1\r\n", Local::now());
        let highlighted: Vec<_> = out.lines(RepositoryKind::Bidir).map(|l| l.highlighted).collect();
        assert_eq!(highlighted, vec![false, true]);
        assert_eq!(fired(&out), vec![(EngineKind::AutoAction, 1)]);

        let mut p = pipeline(TerminalSettings::new("clr").with_auto_action(
            AutoActionSettings::new(TriggerSettings::text("RESET"), AutoAction::ClearRepositories),
        ));
        let now = Local::now();
        p.ingest(Direction::Rx, Origin::Remote, b"a\r\nb\r\n", now);
        p.ingest(Direction::Rx, Origin::Remote, b"RESET\r\n", now);
        let snapshot = p.snapshot(now);
        let bidir = snapshot.repository(RepositoryKind::Bidir).unwrap();
        let lines: Vec<_> = bidir.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, vec!["RESET"]);
        assert_eq!(bidir.count.lines, 1);
    }

    #[test]
    fn test_close_action_requests_close() {
        let mut p = pipeline(TerminalSettings::new("close").with_auto_action(
            AutoActionSettings::new(TriggerSettings::text("BYE"), AutoAction::CloseTerminal),
        ));
        let out = p.ingest(Direction::Rx, Origin::Remote, b"BYE\r\n", Local::now());
        assert_eq!(out.effects, vec![Effect::Close]);
    }

    #[test]
    fn test_engines_are_independent() {
        let settings = ping_pong().with_auto_action(AutoActionSettings::new(
            TriggerSettings::text("PING").source(TriggerSource::Tx),
            AutoAction::CountOnly,
        ));
        let mut p = pipeline(settings);
        let now = Local::now();
        p.ingest(Direction::Rx, Origin::Remote, b"PING\r\n", now);
        p.ingest(Direction::Tx, Origin::Local, b"PING\r\n", now);

        let snapshot = p.snapshot(now);
        assert_eq!(snapshot.auto_action.count, 1);
        assert_eq!(snapshot.auto_response.count, 2);

        p.set_trigger_active(EngineKind::AutoResponse, false);
        p.reset_trigger(EngineKind::AutoAction);
        let snapshot = p.snapshot(now);
        assert_eq!(snapshot.auto_response.state, TriggerState::Deactivated);
        assert_eq!(snapshot.auto_response.count, 2);
        assert_eq!(snapshot.auto_action.count, 0);
    }

    #[test]
    fn test_partial_hex_trigger_fires_on_stream() {
        let settings = TerminalSettings::new("ack").with_auto_response(AutoResponseSettings::new(
            TriggerSettings::hex("05").match_partial(true),
            ResponsePayload::Hex("06".to_string()),
        ));
        let mut p = pipeline(settings);
        let out = p.ingest(Direction::Rx, Origin::Remote, &[0x05], Local::now());
        assert_eq!(out.effects, vec![Effect::Transmit(vec![0x06])]);
        assert!(out.lines(RepositoryKind::Rx).next().is_none());
    }

    #[test]
    fn test_pending_line_and_flush() {
        let mut p = pipeline(TerminalSettings::new("flush"));
        let now = Local::now();
        let out = p.ingest(Direction::Rx, Origin::Remote, b"partial\xE2", now);
        assert!(out.events.iter().any(|e| matches!(
            e,
            TerminalEvent::LinePending { line, .. } if line.text == "partial"
        )));

        let out = p.flush(now);
        let lines: Vec<_> = out.lines(RepositoryKind::Rx).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "partial\u{FFFD}");
        assert!(lines[0].has_errors());
        assert!(p.snapshot(now).pending.is_empty());
    }

    #[test]
    fn test_line_timeout_on_tick() {
        let mut settings = TerminalSettings::new("timeout");
        settings.line.timeout_ms = Some(100);
        let mut p = pipeline(settings);
        let now = Local::now();
        p.ingest(Direction::Rx, Origin::Remote, b"prompt> ", now);

        assert!(p.tick(now + ChronoDuration::milliseconds(50)).lines(RepositoryKind::Rx).next().is_none());
        let out = p.tick(now + ChronoDuration::milliseconds(150));
        assert_eq!(texts(&out, RepositoryKind::Rx), vec!["prompt> "]);
    }

    #[test]
    fn test_counts_and_clear() {
        let mut p = pipeline(TerminalSettings::new("count"));
        let now = Local::now();
        p.ingest(Direction::Rx, Origin::Remote, b"abc\r\nde\r\n", now);
        assert_eq!(
            p.repository(RepositoryKind::Rx).count(),
            ByteLineCount { bytes: 9, lines: 2 }
        );

        let out = p.clear_repository(Some(RepositoryKind::Rx));
        assert!(out.events.contains(&TerminalEvent::RepositoryCleared {
            repository: RepositoryKind::Rx
        }));
        assert_eq!(p.repository(RepositoryKind::Rx).count(), ByteLineCount::default());
        assert_eq!(p.repository(RepositoryKind::Bidir).count().lines, 2);
    }

    #[test]
    fn test_software_flow_events() {
        let mut settings = TerminalSettings::new("xon");
        settings.flow_control = FlowControl::Software;
        let mut p = pipeline(settings);
        let out = p.ingest(Direction::Rx, Origin::Remote, &[XOFF], Local::now());
        assert!(out.events.contains(&TerminalEvent::FlowChanged {
            signal: Signal::OutputXOff,
            value: true,
            transitions: 1,
        }));
    }

    #[test]
    fn test_hex_display_separator() {
        let settings = TerminalSettings::new("hex").with_display(DisplaySettings {
            radix: Radix::Hex,
            ..Default::default()
        });
        let mut p = pipeline(settings);
        let out = p.ingest(Direction::Rx, Origin::Remote, b"AB\r\n", Local::now());
        assert_eq!(texts(&out, RepositoryKind::Rx), vec!["41 42"]);
    }

    #[test]
    fn test_replay_skips_empty_lines() {
        let mut p = pipeline(TerminalSettings::new("replay"));
        let out = p.replay(Direction::Rx, b"one\r\n\r\ntwo", Local::now());
        assert_eq!(texts(&out, RepositoryKind::Rx), vec!["one", "two"]);
    }

    #[test]
    fn test_invalid_configuration_is_reported() {
        let settings = TerminalSettings::new("bad").with_auto_action(AutoActionSettings::new(
            TriggerSettings::text("(").regex(true),
            AutoAction::Beep,
        ));
        assert!(matches!(
            Pipeline::new(&settings, "COM1", Local::now()),
            Err(ConfigurationError::Trigger(_))
        ));

        let mut p = pipeline(TerminalSettings::new("ok"));
        let bad = AutoResponseSettings::new(TriggerSettings::text("x"), ResponsePayload::Predefined(4));
        assert!(p.configure_auto_response(Some(&bad)).is_err());
        assert_eq!(p.snapshot(Local::now()).auto_response.state, TriggerState::Inactive);
    }

    #[test]
    fn test_connect_total_carries_over() {
        let t0 = Local::now();
        let mut p = pipeline(TerminalSettings::default()).with_connect_total(Duration::from_secs(30));
        p.connect(t0);
        let event = p.disconnect(t0 + ChronoDuration::seconds(5));
        let TerminalEvent::Disconnected { connect_time } = event else {
            panic!("unexpected event {:?}", event);
        };
        assert_eq!(connect_time.active, Duration::from_secs(5));
        assert_eq!(connect_time.total, Duration::from_secs(35));

        let snapshot = p.snapshot(t0 + ChronoDuration::seconds(9));
        assert_eq!(snapshot.connect_time.active, Duration::ZERO);
        assert_eq!(snapshot.connect_time.total, Duration::from_secs(35));
    }
}
