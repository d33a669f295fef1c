//! End-to-end terminal scenarios over the loopback transport

use crossbeam_channel::Receiver;
use std::time::Duration;
use termline_core::core::flow::Signal;
use termline_core::core::transport::{pair, LoopbackRemote};
use termline_core::core::trigger::TriggerError;
use termline_core::{
    AutoResponseSettings, ConfigurationError, EngineKind, EventEnvelope, Origin, RepositoryKind,
    ResponsePayload, Terminal, TerminalError, TerminalEvent, TerminalSettings, TerminalSnapshot,
    TerminalState, TransportError, TriggerSettings, TriggerState,
};
use tokio::time::timeout;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

fn ping_pong() -> TerminalSettings {
    TerminalSettings::new("modem").with_auto_response(AutoResponseSettings::new(
        TriggerSettings::text("PING").whole_word(true).case_sensitive(false),
        ResponsePayload::Text("PONG\\r\\n".to_string()),
    ))
}

fn start(settings: TerminalSettings) -> (Terminal, LoopbackRemote, Receiver<EventEnvelope>) {
    let (transport, remote) = pair("loop0");
    let mut terminal = Terminal::new(settings).unwrap();
    let events = terminal.subscribe();
    terminal.start(Box::new(transport)).unwrap();
    (terminal, remote, events)
}

/// Collect events until one satisfies `stop` (inclusive)
async fn collect_until(
    events: &Receiver<EventEnvelope>,
    stop: fn(&TerminalEvent) -> bool,
) -> Vec<EventEnvelope> {
    let events = events.clone();
    tokio::task::spawn_blocking(move || {
        let mut seen = Vec::new();
        while let Ok(envelope) = events.recv_timeout(WAIT) {
            let done = stop(&envelope.event);
            seen.push(envelope);
            if done {
                break;
            }
        }
        seen
    })
    .await
    .unwrap()
}

fn texts(snapshot: &TerminalSnapshot, kind: RepositoryKind) -> Vec<String> {
    snapshot
        .repository(kind)
        .unwrap()
        .lines
        .iter()
        .map(|line| line.text.clone())
        .collect()
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (terminal, mut remote, events) = start(ping_pong());
    remote.inject(&b"PING\r\n"[..]);

    let written = timeout(WAIT, remote.next_write()).await.unwrap().unwrap();
    assert_eq!(&written[..], b"PONG\r\n");

    let seen = collect_until(&events, |e| {
        matches!(e, TerminalEvent::LineAdded { repository: RepositoryKind::Bidir, line } if line.origin == Origin::AutoResponse)
    })
    .await;
    let fired: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e.event, TerminalEvent::TriggerFired { .. }))
        .collect();
    assert_eq!(fired.len(), 1);

    let snapshot = terminal.close().await.unwrap();
    assert_eq!(texts(&snapshot, RepositoryKind::Rx), vec!["PING"]);
    assert_eq!(texts(&snapshot, RepositoryKind::Tx), vec!["PONG"]);
    assert_eq!(texts(&snapshot, RepositoryKind::Bidir), vec!["PING", "PONG"]);
    assert_eq!(snapshot.auto_response.count, 1);
    assert_eq!(snapshot.auto_response.state, TriggerState::Armed);

    // The echoed reply must not answer itself
    assert!(remote.try_written().is_empty());
    let stats = snapshot.transport.unwrap();
    assert_eq!(stats.bytes_sent, 6);
    assert_eq!(stats.bytes_received, 6);
}

#[tokio::test]
async fn concurrent_terminals_keep_their_own_sequence() {
    let (mut first, remote_a, events_a) = start(TerminalSettings::new("a"));
    let (mut second, remote_b, events_b) = start(TerminalSettings::new("b"));

    for i in 0..20 {
        remote_a.inject(format!("a{}\r\n", i).into_bytes());
        remote_b.inject(format!("b{}\r\n", i).into_bytes());
    }
    remote_a.close();
    remote_b.close();

    let (id_a, id_b) = (first.id(), second.id());
    assert_ok!(first.wait().await);
    assert_ok!(second.wait().await);
    drop(first);
    drop(second);

    for (events, id) in [(events_a, id_a), (events_b, id_b)] {
        let envelopes: Vec<_> = events.try_iter().collect();
        assert!(envelopes.iter().all(|e| e.terminal == id));
        let sequences: Vec<_> = envelopes.iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (1..=envelopes.len() as u64).collect();
        assert_eq!(sequences, expected);

        let lines = envelopes
            .iter()
            .filter(|e| matches!(e.event, TerminalEvent::LineAdded { repository: RepositoryKind::Bidir, .. }))
            .count();
        assert_eq!(lines, 20);
    }
}

#[tokio::test]
async fn transport_fault_preserves_repositories() {
    let (mut terminal, remote, events) = start(TerminalSettings::new("fault"));
    remote.inject(&b"a\r\nb\r\n"[..]);
    remote.fault("cable pulled");

    let snapshot = terminal.wait().await.unwrap();
    assert_eq!(terminal.state(), TerminalState::Faulted);
    assert_eq!(texts(&snapshot, RepositoryKind::Rx), vec!["a", "b"]);
    assert_eq!(snapshot.repository(RepositoryKind::Rx).unwrap().count.bytes, 6);

    let events: Vec<_> = events.try_iter().map(|e| e.event).collect();
    assert!(events.iter().any(|e| matches!(
        e,
        TerminalEvent::TransportFault { error } if error.contains("cable pulled")
    )));
    assert!(matches!(events.last(), Some(TerminalEvent::Disconnected { .. })));

    // Commands are refused, the final state stays available
    assert!(matches!(terminal.clear(None), Err(TerminalError::NotRunning)));
    let again = terminal.snapshot().await.unwrap();
    assert_eq!(texts(&again, RepositoryKind::Bidir), vec!["a", "b"]);
}

#[tokio::test]
async fn close_flushes_the_open_line() {
    let (terminal, remote, events) = start(TerminalSettings::new("prompt"));
    remote.inject(&b"login: "[..]);
    collect_until(&events, |e| matches!(e, TerminalEvent::LinePending { .. })).await;

    let snapshot = terminal.close().await.unwrap();
    let rx = &snapshot.repository(RepositoryKind::Rx).unwrap().lines;
    assert_eq!(rx.len(), 1);
    assert_eq!(rx[0].text, "login: ");
    assert!(!rx[0].is_terminated());
    assert!(snapshot.pending.is_empty());
}

#[tokio::test]
async fn end_of_stream_closes_the_terminal() {
    let (mut terminal, remote, _events) = start(TerminalSettings::new("eof"));
    remote.close();
    assert_ok!(terminal.wait().await);
    assert_eq!(terminal.state(), TerminalState::Closed);
}

#[tokio::test]
async fn invalid_trigger_is_rejected_synchronously() {
    let settings = TerminalSettings::new("bad").with_auto_response(AutoResponseSettings::new(
        TriggerSettings::text("(PING").regex(true),
        ResponsePayload::Text("PONG".to_string()),
    ));
    assert!(matches!(
        Terminal::new(settings),
        Err(TerminalError::Configuration(ConfigurationError::Trigger(
            TriggerError::InvalidRegex { .. }
        )))
    ));

    // A running terminal keeps its trigger when the replacement is invalid
    let (mut terminal, mut remote, _events) = start(ping_pong());
    let bad = AutoResponseSettings::new(TriggerSettings::hex("GG"), ResponsePayload::Trigger);
    assert!(terminal.configure_auto_response(Some(bad)).is_err());

    remote.inject(&b"ping\r\n"[..]);
    let written = timeout(WAIT, remote.next_write()).await.unwrap().unwrap();
    assert_eq!(&written[..], b"PONG\r\n");
    terminal.close().await.unwrap();
}

#[tokio::test]
async fn failed_response_is_reported_and_engine_stays_armed() {
    let (terminal, mut remote, events) = start(ping_pong());
    remote.reject_writes(true);
    remote.inject(&b"PING\r\n"[..]);

    let seen = collect_until(&events, |e| matches!(e, TerminalEvent::TriggerActionFailed { .. })).await;
    assert!(matches!(
        seen.last().map(|e| &e.event),
        Some(TerminalEvent::TriggerActionFailed { engine: EngineKind::AutoResponse, .. })
    ));

    let snapshot = terminal.snapshot().await.unwrap();
    assert_eq!(snapshot.auto_response.count, 1);
    assert_eq!(snapshot.auto_response.state, TriggerState::Armed);
    assert!(texts(&snapshot, RepositoryKind::Tx).is_empty());

    remote.reject_writes(false);
    remote.inject(&b"PING\r\n"[..]);
    let written = timeout(WAIT, remote.next_write()).await.unwrap().unwrap();
    assert_eq!(&written[..], b"PONG\r\n");

    let snapshot = terminal.close().await.unwrap();
    assert_eq!(snapshot.auto_response.count, 2);
}

#[tokio::test]
async fn user_data_enters_the_tx_path() {
    let (terminal, mut remote, _events) = start(TerminalSettings::new("tx"));
    terminal.send_line("AT").await.unwrap();
    let written = timeout(WAIT, remote.next_write()).await.unwrap().unwrap();
    assert_eq!(&written[..], b"AT\r\n");

    terminal.clear(Some(RepositoryKind::Bidir)).unwrap();
    let snapshot = terminal.close().await.unwrap();
    assert_eq!(texts(&snapshot, RepositoryKind::Tx), vec!["AT"]);
    assert!(texts(&snapshot, RepositoryKind::Bidir).is_empty());
    assert_eq!(snapshot.repository(RepositoryKind::Bidir).unwrap().totals.lines, 1);
}

#[tokio::test]
async fn output_signals_reach_the_transport() {
    let (terminal, mut remote, events) = start(TerminalSettings::new("signals"));
    terminal.set_signal(Signal::Dtr, true).await.unwrap();
    assert_eq!(remote.try_signals(), vec![(Signal::Dtr, true)]);

    let seen = collect_until(&events, |e| matches!(e, TerminalEvent::FlowChanged { .. })).await;
    assert!(matches!(
        seen.last().map(|e| &e.event),
        Some(TerminalEvent::FlowChanged { signal: Signal::Dtr, value: true, .. })
    ));

    assert!(matches!(
        terminal.set_signal(Signal::Cts, true).await,
        Err(TerminalError::Transport(TransportError::Unsupported(_)))
    ));
    terminal.close().await.unwrap();
}

#[tokio::test]
async fn failed_user_write_faults_the_terminal() {
    let (mut terminal, remote, events) = start(TerminalSettings::new("tx-fault"));
    remote.inject(&b"ready\r\n"[..]);
    collect_until(&events, |e| {
        matches!(e, TerminalEvent::LineAdded { repository: RepositoryKind::Bidir, .. })
    })
    .await;

    remote.reject_writes(true);
    assert!(matches!(
        terminal.send_line("AT").await,
        Err(TerminalError::Transport(TransportError::SendError(_)))
    ));

    let snapshot = terminal.wait().await.unwrap();
    assert_eq!(terminal.state(), TerminalState::Faulted);
    assert!(texts(&snapshot, RepositoryKind::Tx).is_empty());
    assert_eq!(texts(&snapshot, RepositoryKind::Rx), vec!["ready"]);

    let events: Vec<_> = events.try_iter().map(|e| e.event).collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, TerminalEvent::TransportFault { error } if error.contains("rejected"))));
    assert!(matches!(events.last(), Some(TerminalEvent::Disconnected { .. })));
    assert!(matches!(terminal.send(b"x").await, Err(TerminalError::NotRunning)));
}

#[tokio::test]
async fn connect_time_accumulates_across_sessions() {
    let (mut terminal, remote, events) = start(TerminalSettings::new("redial"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    remote.close();
    let first = terminal.wait().await.unwrap();
    assert!(first.connect_time.total >= Duration::from_millis(50));
    assert_eq!(terminal.connect_total(), first.connect_time.total);

    let (transport, remote) = pair("loop1");
    terminal.start(Box::new(transport)).unwrap();
    assert!(matches!(
        terminal.start(Box::new(pair("loop2").0)),
        Err(TerminalError::AlreadyStarted)
    ));
    remote.inject(&b"again\r\n"[..]);
    tokio::time::sleep(Duration::from_millis(40)).await;

    let running = terminal.snapshot().await.unwrap();
    assert!(running.connect_time.total >= first.connect_time.total + running.connect_time.active);
    assert_eq!(texts(&running, RepositoryKind::Rx), vec!["again"]);

    let second = terminal.close().await.unwrap();
    assert!(second.connect_time.total >= first.connect_time.total + Duration::from_millis(30));
    assert_eq!(second.connect_time.active, Duration::ZERO);

    let disconnects: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e.event {
            TerminalEvent::Disconnected { connect_time } => Some(connect_time),
            _ => None,
        })
        .collect();
    assert_eq!(disconnects.len(), 2);
    assert!(disconnects[1].total > disconnects[0].total);
}
