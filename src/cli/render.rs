//! Event and snapshot rendering for the CLI

use crate::core::event::{EventEnvelope, TerminalEvent, TriggerPayload};
use crate::core::pipeline::TerminalSnapshot;
use crate::core::repository::RepositoryKind;
use crate::core::trigger::AutoAction;
use clap::ValueEnum;

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Render one event; `None` when the format shows nothing for it
///
/// Text output follows the Bidir repository only, so each line shows once.
pub fn render_event(envelope: &EventEnvelope, format: OutputFormat) -> Option<String> {
    if format == OutputFormat::Json {
        return serde_json::to_string(envelope).ok();
    }

    match &envelope.event {
        TerminalEvent::Connected { port_id } => Some(format!("-- connected to {}", port_id)),
        TerminalEvent::LineAdded {
            repository: RepositoryKind::Bidir,
            line,
        } => {
            let marker = if line.highlighted { '*' } else { ' ' };
            Some(format!(
                "{:>6}{} {} {} {}",
                line.number,
                marker,
                line.timestamp.format("%H:%M:%S%.3f"),
                line.direction,
                line.text
            ))
        }
        TerminalEvent::TriggerFired {
            engine,
            matched,
            payload,
            count,
            ..
        } => {
            let what = match payload {
                TriggerPayload::Action(AutoAction::ShowMessage(message)) => message.clone(),
                TriggerPayload::Action(action) => format!("{:?}", action),
                TriggerPayload::Response(bytes) => format!("reply {}", hex::encode_upper(bytes)),
            };
            Some(format!("-- {} #{} on '{}': {}", engine, count, matched, what))
        }
        TerminalEvent::TriggerActionFailed { engine, error } => {
            Some(format!("-- {} failed: {}", engine, error))
        }
        TerminalEvent::FlowChanged { signal, value, .. } => {
            Some(format!("-- {} {}", signal, if *value { "on" } else { "off" }))
        }
        TerminalEvent::TransportFault { error } => Some(format!("-- transport fault: {}", error)),
        TerminalEvent::Disconnected { connect_time } => Some(format!(
            "-- disconnected after {:.1}s",
            connect_time.active.as_secs_f64()
        )),
        _ => None,
    }
}

/// Render the final state of a terminal
pub fn render_snapshot(snapshot: &TerminalSnapshot, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return serde_json::to_string(snapshot).unwrap_or_default();
    }

    let mut out = String::new();
    for repository in &snapshot.repositories {
        out.push_str(&format!(
            "{:<6} {:>8} lines {:>10} bytes (total {} lines, {} bytes)\n",
            repository.kind,
            repository.count.lines,
            repository.count.bytes,
            repository.totals.lines,
            repository.totals.bytes
        ));
    }
    for engine in [&snapshot.auto_action, &snapshot.auto_response] {
        if let Some(pattern) = &engine.pattern {
            out.push_str(&format!(
                "{} '{}': {} matches ({:?})\n",
                engine.kind, pattern, engine.count, engine.state
            ));
        }
    }
    out.push_str(&format!(
        "connected {:.1}s",
        snapshot.connect_time.total.as_secs_f64()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::line::Direction;
    use crate::core::pipeline::Pipeline;
    use crate::core::settings::TerminalSettings;
    use chrono::Local;
    use uuid::Uuid;

    fn envelopes(input: &[u8]) -> Vec<EventEnvelope> {
        let mut pipeline = Pipeline::new(&TerminalSettings::default(), "file", Local::now()).unwrap();
        pipeline
            .replay(Direction::Rx, input, Local::now())
            .events
            .into_iter()
            .enumerate()
            .map(|(i, event)| EventEnvelope {
                terminal: Uuid::nil(),
                sequence: i as u64 + 1,
                event,
            })
            .collect()
    }

    #[test]
    fn test_text_shows_bidir_lines_once() {
        let rendered: Vec<_> = envelopes(b"hello\r\n")
            .iter()
            .filter_map(|e| render_event(e, OutputFormat::Text))
            .collect();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].ends_with("RX hello"));
    }

    #[test]
    fn test_json_lines() {
        let envelopes = envelopes(b"hello\r\n");
        let first = render_event(&envelopes[0], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["event"], "line_added");
        assert_eq!(value["line"]["text"], "hello");
    }
}
