//! Terminal worker and event fan-out
//!
//! One worker task per terminal owns the [`Pipeline`] and the transport.
//! Reads, user commands and timer ticks are serialized through a single
//! `select!` loop, so every subscriber sees one total order of events.

use crate::core::error::TriggerActionError;
use crate::core::event::{EventEnvelope, TerminalEvent};
use crate::core::flow::Signal;
use crate::core::line::{Direction, Origin};
use crate::core::pipeline::{Effect, Output, Pipeline, TerminalSnapshot};
use crate::core::repository::RepositoryKind;
use crate::core::transport::{Transport, TransportError, TransportStats};
use crate::core::trigger::{AutoAction, CompiledTrigger, EngineKind, PreparedResponse};
use chrono::Local;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Automatic responses allowed to follow one another before the chain is cut
pub const RESPONSE_CHAIN_LIMIT: usize = 64;

/// Terminal lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// Created, no transport attached
    Idle,
    /// Worker running
    Running,
    /// Stopped by the user, a close action or end of stream
    Closed,
    /// Stopped by a transport error
    Faulted,
}

/// Command sent from a terminal handle to its worker
#[derive(Debug)]
pub enum TerminalCommand {
    /// Transmit user data
    Send {
        /// Bytes to write
        data: Vec<u8>,
        /// Write result
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
    /// Drive an output signal
    SetSignal {
        /// Signal
        signal: Signal,
        /// Level
        value: bool,
        /// Driver result
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
    /// Signal change reported by the port driver
    SignalChanged {
        /// Signal
        signal: Signal,
        /// Level
        value: bool,
    },
    /// Clear one repository, or all of them
    Clear(Option<RepositoryKind>),
    /// Reset repository and flow counters
    ResetCounters,
    /// Replace the AutoAction trigger
    ConfigureAutoAction(Option<(CompiledTrigger, AutoAction)>),
    /// Replace the AutoResponse trigger
    ConfigureAutoResponse(Option<(CompiledTrigger, PreparedResponse)>),
    /// Activate or deactivate an engine
    SetTriggerActive {
        /// Engine
        engine: EngineKind,
        /// Armed when true
        active: bool,
    },
    /// Zero an engine counter
    ResetTrigger(EngineKind),
    /// Copy the terminal state
    Snapshot(oneshot::Sender<TerminalSnapshot>),
}

/// Sequenced fan-out of events to all subscribers of one terminal
#[derive(Clone)]
pub struct Publisher {
    terminal: Uuid,
    sequence: u64,
    subscribers: Arc<Mutex<Vec<Sender<EventEnvelope>>>>,
}

impl Publisher {
    /// Create a publisher over a shared subscriber list
    pub fn new(terminal: Uuid, subscribers: Arc<Mutex<Vec<Sender<EventEnvelope>>>>) -> Self {
        Self {
            terminal,
            sequence: 0,
            subscribers,
        }
    }

    /// Stamp and deliver one event
    pub fn publish(&mut self, event: TerminalEvent) {
        self.sequence += 1;
        let envelope = EventEnvelope {
            terminal: self.terminal,
            sequence: self.sequence,
            event,
        };

        // Send outside the lock; a subscriber may subscribe again from its handler
        let subscribers = self.subscribers.lock().clone();
        let mut dead = Vec::new();
        for subscriber in &subscribers {
            if subscriber.send(envelope.clone()).is_err() {
                dead.push(subscriber.clone());
            }
        }
        if !dead.is_empty() {
            self.subscribers
                .lock()
                .retain(|s| !dead.iter().any(|d| d.same_channel(s)));
            tracing::debug!(terminal = %self.terminal, dropped = dead.len(), "Subscribers went away");
        }
    }

    /// Last sequence number handed out
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

enum Exit {
    Closed,
    Faulted,
}

/// Worker owning the pipeline and the transport of one terminal
pub struct Worker {
    pipeline: Pipeline,
    transport: Box<dyn Transport>,
    publisher: Publisher,
    commands: mpsc::UnboundedReceiver<TerminalCommand>,
    cancel: CancellationToken,
    state: Arc<RwLock<TerminalState>>,
    tick_interval: Duration,
}

impl Worker {
    /// Assemble a worker
    pub fn new(
        pipeline: Pipeline,
        transport: Box<dyn Transport>,
        publisher: Publisher,
        commands: mpsc::UnboundedReceiver<TerminalCommand>,
        cancel: CancellationToken,
        state: Arc<RwLock<TerminalState>>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            pipeline,
            transport,
            publisher,
            commands,
            cancel,
            state,
            tick_interval,
        }
    }

    /// Run until cancelled, closed or faulted
    ///
    /// Returns the pipeline so its final state can still be inspected.
    pub async fn run(mut self) -> (Pipeline, TransportStats) {
        *self.state.write() = TerminalState::Running;
        let event = self.pipeline.connect(Local::now());
        self.publisher.publish(event);
        tracing::info!(port = self.pipeline.port_id(), "Terminal worker started");

        let closed = self.transport.closed();
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break Exit::Closed,

                Some(command) = self.commands.recv() => {
                    if let Some(exit) = self.handle_command(command).await {
                        break exit;
                    }
                }

                result = self.transport.read() => match result {
                    Ok(bytes) if bytes.is_empty() => {
                        tracing::info!(port = self.pipeline.port_id(), "Transport reached end of stream");
                        break Exit::Closed;
                    }
                    Ok(bytes) => {
                        let out = self.pipeline.ingest(Direction::Rx, Origin::Remote, &bytes, Local::now());
                        if self.apply(out).await {
                            break Exit::Closed;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(port = self.pipeline.port_id(), error = %e, "Transport fault");
                        self.publisher.publish(TerminalEvent::TransportFault { error: e.to_string() });
                        break Exit::Faulted;
                    }
                },

                _ = closed.cancelled() => break Exit::Closed,

                _ = ticker.tick() => {
                    let out = self.pipeline.tick(Local::now());
                    if self.apply(out).await {
                        break Exit::Closed;
                    }
                }
            }
        };

        let now = Local::now();
        let flushed = self.pipeline.flush(now);
        for event in flushed.events {
            self.publisher.publish(event);
        }
        let event = self.pipeline.disconnect(now);
        self.publisher.publish(event);

        *self.state.write() = match exit {
            Exit::Closed => TerminalState::Closed,
            Exit::Faulted => TerminalState::Faulted,
        };
        tracing::info!(
            port = self.pipeline.port_id(),
            events = self.publisher.sequence(),
            "Terminal worker stopped"
        );

        let stats = self.transport.stats();
        (self.pipeline, stats)
    }

    async fn handle_command(&mut self, command: TerminalCommand) -> Option<Exit> {
        let now = Local::now();
        match command {
            TerminalCommand::Send { data, reply } => {
                let result = self.transport.write(&data).await;
                let fault = result.as_ref().err().map(ToString::to_string);
                let _ = reply.send(result);
                if let Some(error) = fault {
                    tracing::warn!(port = self.pipeline.port_id(), %error, "Transport fault on write");
                    self.publisher.publish(TerminalEvent::TransportFault { error });
                    return Some(Exit::Faulted);
                }
                let out = self.pipeline.ingest(Direction::Tx, Origin::Local, &data, now);
                if self.apply(out).await {
                    return Some(Exit::Closed);
                }
            }
            TerminalCommand::SetSignal { signal, value, reply } => {
                let result = self.transport.set_signal(signal, value).await;
                let ok = result.is_ok();
                let _ = reply.send(result);
                if ok {
                    let out = self.pipeline.signal_changed(signal, value, now);
                    self.publish_all(out);
                }
            }
            TerminalCommand::SignalChanged { signal, value } => {
                let out = self.pipeline.signal_changed(signal, value, now);
                self.publish_all(out);
            }
            TerminalCommand::Clear(kind) => {
                let out = self.pipeline.clear_repository(kind);
                self.publish_all(out);
            }
            TerminalCommand::ResetCounters => self.pipeline.reset_counters(),
            TerminalCommand::ConfigureAutoAction(trigger) => self.pipeline.set_auto_action(trigger),
            TerminalCommand::ConfigureAutoResponse(trigger) => {
                self.pipeline.set_auto_response(trigger)
            }
            TerminalCommand::SetTriggerActive { engine, active } => {
                let state = self.pipeline.set_trigger_active(engine, active);
                tracing::debug!(%engine, ?state, "Trigger state changed");
            }
            TerminalCommand::ResetTrigger(engine) => self.pipeline.reset_trigger(engine),
            TerminalCommand::Snapshot(reply) => {
                let mut snapshot = self.pipeline.snapshot(now);
                snapshot.transport = Some(self.transport.stats());
                let _ = reply.send(snapshot);
            }
        }
        None
    }

    fn publish_all(&mut self, out: Output) {
        for event in out.events {
            self.publisher.publish(event);
        }
    }

    /// Publish events and carry out effects; true when a close was requested
    ///
    /// Automatic responses are written immediately and fed back through the
    /// Tx path, which may trigger further responses. The chain is bounded.
    async fn apply(&mut self, out: Output) -> bool {
        let mut queue = VecDeque::from([out]);
        let mut transmissions = 0;
        let mut close = false;

        while let Some(out) = queue.pop_front() {
            for event in out.events {
                self.publisher.publish(event);
            }
            for effect in out.effects {
                match effect {
                    Effect::Close => close = true,
                    Effect::Transmit(bytes) => {
                        if transmissions == RESPONSE_CHAIN_LIMIT {
                            self.response_failed(TriggerActionError::ChainLimit(RESPONSE_CHAIN_LIMIT));
                            continue;
                        }
                        transmissions += 1;
                        match self.transport.write(&bytes).await {
                            Ok(()) => queue.push_back(self.pipeline.ingest(
                                Direction::Tx,
                                Origin::AutoResponse,
                                &bytes,
                                Local::now(),
                            )),
                            Err(e) => self.response_failed(e.into()),
                        }
                    }
                }
            }
        }
        close
    }

    fn response_failed(&mut self, error: TriggerActionError) {
        tracing::warn!(error = %error, "Automatic response failed");
        self.publisher.publish(TerminalEvent::TriggerActionFailed {
            engine: EngineKind::AutoResponse,
            error: error.to_string(),
        });
    }
}
