//! Terminal handle
//!
//! A [`Terminal`] owns the settings and the worker of one monitoring
//! session. All operations are forwarded to the worker as commands, so they
//! are applied in order with the transport arrivals.
//!
//! Once a worker has stopped and [`Terminal::wait`] has collected it, the
//! terminal can be started again on a new transport. Repositories start
//! empty; the cumulative connect time continues.

use crate::core::dispatcher::{Publisher, TerminalCommand, TerminalState, Worker};
use crate::core::error::ConfigurationError;
use crate::core::event::EventEnvelope;
use crate::core::flow::Signal;
use crate::core::pipeline::{Pipeline, TerminalSnapshot};
use crate::core::repository::RepositoryKind;
use crate::core::settings::TerminalSettings;
use crate::core::transport::{Transport, TransportError, TransportStats};
use crate::core::trigger::{AutoActionSettings, AutoResponseSettings, EngineKind};
use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Terminal errors
#[derive(Error, Debug)]
pub enum TerminalError {
    /// Worker not started or already stopped
    #[error("Terminal is not running")]
    NotRunning,

    /// `start` called while a worker is attached
    #[error("Terminal already started")]
    AlreadyStarted,

    /// Invalid settings or trigger
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Transport operation failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Worker task panicked or was aborted
    #[error("Worker error: {0}")]
    Worker(String),
}

/// One monitoring session
pub struct Terminal {
    id: Uuid,
    settings: TerminalSettings,
    subscribers: Arc<Mutex<Vec<Sender<EventEnvelope>>>>,
    cancel: CancellationToken,
    commands: Option<mpsc::UnboundedSender<TerminalCommand>>,
    worker: Option<JoinHandle<(Pipeline, TransportStats)>>,
    finished: Option<TerminalSnapshot>,
    connect_total: Duration,
    state: Arc<RwLock<TerminalState>>,
}

impl Terminal {
    /// Create an idle terminal, validating the settings
    pub fn new(settings: TerminalSettings) -> Result<Self, TerminalError> {
        settings.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            settings,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
            commands: None,
            worker: None,
            finished: None,
            connect_total: Duration::ZERO,
            state: Arc::new(RwLock::new(TerminalState::Idle)),
        })
    }

    /// Terminal id, carried by every event envelope
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Terminal name
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Current settings
    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    /// Lifecycle state
    pub fn state(&self) -> TerminalState {
        *self.state.read()
    }

    /// Whether the worker is running
    pub fn is_running(&self) -> bool {
        self.state() == TerminalState::Running
    }

    /// Receive all events published from now on
    pub fn subscribe(&self) -> Receiver<EventEnvelope> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Cumulative connect time of the sessions collected so far
    pub fn connect_total(&self) -> Duration {
        self.connect_total
    }

    /// Attach a transport and spawn the worker
    ///
    /// Fails with `AlreadyStarted` while a worker is attached, including one
    /// that stopped but has not been collected by [`Terminal::wait`].
    pub fn start(&mut self, transport: Box<dyn Transport>) -> Result<(), TerminalError> {
        if self.worker.is_some() {
            return Err(TerminalError::AlreadyStarted);
        }

        let port_id = self
            .settings
            .port_id
            .clone()
            .unwrap_or_else(|| transport.port_id());
        let pipeline = Pipeline::new(&self.settings, &port_id, Local::now())?
            .with_connect_total(self.connect_total);
        let (commands, receiver) = mpsc::unbounded_channel();
        self.cancel = CancellationToken::new();

        tracing::info!(
            terminal = %self.id,
            name = %self.settings.name,
            port = %port_id,
            transport = %transport.transport_type(),
            "Starting terminal"
        );

        let worker = Worker::new(
            pipeline,
            transport,
            Publisher::new(self.id, self.subscribers.clone()),
            receiver,
            self.cancel.clone(),
            self.state.clone(),
            self.settings.tick_interval(),
        );
        *self.state.write() = TerminalState::Running;
        self.commands = Some(commands);
        self.finished = None;
        self.worker = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    fn command(&self, command: TerminalCommand) -> Result<(), TerminalError> {
        let commands = self
            .commands
            .as_ref()
            .filter(|_| self.is_running())
            .ok_or(TerminalError::NotRunning)?;
        commands.send(command).map_err(|_| TerminalError::NotRunning)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TerminalCommand,
    ) -> Result<T, TerminalError> {
        let (reply, response) = oneshot::channel();
        self.command(build(reply))?;
        response.await.map_err(|_| TerminalError::NotRunning)
    }

    /// Transmit bytes; the data also enters the Tx path
    pub async fn send(&self, data: &[u8]) -> Result<(), TerminalError> {
        let data = data.to_vec();
        self.request(|reply| TerminalCommand::Send { data, reply })
            .await??;
        Ok(())
    }

    /// Transmit text in the terminal encoding followed by the EOL sequence
    pub async fn send_line(&self, text: &str) -> Result<(), TerminalError> {
        let mut data = self.settings.display.encoding.encode(text);
        data.extend(self.settings.eol_bytes()?);
        self.send(&data).await
    }

    /// Drive an output signal on the port
    pub async fn set_signal(&self, signal: Signal, value: bool) -> Result<(), TerminalError> {
        self.request(|reply| TerminalCommand::SetSignal {
            signal,
            value,
            reply,
        })
        .await??;
        Ok(())
    }

    /// Report a signal change observed by the port driver
    pub fn signal_changed(&self, signal: Signal, value: bool) -> Result<(), TerminalError> {
        self.command(TerminalCommand::SignalChanged { signal, value })
    }

    /// Clear one repository, or all when `None`
    pub fn clear(&self, repository: Option<RepositoryKind>) -> Result<(), TerminalError> {
        self.command(TerminalCommand::Clear(repository))
    }

    /// Reset repository totals and flow transition counters
    pub fn reset_counters(&self) -> Result<(), TerminalError> {
        self.command(TerminalCommand::ResetCounters)
    }

    /// Replace the AutoAction trigger
    ///
    /// The trigger is compiled here; an invalid one is rejected and the
    /// running trigger stays in place.
    pub fn configure_auto_action(
        &mut self,
        settings: Option<AutoActionSettings>,
    ) -> Result<(), TerminalError> {
        let mut next = self.settings.clone();
        next.auto_action = settings;
        let compiled = next.compile_auto_action()?;
        if self.is_running() {
            self.command(TerminalCommand::ConfigureAutoAction(compiled))?;
        }
        self.settings = next;
        Ok(())
    }

    /// Replace the AutoResponse trigger
    pub fn configure_auto_response(
        &mut self,
        settings: Option<AutoResponseSettings>,
    ) -> Result<(), TerminalError> {
        let mut next = self.settings.clone();
        next.auto_response = settings;
        let compiled = next.compile_auto_response()?;
        if self.is_running() {
            self.command(TerminalCommand::ConfigureAutoResponse(compiled))?;
        }
        self.settings = next;
        Ok(())
    }

    /// Activate or deactivate a trigger engine
    pub fn set_trigger_active(&self, engine: EngineKind, active: bool) -> Result<(), TerminalError> {
        self.command(TerminalCommand::SetTriggerActive { engine, active })
    }

    /// Zero a trigger engine counter
    pub fn reset_trigger(&self, engine: EngineKind) -> Result<(), TerminalError> {
        self.command(TerminalCommand::ResetTrigger(engine))
    }

    /// Copy of the terminal state
    pub async fn snapshot(&self) -> Result<TerminalSnapshot, TerminalError> {
        if let Some(finished) = &self.finished {
            return Ok(finished.clone());
        }
        self.request(TerminalCommand::Snapshot).await
    }

    /// Wait for the worker to stop on its own (end of stream, fault, close action)
    pub async fn wait(&mut self) -> Result<TerminalSnapshot, TerminalError> {
        // Borrow the handle so a dropped `wait` future can be awaited again
        if let Some(handle) = self.worker.as_mut() {
            let joined = handle.await;
            self.worker = None;
            self.commands = None;
            let (pipeline, stats) = joined.map_err(|e| TerminalError::Worker(e.to_string()))?;
            let mut snapshot = pipeline.snapshot(Local::now());
            snapshot.transport = Some(stats);
            self.connect_total = snapshot.connect_time.total;
            self.finished = Some(snapshot);
        }
        self.finished.clone().ok_or(TerminalError::NotRunning)
    }

    /// Stop the worker, flushing open lines, and return the final state
    pub async fn close(mut self) -> Result<TerminalSnapshot, TerminalError> {
        tracing::debug!(terminal = %self.id, "Closing terminal");
        self.cancel.cancel();
        self.wait().await
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
