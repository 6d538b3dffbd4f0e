//! Connection handle
//!
//! The handle is what the registry stores. It shares the status with the
//! driver task and talks to it through an unbounded command channel, so every
//! method returns without waiting on the network.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{EndpointDescriptor, EndpointId};
use crate::error::{Error, Result};
use crate::events::{ConnectionEvent, EventHub, EventSink};
use crate::handshake::SubscriptionHandshake;
use crate::payload::Payload;

use super::config::ConnectionConfig;
use super::driver::{Command, Driver};
use super::snapshot::ConnectionSnapshot;
use super::state::{ConnectionState, ConnectionStatus};

/// One managed connection to one endpoint
pub(crate) struct Connection {
    descriptor: EndpointDescriptor,
    url: String,
    status: Arc<Mutex<ConnectionStatus>>,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    events: EventSink,
    /// Driver waiting for `open()`
    pending: Mutex<Option<Driver>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Create a connection in Disconnected; nothing happens until `open()`
    pub(crate) fn new(
        descriptor: EndpointDescriptor,
        config: ConnectionConfig,
        handshake: Arc<dyn SubscriptionHandshake>,
        hub: Arc<EventHub>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(ConnectionStatus::new()));
        let cancel = CancellationToken::new();
        let events = EventSink::new(descriptor.id.clone(), hub);

        let driver = Driver {
            endpoint: descriptor.clone(),
            config,
            handshake,
            status: Arc::clone(&status),
            commands: rx,
            cancel: cancel.clone(),
            events: events.clone(),
        };

        Self {
            url: descriptor.url(),
            descriptor,
            status,
            commands: tx,
            cancel,
            events,
            pending: Mutex::new(Some(driver)),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> &EndpointId {
        &self.descriptor.id
    }

    pub(crate) fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.status.lock().state
    }

    /// Spawn the driver; returns false if already opened or closed
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn open(&self) -> bool {
        let Some(driver) = self.pending.lock().take() else {
            return false;
        };
        if self.cancel.is_cancelled() {
            return false;
        }
        *self.task.lock() = Some(tokio::spawn(driver.run()));
        true
    }

    /// Queue a frame; only allowed while open
    pub(crate) fn send(&self, payload: Payload) -> Result<()> {
        self.command_when_open(Command::Send(payload))
    }

    /// Queue a handshake re-send; only allowed while open
    pub(crate) fn resubscribe(&self) -> Result<()> {
        self.command_when_open(Command::Resubscribe)
    }

    fn command_when_open(&self, cmd: Command) -> Result<()> {
        if !self.status.lock().is_open() {
            return Err(Error::NotConnected(self.id().clone()));
        }
        self.commands
            .send(cmd)
            .map_err(|_| Error::NotConnected(self.id().clone()))
    }

    /// Ask a connection waiting in Reconnecting to retry now
    pub(crate) fn reconnect(&self) -> bool {
        if self.state() != ConnectionState::Reconnecting {
            return false;
        }
        self.commands.send(Command::Reconnect).is_ok()
    }

    /// Close the connection; idempotent and non-blocking
    ///
    /// The driver observes the cancellation, closes the socket and emits
    /// `Closed`. A connection that was never opened emits `Closed` here.
    pub(crate) fn close(&self) {
        let closed_now = self.status.lock().close();
        self.cancel.cancel();

        if let Some(driver) = self.pending.lock().take() {
            drop(driver);
            if closed_now {
                tracing::info!(endpoint = %self.id(), "Connection closed before opening");
                self.events.emit(ConnectionEvent::Closed);
            }
        }
    }

    /// Close and wait for the driver to release the socket and timers
    pub(crate) async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(endpoint = %self.id(), error = %e, "Connection driver failed");
            }
        }
    }

    /// Point-in-time copy of the connection status
    pub(crate) fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            descriptor: self.descriptor.clone(),
            url: self.url.clone(),
            status: self.status.lock().clone(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
