//! Per-connection driver task
//!
//! The driver owns the socket and the retry timer for one endpoint and runs
//! the state machine:
//!
//! 1. Connect (bounded by the connect timeout)
//! 2. On open: write the handshake, emit `Connected`, then multiplex inbound
//!    frames with queued commands
//! 3. On failure: emit `Error`/`Disconnected`, wait out the backoff delay or,
//!    once the attempt cap is hit, emit `ReconnectFailed` and wait for a
//!    manual reconnect
//! 4. On cancellation: close the socket, move to Closed, emit `Closed`
//!
//! Cancellation is polled first in every `select!` and raced against every
//! socket write, so no attempt starts and no write blocks once the
//! connection has been closed.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{EndpointDescriptor, EndpointId};
use crate::error::Error;
use crate::events::{ConnectionEvent, EventSink};
use crate::handshake::SubscriptionHandshake;
use crate::payload::Payload;

use super::config::ConnectionConfig;
use super::state::ConnectionStatus;
use super::transport::{close_socket, open_socket, WsStream};

/// Requests from the handle to the driver
#[derive(Debug)]
pub(crate) enum Command {
    /// Write a data frame
    Send(Payload),
    /// Write the handshake again
    Resubscribe,
    /// Retry now, resetting the attempt budget
    Reconnect,
}

/// How an open session ended
enum SessionEnd {
    Cancelled,
    Dropped(Error),
}

/// Outcome of a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Done,
    Cancelled,
}

/// Outcome of waiting in Reconnecting
enum Wait {
    Retry,
    Cancelled,
}

pub(crate) struct Driver {
    pub(super) endpoint: EndpointDescriptor,
    pub(super) config: ConnectionConfig,
    pub(super) handshake: Arc<dyn SubscriptionHandshake>,
    pub(super) status: Arc<Mutex<ConnectionStatus>>,
    pub(super) commands: mpsc::UnboundedReceiver<Command>,
    pub(super) cancel: CancellationToken,
    pub(super) events: EventSink,
}

impl Driver {
    fn id(&self) -> &EndpointId {
        &self.endpoint.id
    }

    /// Run until cancelled
    pub(crate) async fn run(mut self) {
        let url = self.endpoint.url();
        tracing::debug!(endpoint = %self.id(), url = %url, "Connection driver started");

        loop {
            if self.cancel.is_cancelled() || !self.status.lock().start_connecting() {
                break;
            }
            tracing::debug!(endpoint = %self.id(), url = %url, "Connecting");

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = open_socket(&url, self.config.connect_timeout, self.config.tcp_nodelay) => result,
            };

            let failure = match attempt {
                Ok(ws) => match self.session(ws).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Dropped(err) => err,
                },
                Err(reason) => Error::ConnectFailed {
                    endpoint: self.id().clone(),
                    reason,
                },
            };

            if !self.on_failure(failure) {
                break;
            }

            match self.wait_for_retry().await {
                Wait::Retry => continue,
                Wait::Cancelled => break,
            }
        }

        self.finish();
    }

    /// Drive one open socket until it drops or the connection is closed
    async fn session(&mut self, mut ws: WsStream) -> SessionEnd {
        if !self.status.lock().mark_open() {
            // Closed while the connect was completing
            close_socket(&mut ws, self.config.close_timeout).await;
            return SessionEnd::Cancelled;
        }

        match self.write_handshake(&mut ws).await {
            Ok(Written::Done) => {}
            Ok(Written::Cancelled) => return SessionEnd::Cancelled,
            Err(err) => return SessionEnd::Dropped(err),
        }

        tracing::info!(endpoint = %self.id(), url = %self.endpoint.url(), "Connection open, subscription sent");
        self.events.emit(ConnectionEvent::Connected);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    close_socket(&mut ws, self.config.close_timeout).await;
                    return SessionEnd::Cancelled;
                }

                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(payload)) => {
                        match self.write_frame(&mut ws, payload.into_message()).await {
                            Ok(Written::Done) => self.status.lock().frames_sent += 1,
                            Ok(Written::Cancelled) => return SessionEnd::Cancelled,
                            Err(reason) => {
                                return SessionEnd::Dropped(Error::Transport {
                                    endpoint: self.id().clone(),
                                    reason,
                                });
                            }
                        }
                    }
                    Some(Command::Resubscribe) => {
                        match self.write_handshake(&mut ws).await {
                            Ok(Written::Done) => {}
                            Ok(Written::Cancelled) => return SessionEnd::Cancelled,
                            Err(err) => return SessionEnd::Dropped(err),
                        }
                        tracing::debug!(endpoint = %self.id(), "Subscription re-sent");
                    }
                    Some(Command::Reconnect) => {
                        tracing::debug!(endpoint = %self.id(), "Reconnect ignored, already open");
                    }
                    None => {
                        close_socket(&mut ws, self.config.close_timeout).await;
                        return SessionEnd::Cancelled;
                    }
                },

                frame = ws.next() => match frame {
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("closed by peer ({}) {}", f.code, f.reason))
                            .unwrap_or_else(|| "closed by peer".to_owned());
                        return SessionEnd::Dropped(Error::UnexpectedClose {
                            endpoint: self.id().clone(),
                            reason,
                        });
                    }
                    Some(Ok(msg)) => {
                        if let Some(payload) = Payload::from_message(msg) {
                            self.status.lock().frames_received += 1;
                            self.events.emit(ConnectionEvent::Message(payload));
                        }
                    }
                    Some(Err(e)) => {
                        return SessionEnd::Dropped(Error::Transport {
                            endpoint: self.id().clone(),
                            reason: e.to_string(),
                        });
                    }
                    None => {
                        return SessionEnd::Dropped(Error::UnexpectedClose {
                            endpoint: self.id().clone(),
                            reason: "stream ended".to_owned(),
                        });
                    }
                },
            }
        }
    }

    async fn write_handshake(&self, ws: &mut WsStream) -> Result<Written, Error> {
        let message = self.handshake.message(self.id()).into_message();
        let written = self
            .write_frame(ws, message)
            .await
            .map_err(|reason| Error::HandshakeSendFailed {
                endpoint: self.id().clone(),
                reason,
            })?;
        if written == Written::Done {
            self.status.lock().frames_sent += 1;
        }
        Ok(written)
    }

    /// Write one frame, bounded by the write timeout
    ///
    /// A peer that stops reading can stall the write indefinitely, so the
    /// write is abandoned as soon as the connection is closed. The socket is
    /// then dropped without a close frame.
    async fn write_frame(&self, ws: &mut WsStream, message: Message) -> Result<Written, String> {
        let timeout = self.config.write_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(endpoint = %self.id(), "Pending write abandoned on close");
                Ok(Written::Cancelled)
            }
            result = tokio::time::timeout(timeout, ws.send(message)) => match result {
                Ok(Ok(())) => Ok(Written::Done),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("write timed out after {}ms", timeout.as_millis())),
            },
        }
    }

    /// Record a failure and emit its events; false if the connection was
    /// closed in the meantime
    fn on_failure(&mut self, err: Error) -> bool {
        // Frames queued for the dead socket are not carried over
        let mut dropped = 0usize;
        while let Ok(cmd) = self.commands.try_recv() {
            if matches!(cmd, Command::Send(_)) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(endpoint = %self.id(), dropped, "Discarded queued frames after disconnect");
        }

        let Some(attempts) = self.status.lock().mark_failed(err.clone()) else {
            return false;
        };

        tracing::warn!(endpoint = %self.id(), attempt = attempts, error = %err, "Connection lost");

        let reason = err.to_string();
        if !matches!(err, Error::UnexpectedClose { .. }) {
            self.events.emit(ConnectionEvent::Error(err));
        }
        self.events.emit(ConnectionEvent::Disconnected { reason });
        true
    }

    /// Sleep out the backoff delay, or park until a manual reconnect once
    /// the attempt cap is exceeded
    async fn wait_for_retry(&mut self) -> Wait {
        let attempts = self.status.lock().attempts;

        if !self.config.allows_retry(attempts) {
            let err = Error::ReconnectExhausted {
                endpoint: self.id().clone(),
                attempts,
            };
            self.status.lock().mark_exhausted(err);
            tracing::error!(endpoint = %self.id(), attempts, "Reconnect attempts exhausted");
            self.events.emit(ConnectionEvent::ReconnectFailed { attempts });
            return self.wait_for_manual_reconnect().await;
        }

        let delay = self.config.backoff.delay(attempts);
        self.status.lock().schedule_retry(delay);
        tracing::info!(
            endpoint = %self.id(),
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Wait::Cancelled,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Reconnect) => {
                        tracing::info!(endpoint = %self.id(), "Manual reconnect, skipping backoff");
                        self.status.lock().reset_attempts();
                        return Wait::Retry;
                    }
                    Some(_) => continue,
                    None => return Wait::Cancelled,
                },
                _ = &mut sleep => return Wait::Retry,
            }
        }
    }

    async fn wait_for_manual_reconnect(&mut self) -> Wait {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Wait::Cancelled,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Reconnect) => {
                        tracing::info!(endpoint = %self.id(), "Manual reconnect after exhaustion");
                        self.status.lock().reset_attempts();
                        return Wait::Retry;
                    }
                    Some(_) => continue,
                    None => return Wait::Cancelled,
                },
            }
        }
    }

    fn finish(&self) {
        self.status.lock().close();
        tracing::info!(endpoint = %self.id(), "Connection closed");
        self.events.emit(ConnectionEvent::Closed);
    }
}
