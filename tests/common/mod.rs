//! In-process station server and event helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use station_link::{EndpointDescriptor, EventKind, TaggedEvent};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Frame received by the server, tagged with the accepted connection index
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub conn: usize,
    pub text: String,
}

enum Control {
    Push(String),
    Close,
}

/// WebSocket server standing in for a station
pub struct MockStation {
    pub addr: SocketAddr,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    clients: Arc<Mutex<Vec<mpsc::UnboundedSender<Control>>>>,
    task: JoinHandle<()>,
}

impl MockStation {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let clients: Arc<Mutex<Vec<mpsc::UnboundedSender<Control>>>> = Arc::default();

        let accepted = Arc::clone(&clients);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };
                let (control_tx, mut control_rx) = mpsc::unbounded_channel();
                let conn = {
                    let mut clients = accepted.lock();
                    clients.push(control_tx);
                    clients.len() - 1
                };
                let inbound_tx = inbound_tx.clone();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            frame = ws.next() => match frame {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = inbound_tx.send(Inbound {
                                        conn,
                                        text: text.as_str().to_owned(),
                                    });
                                }
                                Some(Ok(_)) => {}
                                Some(Err(_)) | None => break,
                            },
                            cmd = control_rx.recv() => match cmd {
                                Some(Control::Push(text)) => {
                                    if ws.send(Message::text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Control::Close) | None => {
                                    let _ = ws.close(None).await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            inbound,
            clients,
            task,
        }
    }

    pub fn descriptor(&self, id: &str) -> EndpointDescriptor {
        EndpointDescriptor::new(id, "127.0.0.1", self.addr.port())
    }

    /// Number of connections accepted so far
    pub fn accepted(&self) -> usize {
        self.clients.lock().len()
    }

    /// Push a text frame to the most recent connection
    pub fn push(&self, text: &str) {
        if let Some(client) = self.clients.lock().last() {
            let _ = client.send(Control::Push(text.to_owned()));
        }
    }

    /// Close the most recent connection from the server side
    pub fn drop_latest(&self) {
        if let Some(client) = self.clients.lock().last() {
            let _ = client.send(Control::Close);
        }
    }

    /// Next frame received from any client
    pub async fn recv(&mut self) -> Inbound {
        timeout(TIMEOUT, self.inbound.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("server stopped")
    }

    /// Check that no frame arrives within `window`
    pub async fn assert_silent(&mut self, window: Duration) {
        assert!(timeout(window, self.inbound.recv()).await.is_err());
    }
}

impl Drop for MockStation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Station that completes the WebSocket upgrade and then never reads
///
/// Once the socket buffers fill, every client write stalls.
pub struct StalledStation {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl StalledStation {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    held.push(ws);
                }
            }
        });

        Self { addr, task }
    }

    pub fn descriptor(&self, id: &str) -> EndpointDescriptor {
        EndpointDescriptor::new(id, "127.0.0.1", self.addr.port())
    }
}

impl Drop for StalledStation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Port with nothing listening on it
pub fn refused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Next event, whatever its kind
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> TaggedEvent {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until one of `kind` for `endpoint` arrives
pub async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<TaggedEvent>,
    endpoint: &str,
    kind: EventKind,
) -> TaggedEvent {
    loop {
        let event = next_event(rx).await;
        if event.endpoint.as_str() == endpoint && event.event.kind() == kind {
            return event;
        }
    }
}

/// Check that no event arrives within `window`
pub async fn assert_no_events(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>, window: Duration) {
    if let Ok(Some(event)) = timeout(window, rx.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
