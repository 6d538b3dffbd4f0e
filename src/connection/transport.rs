//! WebSocket transport helpers

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket to `url`, bounded by `timeout`
///
/// The error is a human readable reason; callers wrap it in the error
/// variant that fits their phase.
pub(crate) async fn open_socket(
    url: &str,
    timeout: Duration,
    nodelay: bool,
) -> std::result::Result<WsStream, String> {
    match tokio::time::timeout(timeout, connect_async_with_config(url, None, nodelay)).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
    }
}

/// Best-effort close handshake
pub(crate) async fn close_socket(ws: &mut WsStream, timeout: Duration) {
    match tokio::time::timeout(timeout, ws.close(None)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
        Err(_) => tracing::debug!("Close handshake timed out"),
    }
}
