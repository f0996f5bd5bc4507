//! Realtime WebSocket endpoint.
//!
//! Accepts connections on `/realtime`, hands each one an outbound queue
//! from the [`ConnectionTable`], and pumps frames between the socket and
//! the [`ProtocolDispatcher`]. One task per connection owns both halves
//! of the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use dnh_core::{ConnectionTable, ProtocolDispatcher};

/// Path clients must request during the upgrade.
pub const REALTIME_PATH: &str = "/realtime";

/// `/realtime`, with or without a trailing slash.
pub fn is_realtime_path(path: &str) -> bool {
    path.strip_prefix(REALTIME_PATH)
        .is_some_and(|rest| rest.is_empty() || rest == "/")
}

// ── Accept loop ──────────────────────────────────────────────────────

/// Accept connections until `cancel` fires.
pub async fn serve_realtime(
    listener: TcpListener,
    dispatcher: Arc<ProtocolDispatcher>,
    table: Arc<ConnectionTable>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&dispatcher),
                        Arc::clone(&table),
                        cancel.child_token(),
                    ));
                }
                Err(e) => tracing::warn!(error = %e, "WebSocket accept failed"),
            },
        }
    }
    tracing::debug!("WebSocket accept loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<ProtocolDispatcher>,
    table: Arc<ConnectionTable>,
    cancel: CancellationToken,
) {
    let check_path = |request: &Request, response: Response| {
        if is_realtime_path(request.uri().path()) {
            Ok(response)
        } else {
            let mut refusal = ErrorResponse::new(Some("Not Found".to_owned()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "WebSocket handshake refused");
            return;
        }
    };

    let (conn, mut outbound) = table.open();
    dispatcher.on_open(conn);
    tracing::info!(conn = %conn, peer = %peer, "WebSocket connected");

    let (mut sink, mut frames) = ws.split();
    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break "server shutting down".to_owned();
            }
            Some(payload) = outbound.recv() => {
                if let Err(e) = sink.send(Message::text(payload.to_string())).await {
                    break format!("write failed: {e}");
                }
            }
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatcher.on_message(conn, text.as_str()),
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!(conn = %conn, "binary frame ignored");
                }
                Some(Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed)) | None => {
                    break "closed by peer".to_owned();
                }
                // tungstenite answers pings itself
                Some(Ok(_)) => {}
                Some(Err(e)) => break format!("read failed: {e}"),
            },
        }
    };

    dispatcher.on_close(conn, &reason);
    table.close(conn);
    tracing::info!(conn = %conn, reason = %reason, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_path_allows_trailing_slash_only() {
        assert!(is_realtime_path("/realtime"));
        assert!(is_realtime_path("/realtime/"));
        assert!(!is_realtime_path("/realtime//"));
        assert!(!is_realtime_path("/realtimes"));
        assert!(!is_realtime_path("/"));
        assert!(!is_realtime_path("/other"));
    }
}
