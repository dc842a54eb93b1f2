//! WebSocket session channel: upgrade handler and per-connection tasks.
//!
//! The channel shares the host's single listener with the HTTP surface
//! (see [`super::server`]); a `GET /` carrying an upgrade request lands
//! here.  For each upgraded connection this module:
//!
//! 1. Runs two halves:
//!    - **Reader**: decodes client text frames and hands them to the
//!      [`SessionDispatcher`].
//!    - **Writer**: drains the connection's outbound queue and writes each
//!      [`ServerMessage`] as a JSON text frame.  It also closes the socket
//!      when the application asks (eviction by a newer session).
//! 2. Cleans up registries and capture resources when the connection ends.
//!
//! A frame that fails to decode is logged and skipped; one bad frame never
//! ends the session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use localdesk_core::{decode_client_message, encode_server_message, ServerMessage};

use crate::application::connection::{ConnectionHandle, ConnectionId, OutboundQueue};
use crate::application::dispatch::SessionDispatcher;

/// Routes for the session channel.  Phones connect to `ws://host:port/`.
pub fn routes(dispatcher: Arc<SessionDispatcher>) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .with_state(dispatcher)
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(dispatcher): State<Arc<SessionDispatcher>>,
) -> Response {
    debug!("WebSocket upgrade from {peer_addr}");
    ws.on_upgrade(move |socket| handle_connection(socket, peer_addr, dispatcher))
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(
    socket: WebSocket,
    peer_addr: SocketAddr,
    dispatcher: Arc<SessionDispatcher>,
) {
    let id = ConnectionId::new();
    info!("connection {id} established from {peer_addr}");

    let (ws_tx, mut ws_rx) = socket.split();
    let (handle, queue) = ConnectionHandle::channel(id);
    let mut writer = tokio::spawn(write_outbound(id, ws_tx, queue));

    loop {
        let frame = tokio::select! {
            _ = &mut writer => {
                debug!("connection {id}: writer finished");
                break;
            }
            frame = ws_rx.next() => frame,
        };

        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!("connection {id}: stream ended: {e}");
                break;
            }
            None => {
                debug!("connection {id}: stream ended");
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => match decode_client_message(&text) {
                Ok(decoded) => dispatcher.dispatch(&handle, decoded).await,
                Err(e) => warn!("connection {id}: {e}"),
            },
            WsMessage::Close(_) => {
                debug!("connection {id}: Close frame received");
                break;
            }
            WsMessage::Binary(_) => warn!("connection {id}: unexpected binary frame (ignored)"),
            _ => {}
        }
    }

    handle.close();
    dispatcher.disconnect(id).await;
    writer.abort();
    info!("connection {id} from {peer_addr} closed");
}

/// Writes queued messages until the queue closes or a close is requested.
async fn write_outbound<S>(id: ConnectionId, mut sink: S, mut queue: OutboundQueue)
where
    S: futures_util::Sink<WsMessage, Error = axum::Error> + Unpin,
{
    loop {
        let msg: ServerMessage = tokio::select! {
            next = queue.rx.recv() => match next {
                Some(msg) => msg,
                None => break,
            },
            _ = queue.close.notified() => {
                debug!("connection {id}: closing on request");
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        };

        let text = match encode_server_message(&msg) {
            Ok(text) => text,
            Err(e) => {
                error!("connection {id}: {e}");
                continue;
            }
        };
        if sink.send(WsMessage::Text(text)).await.is_err() {
            debug!("connection {id}: send failed (peer gone)");
            break;
        }
    }
}
