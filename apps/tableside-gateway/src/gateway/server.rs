//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRequestParts, State, WebSocketUpgrade};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::error::HandshakeRejected;
use crate::AppState;

use super::broadcast::Payload;
use super::events::ServerFrame;
use super::session::{ConnectionId, ConnectionManager};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

pub fn router(path: &str) -> Router<AppState> {
    Router::new().route(path, get(ws_upgrade).fallback(reject))
}

/// Fallback for every unrouted request and every non-GET on the gateway
/// path: the gatekeeper turns it away without a body.
pub async fn reject(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    match state.gatekeeper.admit(uri.path(), &headers) {
        Err(rejected) => rejected.into_response(),
        Ok(()) => HandshakeRejected::PathMismatch(uri.path().to_string()).into_response(),
    }
}

/// Proof that the gatekeeper admitted the request. Listed before
/// `WebSocketUpgrade` so it runs first.
pub struct Admitted;

impl FromRequestParts<AppState> for Admitted {
    type Rejection = HandshakeRejected;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.gatekeeper.admit(parts.uri.path(), &parts.headers)?;
        Ok(Admitted)
    }
}

async fn ws_upgrade(
    _admitted: Admitted,
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(e) => return HandshakeRejected::NotUpgrade(e.body_text()).into_response(),
    };

    let identity = match state.auth.authenticate(&headers, &uri) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    let connections = state.connections.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, connections, identity))
}

async fn handle_connection(socket: WebSocket, connections: Arc<ConnectionManager>, identity: Option<Identity>) {
    let (mut ws_tx, ws_rx) = socket.split();

    let user_id = identity.as_ref().map(|i| i.id.clone());
    let opened = connections.open(identity);
    let id = opened.id;

    tracing::info!(connection_id = %id, user_id = ?user_id, "gateway connection opened");

    if send_frame(&mut ws_tx, &opened.hello).await.is_ok() {
        run_connection(&connections, &id, ws_tx, ws_rx, opened.outbound).await;
    }

    let rooms_left = connections.close(&id);

    tracing::info!(connection_id = %id, rooms_left, "gateway connection closed");
}

/// Main loop: read client frames, forward queued broadcasts. Returns when
/// either side goes away.
async fn run_connection(
    connections: &ConnectionManager,
    id: &ConnectionId,
    mut ws_tx: WsSink,
    mut ws_rx: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Payload>,
) {
    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = connections.handle_text(id, text.as_str()) {
                            if send_frame(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(connection_id = %id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %id, "ws read error");
                        break;
                    }
                }
            }

            // Broadcast queued by a room delivery.
            payload = outbound.recv() => {
                match payload {
                    Some(payload) => {
                        if ws_tx.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

async fn send_frame(ws_tx: &mut WsSink, frame: &ServerFrame) -> Result<(), axum::Error> {
    match frame.to_json() {
        Ok(json) => ws_tx.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize server frame");
            Ok(())
        }
    }
}
