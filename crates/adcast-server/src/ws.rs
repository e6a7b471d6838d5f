use adcast_core::Advertisement;
use adcast_hub::{AdSink, SessionHandler, SinkError};
use async_trait::async_trait;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::server::AppState;

/// WebSocket upgrade handler. Anything that is not an upgrade gets 426.
pub async fn ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state)),
        Err(rejection) => {
            tracing::debug!(%rejection, "non-upgrade request on ad stream");
            (StatusCode::UPGRADE_REQUIRED, "WebSocket upgrade required").into_response()
        }
    }
}

/// Writes ads to the socket as JSON text frames.
pub struct WsAdSink {
    tx: SplitSink<WebSocket, Message>,
}

impl WsAdSink {
    pub fn new(tx: SplitSink<WebSocket, Message>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AdSink for WsAdSink {
    async fn send_ad(&mut self, ad: &Advertisement) -> Result<(), SinkError> {
        let json = ad.to_wire().map_err(|e| SinkError::Encode(e.to_string()))?;
        self.tx
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| SinkError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.tx.close().await;
    }
}

/// Drive one connection: a reader watching for the peer going away, and a
/// session handler relaying the mailbox to the writer half.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_tx, mut ws_rx) = socket.split();
    let peer_closed = CancellationToken::new();

    // Inbound frames carry nothing; only closure matters
    let reader_token = peer_closed.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
        reader_token.cancel();
    });

    let outcome = SessionHandler::new(state.hub, WsAdSink::new(ws_tx))
        .run(peer_closed)
        .await;
    reader.abort();

    tracing::debug!(delivered = outcome.delivered, reason = ?outcome.reason, "websocket closed");
}
