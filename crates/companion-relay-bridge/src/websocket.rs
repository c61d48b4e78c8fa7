//! WebSocket serving for the bridge protocol.
//!
//! Each connected socket gets its own `BridgeModule`: subscriptions and
//! retained reply handlers live and die with the connection.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use companion_relay_session::CompanionSession;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::module::{BridgeError, BridgeModule, bridge_error};
use crate::protocol::{BridgeRequest, BridgeResponse};

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler with an `Arc<CompanionSession>` as
/// state.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(session): State<Arc<CompanionSession>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, session))
}

async fn handle_socket(socket: WebSocket, session: Arc<CompanionSession>) {
    let (mut sender, mut receiver) = socket.split();

    // Responses and pushed event frames share one channel, so the client
    // observes them in emission order.
    let (tx, mut rx) = mpsc::unbounded_channel::<BridgeResponse>();
    let module = BridgeModule::with_sender(session, tx.clone());

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s.into(),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let request: BridgeRequest = match serde_json::from_str(&text) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Invalid bridge request: {e}");
                let _ = tx.send(bridge_error(&BridgeError::InvalidRequest(e.to_string())));
                continue;
            }
        };

        let response = module.handle_request(request).await;
        let _ = tx.send(response);
    }

    // Dropping the module unsubscribes its listeners.
    drop(module);
    send_task.abort();
}

/// Create a router serving the bridge protocol at `/ws`.
#[must_use]
pub fn create_ws_router(session: Arc<CompanionSession>) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(session)
}
