//! Demo: a loopback companion pair served over the WebSocket bridge.
//!
//! Run with: cargo run -p bridge-server-demo
//!
//! Connect a WebSocket client to ws://localhost:3000/ws and speak the
//! bridge protocol, e.g.:
//!
//! ```json
//! {"type": "activate"}
//! {"type": "add_listener", "event": "didReceiveMessage"}
//! {"type": "send_message", "payload": {"type": "ping"}}
//! ```
//!
//! The in-process companion answers reply-expecting messages with a pong
//! and logs every context replacement it observes.

use std::{net::SocketAddr, sync::Arc};

use companion_relay_bridge::websocket::create_ws_router;
use companion_relay_core::{Payload, SessionEvent, event};
use companion_relay_session::CompanionSession;
use companion_relay_session::transport::{LoopbackConfig, LoopbackTransport};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (host_end, companion_end) =
        LoopbackTransport::pair(LoopbackConfig::default(), LoopbackConfig::default());

    let host = CompanionSession::bind(host_end)?;
    let companion = CompanionSession::bind(companion_end)?;

    spawn_companion(Arc::clone(&companion));
    companion.activate().await;

    let app = create_ws_router(host).layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("Bridge listening on ws://{addr}/ws");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// The in-process companion: answers messages and logs context changes.
fn spawn_companion(companion: Arc<CompanionSession>) {
    companion.subscribe(event::DID_RECEIVE_MESSAGE, |ev: &SessionEvent| {
        if let SessionEvent::DidReceiveMessage {
            message,
            reply_handler,
        } = ev
        {
            tracing::info!(?message, "companion received message");
            if let Some(handler) = reply_handler {
                let pong = Payload::from_value(json!({"response": "pong"}))
                    .unwrap_or_default();
                if let Err(e) = handler.reply(pong) {
                    tracing::warn!("companion reply failed: {e}");
                }
            }
        }
    });

    companion.subscribe(
        event::DID_RECEIVE_APPLICATION_CONTEXT,
        |ev: &SessionEvent| {
            if let SessionEvent::DidReceiveApplicationContext {
                application_context,
            } = ev
            {
                tracing::info!(?application_context, "companion observed context");
            }
        },
    );

    companion.subscribe(event::REACHABILITY_DID_CHANGE, |ev: &SessionEvent| {
        if let SessionEvent::ReachabilityDidChange { is_reachable } = ev {
            tracing::info!(is_reachable, "companion reachability changed");
        }
    });
}
