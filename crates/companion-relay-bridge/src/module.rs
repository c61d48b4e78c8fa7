//! Per-client bridge module: request handling and event forwarding.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use companion_relay_core::{RelayError, ReplyHandler, SessionEvent};
use companion_relay_session::{CompanionSession, SubscriptionId};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{BridgeRequest, BridgeResponse, event_payload};

/// Bridge-level protocol error.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `Reply` referenced a reply id that is unknown or already consumed.
    #[error("unknown reply id: {0}")]
    UnknownReplyId(Uuid),
    /// The request could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl BridgeError {
    /// Stable snake_case code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownReplyId(_) => "unknown_reply_id",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// One connected host runtime client.
///
/// Owns the client's subscriptions and its table of retained reply
/// handlers. Event frames and responses go out through the same channel,
/// so a client observes them in emission order. Dropping the module
/// unsubscribes everything it registered.
pub struct BridgeModule {
    session: Arc<CompanionSession>,
    outbound: mpsc::UnboundedSender<BridgeResponse>,
    pending_replies: Arc<Mutex<HashMap<Uuid, ReplyHandler>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl BridgeModule {
    /// Create a module and the channel its frames arrive on.
    #[must_use]
    pub fn new(
        session: Arc<CompanionSession>,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(session, tx), rx)
    }

    /// Create a module writing frames to an existing channel.
    #[must_use]
    pub fn with_sender(
        session: Arc<CompanionSession>,
        outbound: mpsc::UnboundedSender<BridgeResponse>,
    ) -> Self {
        Self {
            session,
            outbound,
            pending_replies: Arc::new(Mutex::new(HashMap::new())),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Handle one request, producing exactly one response.
    pub async fn handle_request(&self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::Activate => {
                self.session.activate().await;
                BridgeResponse::Ack
            }
            BridgeRequest::GetCapabilities => BridgeResponse::Capabilities {
                supported: self.session.is_supported(),
                paired: self.session.is_paired(),
                app_installed: self.session.is_companion_app_installed(),
                reachable: self.session.is_reachable(),
                activation_state: self.session.activation_state(),
            },
            BridgeRequest::SendMessage { payload } => {
                match self.session.send_message(payload).await {
                    Ok(()) => BridgeResponse::Ack,
                    Err(e) => relay_error(&e),
                }
            }
            BridgeRequest::UpdateApplicationContext { payload } => {
                match self.session.update_application_context(payload).await {
                    Ok(()) => BridgeResponse::Ack,
                    Err(e) => relay_error(&e),
                }
            }
            BridgeRequest::TransferFile { uri, metadata } => {
                match self.session.transfer_file(uri, metadata).await {
                    Ok(handle) => BridgeResponse::TransferQueued {
                        transfer_id: handle.id,
                    },
                    Err(e) => relay_error(&e),
                }
            }
            BridgeRequest::AddListener { event } => BridgeResponse::Subscribed {
                subscription_id: self.add_listener(event),
            },
            BridgeRequest::RemoveListeners { event } => {
                let removed = self.session.remove_all_listeners(&event);
                tracing::debug!(event = %event, removed, "removed listeners");
                BridgeResponse::Ack
            }
            BridgeRequest::Reply { reply_id, payload } => {
                let handler = self.pending_replies.lock().unwrap().remove(&reply_id);
                match handler {
                    Some(handler) => match handler.reply(payload) {
                        Ok(()) => BridgeResponse::Ack,
                        Err(e) => relay_error(&e),
                    },
                    None => bridge_error(&BridgeError::UnknownReplyId(reply_id)),
                }
            }
            BridgeRequest::Ping => BridgeResponse::Pong,
        }
    }

    /// Subscribe the client to an event name, forwarding each delivery as
    /// an `Event` frame.
    ///
    /// A `didReceiveMessage` carrying a reply handler gets a generated
    /// `replyId`; the handler is retained until a `Reply` request consumes
    /// it or the module is dropped.
    fn add_listener(&self, event_name: String) -> SubscriptionId {
        let outbound = self.outbound.clone();
        let pending = Arc::clone(&self.pending_replies);

        let id = self.session.subscribe(event_name, move |event: &SessionEvent| {
            let reply_id = match event {
                SessionEvent::DidReceiveMessage {
                    reply_handler: Some(handler),
                    ..
                } => {
                    let id = Uuid::new_v4();
                    pending.lock().unwrap().insert(id, handler.clone());
                    Some(id)
                }
                _ => None,
            };
            let _ = outbound.send(BridgeResponse::Event {
                event: event.name().to_string(),
                payload: event_payload(event, reply_id),
            });
        });

        self.subscriptions.lock().unwrap().push(id);
        id
    }

    /// Drop every subscription and retained reply handler this client
    /// registered.
    pub fn detach(&self) {
        let ids: Vec<SubscriptionId> = self.subscriptions.lock().unwrap().drain(..).collect();
        for id in ids {
            self.session.unsubscribe(id);
        }
        self.pending_replies.lock().unwrap().clear();
    }
}

impl Drop for BridgeModule {
    fn drop(&mut self) {
        self.detach();
    }
}

fn relay_error(error: &RelayError) -> BridgeResponse {
    BridgeResponse::Error {
        code: error.code().to_string(),
        message: error.to_string(),
    }
}

/// Build an error response for a bridge-level failure.
#[must_use]
pub fn bridge_error(error: &BridgeError) -> BridgeResponse {
    BridgeResponse::Error {
        code: error.code().to_string(),
        message: error.to_string(),
    }
}
