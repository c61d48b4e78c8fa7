//! Normalized session events and their payload types.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::RelayError;
use crate::payload::Payload;

/// Event name: session activation finished (possibly with an error payload).
pub const ACTIVATION_DID_COMPLETE: &str = "activationDidComplete";
/// Event name: counterpart reachability flipped.
pub const REACHABILITY_DID_CHANGE: &str = "reachabilityDidChange";
/// Event name: immediate message arrived from the counterpart.
pub const DID_RECEIVE_MESSAGE: &str = "didReceiveMessage";
/// Event name: a whole-context replacement arrived from the counterpart.
pub const DID_RECEIVE_APPLICATION_CONTEXT: &str = "didReceiveApplicationContext";
/// Event name: a queued payload transfer finished (success or failure).
pub const TRANSFER_DID_FINISH: &str = "transferDidFinish";

/// The closed set of event names exposed over the host bridge.
///
/// These strings are part of the wire contract and must never be renamed,
/// reordered, or merged. `didReceiveMessage` covers both the reply-expected
/// and fire-and-forget message forms; reply presence is payload shape.
pub const EVENT_NAMES: [&str; 5] = [
    ACTIVATION_DID_COMPLETE,
    REACHABILITY_DID_CHANGE,
    DID_RECEIVE_MESSAGE,
    DID_RECEIVE_APPLICATION_CONTEXT,
    TRANSFER_DID_FINISH,
];

/// Activation state of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Session has not been activated yet.
    NotActivated,
    /// Activation was requested and is in flight.
    Activating,
    /// Session is activated and commands may be issued.
    Activated,
}

impl ActivationState {
    /// Wire string for this state, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotActivated => "not_activated",
            Self::Activating => "activating",
            Self::Activated => "activated",
        }
    }
}

/// Descriptive error record carried inside event payloads.
///
/// Failure is data here, not a fault: the event delivery itself always
/// succeeds, and the error describes what the transport reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError {
    /// Stable snake_case error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl EventError {
    /// Create an error record.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Transfer identifier.
pub type TransferId = Uuid;

/// Handle for a queued payload transfer.
///
/// Returned when a transfer is accepted; completion arrives later via a
/// `TransferDidFinish` event carrying the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHandle {
    /// Unique transfer identifier.
    pub id: TransferId,
    /// Location of the payload to transfer.
    pub uri: String,
    /// Caller-supplied metadata, echoed back as `userInfo` on completion.
    pub metadata: Payload,
}

impl TransferHandle {
    /// Create a handle with a fresh id.
    #[must_use]
    pub fn new(uri: impl Into<String>, metadata: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            metadata,
        }
    }
}

/// One-shot reply channel attached to a received message.
///
/// Cloneable so an event snapshot can fan out to several listeners, but
/// only the first `reply` call wins; later calls get `ReplyAlreadySent`.
#[derive(Clone)]
pub struct ReplyHandler {
    tx: Arc<Mutex<Option<oneshot::Sender<Payload>>>>,
}

impl ReplyHandler {
    /// Create a handler and the receiver the reply will arrive on.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<Payload>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Send the reply payload back to the message sender.
    ///
    /// # Errors
    /// Returns `ReplyAlreadySent` if a reply was already delivered.
    pub fn reply(&self, payload: Payload) -> Result<(), RelayError> {
        let tx = self
            .tx
            .lock()
            .unwrap()
            .take()
            .ok_or(RelayError::ReplyAlreadySent)?;
        // A dropped receiver means the sender stopped waiting; the reply
        // itself was still consumed.
        let _ = tx.send(payload);
        Ok(())
    }

    /// Whether a reply has already been sent.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }
}

impl std::fmt::Debug for ReplyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyHandler")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// A normalized session event.
///
/// One variant per raw transport callback family, each with a fixed field
/// layout. Events are immutable, delivered at most once per underlying
/// occurrence, and never reordered or batched by the relay.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Activation finished. `error` is present only when the transport
    /// reported one; activation can complete with an error payload while
    /// the session stays usable for capability checks.
    ActivationDidComplete {
        /// Resulting activation state.
        state: ActivationState,
        /// Transport-reported activation error, if any.
        error: Option<EventError>,
    },
    /// Counterpart reachability changed.
    ReachabilityDidChange {
        /// Whether the counterpart can now receive immediate messages.
        is_reachable: bool,
    },
    /// A message arrived. `reply_handler` is present exactly when the
    /// sender expects a reply.
    DidReceiveMessage {
        /// The received message payload.
        message: Payload,
        /// Reply channel, when the sender awaits one.
        reply_handler: Option<ReplyHandler>,
    },
    /// The counterpart replaced the shared application context.
    DidReceiveApplicationContext {
        /// The new (latest) context snapshot.
        application_context: Payload,
    },
    /// A queued transfer finished.
    TransferDidFinish {
        /// Id of the transfer this completion belongs to.
        transfer_id: TransferId,
        /// Whether the transfer succeeded.
        success: bool,
        /// Failure description when `success` is false.
        error: Option<EventError>,
        /// Metadata echoed from the original transfer request.
        user_info: Payload,
    },
}

impl SessionEvent {
    /// Wire-contract name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ActivationDidComplete { .. } => ACTIVATION_DID_COMPLETE,
            Self::ReachabilityDidChange { .. } => REACHABILITY_DID_CHANGE,
            Self::DidReceiveMessage { .. } => DID_RECEIVE_MESSAGE,
            Self::DidReceiveApplicationContext { .. } => DID_RECEIVE_APPLICATION_CONTEXT,
            Self::TransferDidFinish { .. } => TRANSFER_DID_FINISH,
        }
    }
}
