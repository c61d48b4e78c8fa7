//! Trait boundary to the underlying pairing/communication transport.
//!
//! The transport is a black box: pairing, reachability detection, routing
//! and OS-level queuing all live behind it. The relay consumes two things
//! from it: the command primitives on [`SessionTransport`] and a single
//! serial stream of [`RawSessionCallback`]s.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::event::{ActivationState, EventError, ReplyHandler, TransferHandle, TransferId};
use crate::payload::Payload;

/// Raw lifecycle callback delivered by the transport.
///
/// One variant per delegate callback of the underlying session. Callbacks
/// arrive on a single channel, so they are never delivered concurrently
/// with each other.
#[derive(Debug)]
pub enum RawSessionCallback {
    /// Activation finished, possibly with an error payload.
    ActivationCompleted {
        /// Resulting activation state.
        state: ActivationState,
        /// Activation error, when the transport reported one.
        error: Option<EventError>,
    },
    /// Counterpart reachability flipped.
    ReachabilityChanged {
        /// New reachability.
        is_reachable: bool,
    },
    /// An immediate message arrived. `reply` is present exactly when the
    /// sender expects a reply.
    MessageReceived {
        /// The message payload.
        message: Payload,
        /// Reply channel, when the sender awaits one.
        reply: Option<ReplyHandler>,
    },
    /// The counterpart replaced the shared application context.
    ContextReceived {
        /// The latest context snapshot.
        context: Payload,
    },
    /// A queued transfer finished.
    TransferFinished {
        /// Id of the finished transfer.
        transfer_id: TransferId,
        /// Failure description; `None` means success.
        error: Option<EventError>,
        /// Metadata echoed from the transfer request.
        user_info: Payload,
    },
}

/// Sending half of the raw callback channel, held by the transport.
pub type CallbackSender = mpsc::UnboundedSender<RawSessionCallback>;
/// Receiving half of the raw callback channel, claimed by the session handle.
pub type CallbackReceiver = mpsc::UnboundedReceiver<RawSessionCallback>;

/// Create the serial delivery channel for raw session callbacks.
#[must_use]
pub fn callback_channel() -> (CallbackSender, CallbackReceiver) {
    mpsc::unbounded_channel()
}

/// Capability boundary to the underlying pairing transport.
///
/// Implementations own their internal serialization; the relay may invoke
/// commands concurrently from multiple call sites. All queries are
/// non-blocking; all outcomes beyond synchronous acceptance arrive as
/// [`RawSessionCallback`]s.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Whether the platform supports companion connectivity at all.
    fn is_supported(&self) -> bool;

    /// Whether a companion device is currently paired.
    fn is_paired(&self) -> bool;

    /// Whether the companion application is installed on the paired device.
    fn is_companion_app_installed(&self) -> bool;

    /// Whether the counterpart can receive immediate messages right now.
    fn is_reachable(&self) -> bool;

    /// Request activation. The outcome arrives via
    /// [`RawSessionCallback::ActivationCompleted`], never as a synchronous
    /// error.
    async fn request_activation(&self);

    /// Deliver a message to the counterpart immediately (not queued).
    ///
    /// # Errors
    /// Returns an error only on synchronous rejection; delivery outcomes
    /// are otherwise invisible unless the sender awaits a reply.
    async fn send_message(
        &self,
        payload: Payload,
        reply: Option<ReplyHandler>,
    ) -> Result<(), TransportError>;

    /// Replace the shared application context wholesale.
    ///
    /// Delivery is eventual and latest-wins: the counterpart always ends
    /// up observing the newest accepted context, but intermediate values
    /// may be coalesced away.
    ///
    /// # Errors
    /// Returns an error when the payload is rejected synchronously.
    async fn set_application_context(&self, payload: Payload) -> Result<(), TransportError>;

    /// Enqueue a payload transfer. Completion arrives via
    /// [`RawSessionCallback::TransferFinished`].
    ///
    /// # Errors
    /// Returns an error when the transfer cannot be enqueued.
    async fn transfer_file(&self, handle: &TransferHandle) -> Result<(), TransportError>;

    /// Hand over the receiving half of the raw callback channel.
    ///
    /// Yields `Some` exactly once; a second call returns `None`. This is
    /// what enforces the single-session-handle-per-transport invariant.
    fn take_callbacks(&self) -> Option<CallbackReceiver>;
}
