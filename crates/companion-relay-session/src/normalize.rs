//! Raw transport callbacks to normalized session events.

use companion_relay_core::{RawSessionCallback, SessionEvent};

/// Map one raw transport callback to exactly one normalized event.
///
/// The mapping never drops fields present on the raw callback and never
/// invents fields absent from it: an `error` is carried only when the
/// transport reported one, a `reply_handler` only when the sender expects
/// a reply.
#[must_use]
pub fn normalize(raw: RawSessionCallback) -> SessionEvent {
    match raw {
        RawSessionCallback::ActivationCompleted { state, error } => {
            SessionEvent::ActivationDidComplete { state, error }
        }
        RawSessionCallback::ReachabilityChanged { is_reachable } => {
            SessionEvent::ReachabilityDidChange { is_reachable }
        }
        RawSessionCallback::MessageReceived { message, reply } => SessionEvent::DidReceiveMessage {
            message,
            reply_handler: reply,
        },
        RawSessionCallback::ContextReceived { context } => {
            SessionEvent::DidReceiveApplicationContext {
                application_context: context,
            }
        }
        RawSessionCallback::TransferFinished {
            transfer_id,
            error,
            user_info,
        } => SessionEvent::TransferDidFinish {
            transfer_id,
            success: error.is_none(),
            error,
            user_info,
        },
    }
}
