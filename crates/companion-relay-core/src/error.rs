//! Error taxonomy for relay commands.

use thiserror::Error;

/// Error raised by the transport when it rejects a primitive synchronously.
///
/// Anything that happens after the transport accepted an operation is
/// reported through events, never through these.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport rejected an immediate message send.
    #[error("send rejected: {0}")]
    SendRejected(String),
    /// The transport rejected a context replacement (e.g. unserializable).
    #[error("application context rejected: {0}")]
    ContextRejected(String),
    /// The transport refused to enqueue a payload transfer.
    #[error("transfer rejected: {0}")]
    TransferRejected(String),
}

/// Error returned by relay commands.
///
/// Precondition failures reject before any transport round trip; a
/// successful command means "accepted for delivery", never "delivered".
#[derive(Debug, Error)]
pub enum RelayError {
    /// The platform lacks companion connectivity. Fatal for the call,
    /// not for the process.
    #[error("companion connectivity is not supported on this platform")]
    Unsupported,
    /// Command issued before activation completed; retry after the
    /// `activationDidComplete` event.
    #[error("session is not activated")]
    NotActivated,
    /// Counterpart cannot receive immediate messages right now; retry
    /// after `reachabilityDidChange` fires true.
    #[error("counterpart is not reachable")]
    NotReachable,
    /// The transport rejected the context payload synchronously.
    #[error("application context update failed: {0}")]
    ContextUpdateFailed(String),
    /// A reply was already sent on this handler.
    #[error("reply already sent")]
    ReplyAlreadySent,
    /// The transport's callback channel was already claimed by another
    /// session handle. Only one handle may exist per process.
    #[error("session callbacks already bound to another handle")]
    SessionAlreadyBound,
    /// Synchronous transport rejection other than a context update.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// Stable snake_case code for this error, used in event payloads and
    /// over the host bridge.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::NotActivated => "not_activated",
            Self::NotReachable => "not_reachable",
            Self::ContextUpdateFailed(_) | Self::Transport(TransportError::ContextRejected(_)) => {
                "context_update_failed"
            }
            Self::ReplyAlreadySent => "reply_already_sent",
            Self::SessionAlreadyBound => "session_already_bound",
            Self::Transport(TransportError::SendRejected(_)) => "send_failed",
            Self::Transport(TransportError::TransferRejected(_)) => "transfer_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RelayError::Unsupported.code(), "unsupported");
        assert_eq!(RelayError::NotActivated.code(), "not_activated");
        assert_eq!(RelayError::NotReachable.code(), "not_reachable");
        assert_eq!(
            RelayError::ContextUpdateFailed("bad".into()).code(),
            "context_update_failed"
        );
        assert_eq!(
            RelayError::Transport(TransportError::SendRejected("peer gone".into())).code(),
            "send_failed"
        );
        assert_eq!(
            RelayError::Transport(TransportError::TransferRejected("queue full".into())).code(),
            "transfer_failed"
        );
    }
}
