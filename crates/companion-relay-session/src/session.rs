//! The per-process session handle.

use std::sync::{Arc, RwLock};

use companion_relay_core::{
    ActivationState, RawSessionCallback, RelayError, SessionEvent, SessionTransport,
    transport::CallbackReceiver,
};

use crate::normalize::normalize;
use crate::registry::{ListenerRegistry, SubscriptionId};

pub(crate) struct SessionState {
    pub(crate) activation_state: ActivationState,
    pub(crate) is_reachable: bool,
}

/// Single shared handle over the pairing transport.
///
/// Exactly one handle exists per transport: construction claims the
/// transport's callback channel, and a second [`CompanionSession::bind`]
/// over the same transport fails with `SessionAlreadyBound`. The handle
/// lives for the rest of the process; share it as an `Arc`.
///
/// Session state is mirrored here and mutated only by the single task
/// consuming the transport's callback channel, so observers never see
/// torn updates.
pub struct CompanionSession {
    pub(crate) transport: Arc<dyn SessionTransport>,
    pub(crate) state: RwLock<SessionState>,
    pub(crate) registry: ListenerRegistry,
}

impl CompanionSession {
    /// Bind a session handle to a transport and start event delivery.
    ///
    /// # Errors
    /// Returns `SessionAlreadyBound` when the transport's callback channel
    /// was already claimed by another handle.
    pub fn bind(transport: Arc<dyn SessionTransport>) -> Result<Arc<Self>, RelayError> {
        let callbacks = transport
            .take_callbacks()
            .ok_or(RelayError::SessionAlreadyBound)?;

        let session = Arc::new(Self {
            state: RwLock::new(SessionState {
                activation_state: ActivationState::NotActivated,
                is_reachable: transport.is_reachable(),
            }),
            transport,
            registry: ListenerRegistry::new(),
        });

        session.spawn_pump(callbacks);
        Ok(session)
    }

    /// Current activation state.
    #[must_use]
    pub fn activation_state(&self) -> ActivationState {
        self.state.read().unwrap().activation_state
    }

    /// Whether the platform supports companion connectivity.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.transport.is_supported()
    }

    /// Whether a companion device is paired.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.transport.is_paired()
    }

    /// Whether the companion application is installed on the paired device.
    #[must_use]
    pub fn is_companion_app_installed(&self) -> bool {
        self.transport.is_companion_app_installed()
    }

    /// Whether the counterpart can receive immediate messages right now.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.state.read().unwrap().is_reachable
    }

    /// Subscribe a handler to a named event.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe(event_name, handler)
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Remove every subscription for an event name.
    pub fn remove_all_listeners(&self, event_name: &str) -> usize {
        self.registry.remove_all(event_name)
    }

    /// Spawn the single consumer of the transport's callback channel.
    ///
    /// The channel is the serial delivery context: callbacks are applied
    /// to the state mirror and emitted one at a time, in arrival order.
    fn spawn_pump(self: &Arc<Self>, mut callbacks: CallbackReceiver) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(raw) = callbacks.recv().await {
                session.apply(&raw);
                let event = normalize(raw);
                tracing::debug!(event = event.name(), "delivering session event");
                session.registry.emit(&event);
            }
            tracing::debug!("transport callback channel closed");
        });
    }

    fn apply(&self, raw: &RawSessionCallback) {
        match raw {
            RawSessionCallback::ActivationCompleted { state, .. } => {
                let mut session_state = self.state.write().unwrap();
                session_state.activation_state = *state;
                session_state.is_reachable = self.transport.is_reachable();
            }
            RawSessionCallback::ReachabilityChanged { is_reachable } => {
                self.state.write().unwrap().is_reachable = *is_reachable;
            }
            RawSessionCallback::MessageReceived { .. }
            | RawSessionCallback::ContextReceived { .. }
            | RawSessionCallback::TransferFinished { .. } => {}
        }
    }
}
