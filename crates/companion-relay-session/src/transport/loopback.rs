//! In-process paired transport.
//!
//! Two linked endpoints deliver messages, context snapshots and transfer
//! completions to each other without any OS pairing layer. Useful for
//! tests and single-process deployments; not a pairing protocol.

use std::sync::{
    Arc, Mutex, OnceLock, Weak,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use companion_relay_core::{
    ActivationState, EventError, Payload, RawSessionCallback, ReplyHandler, SessionTransport,
    TransferHandle, TransportError,
    transport::{CallbackReceiver, CallbackSender, callback_channel},
};
use tokio::sync::watch;

/// Capability flags for one loopback endpoint.
#[derive(Debug, Clone, Copy)]
pub struct LoopbackConfig {
    /// Platform capability flag.
    pub supported: bool,
    /// Whether a companion device counts as paired.
    pub paired: bool,
    /// Whether the companion app counts as installed.
    pub app_installed: bool,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            supported: true,
            paired: true,
            app_installed: true,
        }
    }
}

/// One endpoint of an in-process transport pair.
pub struct LoopbackTransport {
    config: LoopbackConfig,
    activated: AtomicBool,
    callbacks_tx: CallbackSender,
    callbacks_rx: Mutex<Option<CallbackReceiver>>,
    peer: OnceLock<Weak<Self>>,
    context_tx: watch::Sender<Option<Payload>>,
}

impl LoopbackTransport {
    /// Build a linked pair of endpoints.
    ///
    /// Context forwarding runs on spawned tasks, so this must be called
    /// from within a tokio runtime.
    #[must_use]
    pub fn pair(config_a: LoopbackConfig, config_b: LoopbackConfig) -> (Arc<Self>, Arc<Self>) {
        let (a, a_context_rx) = Self::endpoint(config_a);
        let (b, b_context_rx) = Self::endpoint(config_b);

        let _ = a.peer.set(Arc::downgrade(&b));
        let _ = b.peer.set(Arc::downgrade(&a));

        Self::spawn_context_forwarder(a_context_rx, b.callbacks_tx.clone());
        Self::spawn_context_forwarder(b_context_rx, a.callbacks_tx.clone());

        (a, b)
    }

    fn endpoint(config: LoopbackConfig) -> (Arc<Self>, watch::Receiver<Option<Payload>>) {
        let (callbacks_tx, callbacks_rx) = callback_channel();
        let (context_tx, context_rx) = watch::channel(None);
        (
            Arc::new(Self {
                config,
                activated: AtomicBool::new(false),
                callbacks_tx,
                callbacks_rx: Mutex::new(Some(callbacks_rx)),
                peer: OnceLock::new(),
                context_tx,
            }),
            context_rx,
        )
    }

    /// Forward context snapshots to the peer, latest-wins.
    ///
    /// A `watch` channel holds only the newest value: snapshots replaced
    /// before this task wakes up are coalesced away, so the peer never
    /// observes an older context after a newer one.
    fn spawn_context_forwarder(
        mut context_rx: watch::Receiver<Option<Payload>>,
        peer_tx: CallbackSender,
    ) {
        tokio::spawn(async move {
            while context_rx.changed().await.is_ok() {
                let snapshot = context_rx.borrow_and_update().clone();
                if let Some(context) = snapshot {
                    if peer_tx
                        .send(RawSessionCallback::ContextReceived { context })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });
    }

    fn peer(&self) -> Option<Arc<Self>> {
        self.peer.get().and_then(Weak::upgrade)
    }

    fn is_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTransport for LoopbackTransport {
    fn is_supported(&self) -> bool {
        self.config.supported
    }

    fn is_paired(&self) -> bool {
        self.config.paired && self.peer().is_some()
    }

    fn is_companion_app_installed(&self) -> bool {
        self.config.app_installed
    }

    fn is_reachable(&self) -> bool {
        self.config.supported
            && self.is_activated()
            && self
                .peer()
                .is_some_and(|peer| peer.config.supported && peer.is_activated())
    }

    async fn request_activation(&self) {
        self.activated.store(true, Ordering::SeqCst);
        let _ = self.callbacks_tx.send(RawSessionCallback::ActivationCompleted {
            state: ActivationState::Activated,
            error: None,
        });

        // Reachability flips for both endpoints once the second one is up.
        if let Some(peer) = self.peer() {
            if peer.is_activated() {
                let _ = self
                    .callbacks_tx
                    .send(RawSessionCallback::ReachabilityChanged { is_reachable: true });
                let _ = peer
                    .callbacks_tx
                    .send(RawSessionCallback::ReachabilityChanged { is_reachable: true });
            }
        }
    }

    async fn send_message(
        &self,
        payload: Payload,
        reply: Option<ReplyHandler>,
    ) -> Result<(), TransportError> {
        let peer = self
            .peer()
            .ok_or_else(|| TransportError::SendRejected("counterpart endpoint gone".into()))?;
        peer.callbacks_tx
            .send(RawSessionCallback::MessageReceived {
                message: payload,
                reply,
            })
            .map_err(|_| TransportError::SendRejected("counterpart stopped receiving".into()))
    }

    async fn set_application_context(&self, payload: Payload) -> Result<(), TransportError> {
        self.context_tx
            .send(Some(payload))
            .map_err(|_| TransportError::ContextRejected("counterpart endpoint gone".into()))
    }

    async fn transfer_file(&self, handle: &TransferHandle) -> Result<(), TransportError> {
        let tx = self.callbacks_tx.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            let exists = tokio::fs::try_exists(&handle.uri).await.unwrap_or(false);
            let error = if exists {
                None
            } else {
                Some(EventError::new(
                    "transfer_failed",
                    format!("no such file: {}", handle.uri),
                ))
            };
            let _ = tx.send(RawSessionCallback::TransferFinished {
                transfer_id: handle.id,
                error,
                user_info: handle.metadata,
            });
        });
        Ok(())
    }

    fn take_callbacks(&self) -> Option<CallbackReceiver> {
        self.callbacks_rx.lock().unwrap().take()
    }
}
