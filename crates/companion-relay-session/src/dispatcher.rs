//! Command surface of the session handle.
//!
//! Every command follows the same contract: precondition failures reject
//! before any transport round trip, and a successful result means
//! "accepted for delivery", never "delivered". Asynchronous outcomes
//! (replies, transfer completion) arrive exclusively through events and
//! are never retro-fitted onto an already resolved result.
//!
//! Commands may be issued concurrently from multiple call sites; the
//! dispatcher does not serialize them. No cancellation and no relay-side
//! timeouts exist: an accepted message cannot be recalled, and a
//! reachable-but-unresponsive counterpart simply never produces a reply.

use companion_relay_core::{
    ActivationState, Payload, RelayError, TransferHandle, TransportError,
};
use tokio::sync::oneshot;

use crate::session::CompanionSession;

impl CompanionSession {
    /// Request session activation. Idempotent.
    ///
    /// A no-op when the platform is unsupported (the session stays
    /// unusable for commands but never errors here) or when activation is
    /// already underway or complete — repeated calls produce no duplicate
    /// `activationDidComplete` event. Activation failures arrive via that
    /// event, never synchronously.
    pub async fn activate(&self) {
        if !self.transport.is_supported() {
            tracing::warn!("companion connectivity unsupported; activation skipped");
            return;
        }

        {
            let mut state = self.state.write().unwrap();
            match state.activation_state {
                ActivationState::Activated | ActivationState::Activating => {
                    tracing::debug!(state = ?state.activation_state, "activation already requested");
                    return;
                }
                ActivationState::NotActivated => {
                    state.activation_state = ActivationState::Activating;
                }
            }
        }

        self.transport.request_activation().await;
    }

    /// Send a message to the counterpart immediately, fire-and-forget.
    ///
    /// # Errors
    /// `Unsupported` / `NotActivated` / `NotReachable` on precondition
    /// failure (the transport's send primitive is never invoked), or a
    /// transport error on synchronous rejection.
    pub async fn send_message(&self, payload: Payload) -> Result<(), RelayError> {
        self.ensure_reachable()?;
        self.transport.send_message(payload, None).await?;
        Ok(())
    }

    /// Send a message and obtain a receiver for the counterpart's reply.
    ///
    /// The returned `Ok` only acknowledges acceptance; the reply arrives
    /// on the receiver whenever the counterpart answers. The receiver
    /// errors if the counterpart never replies and the transport drops
    /// the reply channel.
    ///
    /// # Errors
    /// Same preconditions as [`Self::send_message`].
    pub async fn send_message_with_reply(
        &self,
        payload: Payload,
    ) -> Result<oneshot::Receiver<Payload>, RelayError> {
        self.ensure_reachable()?;
        let (handler, reply_rx) = companion_relay_core::ReplyHandler::new();
        self.transport.send_message(payload, Some(handler)).await?;
        Ok(reply_rx)
    }

    /// Replace the shared application context wholesale.
    ///
    /// Ok means the transport accepted the snapshot for eventual,
    /// latest-wins delivery: the counterpart ends up observing the newest
    /// accepted context, and intermediate snapshots may be coalesced away.
    ///
    /// # Errors
    /// `Unsupported` / `NotActivated` on precondition failure,
    /// `ContextUpdateFailed` when the transport rejects the payload
    /// synchronously.
    pub async fn update_application_context(&self, payload: Payload) -> Result<(), RelayError> {
        self.ensure_activated()?;
        self.transport
            .set_application_context(payload)
            .await
            .map_err(|e| match e {
                TransportError::ContextRejected(msg) => RelayError::ContextUpdateFailed(msg),
                other => RelayError::Transport(other),
            })
    }

    /// Queue a payload transfer.
    ///
    /// Returns the transfer handle on acceptance; completion is reported
    /// only via a `transferDidFinish` event carrying the handle's id.
    ///
    /// # Errors
    /// `Unsupported` / `NotActivated` on precondition failure, or a
    /// transport error when the transfer cannot be enqueued.
    pub async fn transfer_file(
        &self,
        uri: impl Into<String>,
        metadata: Payload,
    ) -> Result<TransferHandle, RelayError> {
        self.ensure_activated()?;
        let handle = TransferHandle::new(uri, metadata);
        self.transport.transfer_file(&handle).await?;
        Ok(handle)
    }

    fn ensure_activated(&self) -> Result<(), RelayError> {
        if !self.transport.is_supported() {
            return Err(RelayError::Unsupported);
        }
        if self.activation_state() != ActivationState::Activated {
            return Err(RelayError::NotActivated);
        }
        Ok(())
    }

    fn ensure_reachable(&self) -> Result<(), RelayError> {
        self.ensure_activated()?;
        if !self.is_reachable() {
            return Err(RelayError::NotReachable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use companion_relay_core::{
        ActivationState, Payload, RawSessionCallback, RelayError, ReplyHandler, SessionEvent,
        SessionTransport, TransferHandle, TransportError, event,
        transport::{CallbackReceiver, CallbackSender, callback_channel},
    };
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::session::CompanionSession;

    /// Transport double that records calls and answers from fixed flags.
    struct ScriptedTransport {
        supported: bool,
        reachable: AtomicBool,
        reject_context: bool,
        callbacks_tx: CallbackSender,
        callbacks_rx: Mutex<Option<CallbackReceiver>>,
        sent: Mutex<Vec<Payload>>,
        activation_requests: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(supported: bool) -> Arc<Self> {
            let (tx, rx) = callback_channel();
            Arc::new(Self {
                supported,
                reachable: AtomicBool::new(false),
                reject_context: false,
                callbacks_tx: tx,
                callbacks_rx: Mutex::new(Some(rx)),
                sent: Mutex::new(Vec::new()),
                activation_requests: AtomicUsize::new(0),
            })
        }

        fn rejecting_context() -> Arc<Self> {
            let (tx, rx) = callback_channel();
            Arc::new(Self {
                supported: true,
                reachable: AtomicBool::new(true),
                reject_context: true,
                callbacks_tx: tx,
                callbacks_rx: Mutex::new(Some(rx)),
                sent: Mutex::new(Vec::new()),
                activation_requests: AtomicUsize::new(0),
            })
        }

        fn push(&self, raw: RawSessionCallback) {
            self.callbacks_tx.send(raw).unwrap();
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SessionTransport for ScriptedTransport {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn is_paired(&self) -> bool {
            self.supported
        }

        fn is_companion_app_installed(&self) -> bool {
            self.supported
        }

        fn is_reachable(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }

        async fn request_activation(&self) {
            self.activation_requests.fetch_add(1, Ordering::SeqCst);
            self.push(RawSessionCallback::ActivationCompleted {
                state: ActivationState::Activated,
                error: None,
            });
        }

        async fn send_message(
            &self,
            payload: Payload,
            _reply: Option<ReplyHandler>,
        ) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }

        async fn set_application_context(&self, _payload: Payload) -> Result<(), TransportError> {
            if self.reject_context {
                return Err(TransportError::ContextRejected(
                    "payload not serializable".into(),
                ));
            }
            Ok(())
        }

        async fn transfer_file(&self, _handle: &TransferHandle) -> Result<(), TransportError> {
            Ok(())
        }

        fn take_callbacks(&self) -> Option<CallbackReceiver> {
            self.callbacks_rx.lock().unwrap().take()
        }
    }

    /// Forward events of one name into an awaitable channel.
    fn watch_events(
        session: &CompanionSession,
        name: &str,
    ) -> mpsc::UnboundedReceiver<&'static str> {
        let (tx, rx) = mpsc::unbounded_channel();
        session.subscribe(name, move |ev: &SessionEvent| {
            let _ = tx.send(ev.name());
        });
        rx
    }

    fn payload(value: serde_json::Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn second_bind_on_same_transport_fails() {
        let transport = ScriptedTransport::new(true);
        let _session = CompanionSession::bind(transport.clone()).unwrap();
        assert!(matches!(
            CompanionSession::bind(transport),
            Err(RelayError::SessionAlreadyBound)
        ));
    }

    #[tokio::test]
    async fn send_before_activation_rejects_not_activated() {
        let transport = ScriptedTransport::new(true);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let err = session.send_message(payload(json!({"type": "ping"}))).await;
        assert!(matches!(err, Err(RelayError::NotActivated)));
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn send_while_unreachable_rejects_before_transport() {
        let transport = ScriptedTransport::new(true);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let mut activations = watch_events(&session, event::ACTIVATION_DID_COMPLETE);
        session.activate().await;
        activations.recv().await.unwrap();

        // Activated but the counterpart is not reachable.
        let err = session.send_message(payload(json!({"type": "ping"}))).await;
        assert!(matches!(err, Err(RelayError::NotReachable)));
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn send_when_reachable_is_accepted() {
        let transport = ScriptedTransport::new(true);
        transport.reachable.store(true, Ordering::SeqCst);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let mut activations = watch_events(&session, event::ACTIVATION_DID_COMPLETE);
        session.activate().await;
        activations.recv().await.unwrap();

        session
            .send_message(payload(json!({"type": "ping"})))
            .await
            .unwrap();
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn activate_is_idempotent_without_duplicate_events() {
        let transport = ScriptedTransport::new(true);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let mut events = watch_events(&session, event::ACTIVATION_DID_COMPLETE);
        let mut probes = watch_events(&session, event::REACHABILITY_DID_CHANGE);

        session.activate().await;
        assert_eq!(events.recv().await.unwrap(), event::ACTIVATION_DID_COMPLETE);
        assert_eq!(session.activation_state(), ActivationState::Activated);

        session.activate().await;
        assert_eq!(
            transport.activation_requests.load(Ordering::SeqCst),
            1,
            "second activate must not reach the transport"
        );

        // Ordering probe: the next delivered event is the reachability
        // change pushed after the second activate, so no duplicate
        // activation event was queued ahead of it.
        transport.push(RawSessionCallback::ReachabilityChanged { is_reachable: true });
        assert_eq!(probes.recv().await.unwrap(), event::REACHABILITY_DID_CHANGE);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsupported_platform_is_absorbing() {
        let transport = ScriptedTransport::new(false);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        // Resolves without error but leaves the session unactivated.
        session.activate().await;
        assert_eq!(session.activation_state(), ActivationState::NotActivated);
        assert_eq!(transport.activation_requests.load(Ordering::SeqCst), 0);

        let err = session.send_message(payload(json!({"type": "ping"}))).await;
        assert!(matches!(err, Err(RelayError::Unsupported)));

        let err = session.update_application_context(Payload::new()).await;
        assert!(matches!(err, Err(RelayError::Unsupported)));
    }

    #[tokio::test]
    async fn rejected_context_surfaces_context_update_failed() {
        let transport = ScriptedTransport::rejecting_context();
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let mut activations = watch_events(&session, event::ACTIVATION_DID_COMPLETE);
        session.activate().await;
        activations.recv().await.unwrap();

        let err = session
            .update_application_context(payload(json!({"unit": "kg"})))
            .await;
        match err {
            Err(RelayError::ContextUpdateFailed(msg)) => {
                assert!(msg.contains("not serializable"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transfer_requires_activation_and_returns_a_handle() {
        let transport = ScriptedTransport::new(true);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let err = session.transfer_file("/tmp/payload.bin", Payload::new()).await;
        assert!(matches!(err, Err(RelayError::NotActivated)));

        let mut activations = watch_events(&session, event::ACTIVATION_DID_COMPLETE);
        session.activate().await;
        activations.recv().await.unwrap();

        let handle = session
            .transfer_file("/tmp/payload.bin", payload(json!({"name": "payload.bin"})))
            .await
            .unwrap();
        assert_eq!(handle.uri, "/tmp/payload.bin");
        assert_eq!(handle.metadata.get("name"), Some(&json!("payload.bin")));
    }

    #[tokio::test]
    async fn every_callback_form_delivers_exactly_one_event() {
        let transport = ScriptedTransport::new(true);
        let session = CompanionSession::bind(transport.clone()).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        for name in event::EVENT_NAMES {
            let tx = tx.clone();
            session.subscribe(name, move |ev: &SessionEvent| {
                let _ = tx.send(ev.name());
            });
        }

        let (reply, _reply_rx) = ReplyHandler::new();
        transport.push(RawSessionCallback::ActivationCompleted {
            state: ActivationState::Activated,
            error: None,
        });
        transport.push(RawSessionCallback::ReachabilityChanged { is_reachable: true });
        transport.push(RawSessionCallback::MessageReceived {
            message: payload(json!({"n": 1})),
            reply: None,
        });
        transport.push(RawSessionCallback::MessageReceived {
            message: payload(json!({"n": 2})),
            reply: Some(reply),
        });
        transport.push(RawSessionCallback::ContextReceived {
            context: payload(json!({"unit": "kg"})),
        });
        transport.push(RawSessionCallback::TransferFinished {
            transfer_id: uuid::Uuid::new_v4(),
            error: None,
            user_info: Payload::new(),
        });

        let mut received = Vec::new();
        for _ in 0..6 {
            received.push(rx.recv().await.unwrap());
        }

        // One normalized event per raw callback, in callback order.
        assert_eq!(
            received,
            vec![
                event::ACTIVATION_DID_COMPLETE,
                event::REACHABILITY_DID_CHANGE,
                event::DID_RECEIVE_MESSAGE,
                event::DID_RECEIVE_MESSAGE,
                event::DID_RECEIVE_APPLICATION_CONTEXT,
                event::TRANSFER_DID_FINISH,
            ]
        );
        assert!(rx.try_recv().is_err());
    }
}
