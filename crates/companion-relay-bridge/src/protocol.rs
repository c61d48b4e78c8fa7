//! Wire protocol between the host runtime and the relay.

use companion_relay_core::{ActivationState, Payload, SessionEvent, TransferId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Request from the host runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRequest {
    /// Request session activation.
    Activate,
    /// Query the session's capability flags and activation state.
    GetCapabilities,
    /// Send an immediate message to the counterpart. Acceptance only;
    /// callers needing reply correlation embed a correlation id in the
    /// payload and watch `didReceiveMessage`.
    SendMessage { payload: Payload },
    /// Replace the shared application context wholesale.
    UpdateApplicationContext { payload: Payload },
    /// Queue a payload transfer.
    TransferFile {
        uri: String,
        #[serde(default)]
        metadata: Payload,
    },
    /// Subscribe to a named event.
    AddListener { event: String },
    /// Drop every subscription this client holds for an event name.
    RemoveListeners { event: String },
    /// Answer a received message that carried a `replyId`.
    Reply { reply_id: Uuid, payload: Payload },
    /// Keepalive.
    Ping,
}

/// Response or pushed frame to the host runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeResponse {
    /// Request accepted.
    Ack,
    /// Capability snapshot.
    Capabilities {
        supported: bool,
        paired: bool,
        app_installed: bool,
        reachable: bool,
        activation_state: ActivationState,
    },
    /// Transfer accepted for queuing.
    TransferQueued { transfer_id: TransferId },
    /// Subscription created.
    Subscribed { subscription_id: Uuid },
    /// Server-pushed session event. `event` is one of the closed set of
    /// wire event names; `payload` follows the documented field layout.
    Event { event: String, payload: Value },
    /// Request failed. `code` is a stable snake_case error code.
    Error { code: String, message: String },
    /// Keepalive answer.
    Pong,
}

/// Serialize a session event to its wire payload.
///
/// Field names are part of the wire contract. An `error` field appears
/// only when the event carries one; a `replyId` only when the message
/// expects a reply and the bridge retained its handler.
#[must_use]
pub fn event_payload(event: &SessionEvent, reply_id: Option<Uuid>) -> Value {
    let mut fields = Map::new();
    match event {
        SessionEvent::ActivationDidComplete { state, error } => {
            fields.insert("state".into(), Value::String(state.as_str().into()));
            if let Some(error) = error {
                fields.insert("error".into(), error_value(error));
            }
        }
        SessionEvent::ReachabilityDidChange { is_reachable } => {
            fields.insert("isReachable".into(), Value::Bool(*is_reachable));
        }
        SessionEvent::DidReceiveMessage { message, .. } => {
            fields.insert("message".into(), message.clone().into_value());
            if let Some(reply_id) = reply_id {
                fields.insert("replyId".into(), Value::String(reply_id.to_string()));
            }
        }
        SessionEvent::DidReceiveApplicationContext {
            application_context,
        } => {
            fields.insert(
                "applicationContext".into(),
                application_context.clone().into_value(),
            );
        }
        SessionEvent::TransferDidFinish {
            transfer_id,
            success,
            error,
            user_info,
        } => {
            fields.insert("transferId".into(), Value::String(transfer_id.to_string()));
            fields.insert("success".into(), Value::Bool(*success));
            if let Some(error) = error {
                fields.insert("error".into(), error_value(error));
            }
            fields.insert("userInfo".into(), user_info.clone().into_value());
        }
    }
    Value::Object(fields)
}

fn error_value(error: &companion_relay_core::EventError) -> Value {
    let mut fields = Map::new();
    fields.insert("code".into(), Value::String(error.code.clone()));
    fields.insert("message".into(), Value::String(error.message.clone()));
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use companion_relay_core::{EventError, ReplyHandler};
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serialization_is_stable() {
        let req = BridgeRequest::SendMessage {
            payload: Payload::from_value(json!({"type": "ping"})).unwrap(),
        };
        let text = serde_json::to_string(&req).unwrap();
        assert!(text.contains(r#""type":"send_message""#));

        let parsed: BridgeRequest = serde_json::from_str(&text).unwrap();
        match parsed {
            BridgeRequest::SendMessage { payload } => {
                assert_eq!(payload.get("type"), Some(&json!("ping")));
            }
            other => panic!("wrong request type: {other:?}"),
        }
    }

    #[test]
    fn transfer_metadata_defaults_to_empty() {
        let parsed: BridgeRequest =
            serde_json::from_str(r#"{"type": "transfer_file", "uri": "/tmp/x"}"#).unwrap();
        match parsed {
            BridgeRequest::TransferFile { uri, metadata } => {
                assert_eq!(uri, "/tmp/x");
                assert!(metadata.is_empty());
            }
            other => panic!("wrong request type: {other:?}"),
        }
    }

    #[test]
    fn activation_payload_omits_absent_error() {
        let payload = event_payload(
            &SessionEvent::ActivationDidComplete {
                state: ActivationState::Activated,
                error: None,
            },
            None,
        );
        assert_eq!(payload, json!({"state": "activated"}));

        let payload = event_payload(
            &SessionEvent::ActivationDidComplete {
                state: ActivationState::Activated,
                error: Some(EventError::new("send_failed", "radio off")),
            },
            None,
        );
        assert_eq!(
            payload,
            json!({
                "state": "activated",
                "error": {"code": "send_failed", "message": "radio off"},
            })
        );
    }

    #[test]
    fn reachability_payload_uses_wire_field_name() {
        let payload = event_payload(
            &SessionEvent::ReachabilityDidChange { is_reachable: true },
            None,
        );
        assert_eq!(payload, json!({"isReachable": true}));
    }

    #[test]
    fn message_payload_carries_reply_id_only_when_given() {
        let (handler, _rx) = ReplyHandler::new();
        let event = SessionEvent::DidReceiveMessage {
            message: Payload::from_value(json!({"number": 42})).unwrap(),
            reply_handler: Some(handler),
        };

        let reply_id = Uuid::new_v4();
        let payload = event_payload(&event, Some(reply_id));
        assert_eq!(payload["message"], json!({"number": 42}));
        assert_eq!(payload["replyId"], json!(reply_id.to_string()));

        let payload = event_payload(&event, None);
        assert!(payload.get("replyId").is_none());
    }

    #[test]
    fn transfer_payload_has_full_field_set() {
        let transfer_id = Uuid::new_v4();
        let payload = event_payload(
            &SessionEvent::TransferDidFinish {
                transfer_id,
                success: false,
                error: Some(EventError::new("transfer_failed", "file missing")),
                user_info: Payload::from_value(json!({"name": "workout.json"})).unwrap(),
            },
            None,
        );
        assert_eq!(
            payload,
            json!({
                "transferId": transfer_id.to_string(),
                "success": false,
                "error": {"code": "transfer_failed", "message": "file missing"},
                "userInfo": {"name": "workout.json"},
            })
        );
    }
}
