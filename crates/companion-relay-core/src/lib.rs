//! Core abstractions for the companion-device session relay.
//!
//! This crate provides the fundamental building blocks:
//! - `Payload` - Ordered JSON-object payloads exchanged with the counterpart
//! - `SessionEvent` - Closed taxonomy of normalized session events
//! - `RelayError` - Error taxonomy for relay commands
//! - `SessionTransport` - Trait boundary to the underlying pairing transport

pub mod error;
pub mod event;
pub mod payload;
pub mod transport;

pub use error::{RelayError, TransportError};
pub use event::{
    ActivationState, EventError, ReplyHandler, SessionEvent, TransferHandle, TransferId,
};
pub use payload::Payload;
pub use transport::{CallbackReceiver, CallbackSender, RawSessionCallback, SessionTransport};
