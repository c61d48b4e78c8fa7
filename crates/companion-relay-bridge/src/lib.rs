//! Host runtime bridge for the companion relay.
//!
//! Provides:
//! - Wire protocol (JSON, tagged enums)
//! - `BridgeModule` - request handling and event forwarding per client
//! - WebSocket serving (feature: websocket)

pub mod module;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use module::{BridgeError, BridgeModule};
pub use protocol::{BridgeRequest, BridgeResponse};
