//! Transport implementations bundled with the relay.
//!
//! Real deployments bind the session to a platform transport; the
//! loopback pair exists for tests and single-process setups.

#[cfg(feature = "loopback")]
pub mod loopback;

#[cfg(feature = "loopback")]
pub use loopback::{LoopbackConfig, LoopbackTransport};
