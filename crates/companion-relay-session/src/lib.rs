//! Session-event relay and command dispatch for companion connectivity.
//!
//! Provides:
//! - `CompanionSession` - Single per-process handle over the pairing transport
//! - `ListenerRegistry` - Named event subscriptions with snapshot delivery
//! - `normalize` - Raw transport callbacks to the closed event taxonomy
//! - Loopback transport (feature: loopback) for tests and in-process pairs

pub mod dispatcher;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod transport;

pub use normalize::normalize;
pub use registry::{EventHandler, ListenerRegistry, SubscriptionId};
pub use session::CompanionSession;
