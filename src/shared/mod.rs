//! Shared state and messaging between the engine actor and its hosts
//!
//! Hosts talk to the actor through [`EngineMessage`]s and read its state
//! through the [`TrackingSnapshot`] it publishes after every message.

pub mod messages;
pub mod state;

pub use messages::EngineMessage;
pub use state::{SharedSnapshot, TrackingSnapshot};
