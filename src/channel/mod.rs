//! # Cross-context broadcast messaging.
//!
//! [`BroadcastHub`] is owned by the host and shared by every context;
//! [`BroadcastChannel`] is what script code gets from
//! [`Context::broadcast_channel`](crate::Context::broadcast_channel).
//!
//! Only bytes cross the hub. Each receiver rebuilds the value with its own
//! context's [`SerializationBridge`](crate::SerializationBridge), so no two
//! contexts ever share a value.

mod channel;
mod hub;

pub use channel::BroadcastChannel;
pub use hub::BroadcastHub;
