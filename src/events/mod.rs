//! Events delivered to script code.
//!
//! ## Contents
//! - [`MessageEvent`] broadcast delivery, produced by channel consumer tasks
//! - [`ShutdownEvent`] shutdown notification, produced by the termination sequencer
//! - [`ContextId`] identity of the context an event belongs to

mod event;

pub(crate) use event::next_seq;
pub use event::{ContextId, MessageEvent, ShutdownEvent};
