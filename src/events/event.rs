//! # Events observed by script code.
//!
//! - [`MessageEvent`] is what a [`BroadcastChannel`](crate::BroadcastChannel)
//!   delivers: the value, deserialized in the receiving context, plus metadata.
//! - [`ShutdownEvent`] is what shutdown listeners receive right before the halt
//!   primitive runs.
//!
//! ## Ordering guarantees
//! Each event carries a globally unique sequence number (`seq`) that increases
//! monotonically across the process. A message event's `seq` is taken when the
//! message is *posted*, so two messages from the same sender compare in send
//! order on every receiver.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::exit::{ExitCode, ExitReason};
use crate::value::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Next global sequence number.
pub(crate) fn next_seq() -> u64 {
    EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Identifier of an isolated execution context within a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u64);

impl ContextId {
    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A broadcast delivery.
///
/// Sets:
/// - `data`: the posted value, deserialized by the receiving context
/// - `channel`: channel name it arrived on
/// - `origin`: context of the posting instance
/// - `seq`: global sequence taken at post time
/// - `at`: wall-clock timestamp of the post
#[derive(Clone, Debug)]
pub struct MessageEvent {
    /// Deserialized message.
    pub data: Value,
    /// Channel name.
    pub channel: Arc<str>,
    /// Context the message was posted from.
    pub origin: ContextId,
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp of the post.
    pub at: SystemTime,
}

/// Shutdown notification dispatched by the termination sequencer.
///
/// Sets:
/// - `name`: configured event name (`"unload"` by default)
/// - `code`: validated exit code about to be passed to the halt primitive
/// - `reason`: caller's opaque annotation, if any
/// - `context`: context that is shutting down
/// - `seq`, `at`: ordering and timestamp
#[derive(Clone)]
pub struct ShutdownEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event name listeners registered for.
    pub name: Arc<str>,
    /// Requested exit code.
    pub code: ExitCode,
    /// Optional pass-through annotation.
    pub reason: Option<ExitReason>,
    /// Context being shut down.
    pub context: ContextId,
}

impl ShutdownEvent {
    /// Creates a new shutdown event with current timestamp and next sequence number.
    pub fn new(name: impl Into<Arc<str>>, context: ContextId, code: ExitCode) -> Self {
        Self {
            seq: next_seq(),
            at: SystemTime::now(),
            name: name.into(),
            code,
            reason: None,
            context,
        }
    }

    /// Attaches the caller's reason.
    #[inline]
    pub fn with_reason(mut self, reason: Option<ExitReason>) -> Self {
        self.reason = reason;
        self
    }
}

impl fmt::Debug for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownEvent")
            .field("seq", &self.seq)
            .field("name", &self.name)
            .field("code", &self.code)
            .field("has_reason", &self.reason.is_some())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = ShutdownEvent::new("unload", ContextId(1), ExitCode::SUCCESS);
        let b = ShutdownEvent::new("unload", ContextId(1), ExitCode::SUCCESS);
        assert!(b.seq > a.seq);
        assert!(a.reason.is_none());
    }

    #[test]
    fn context_id_display() {
        assert_eq!(ContextId(7).to_string(), "ctx-7");
    }
}
