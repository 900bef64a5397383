//! # Fault-isolated shutdown dispatch.
//!
//! Provides [`ListenerSet`]: the registry of shutdown listeners of one context
//! and the best-effort dispatch loop the termination sequencer runs before
//! halting.
//!
//! ## Architecture
//! ```text
//! dispatch(event)
//!     │  snapshot of registered listeners (lock released)
//!     │
//!     ├──► [boundary] ──► listener1.on_shutdown() ── Err  → warn, continue
//!     ├──► [boundary] ──► listener2.on_shutdown() ── panic → warn, continue
//!     └──► [boundary] ──► listenerN.on_shutdown() ── Ok
//!                                                           │
//!                                                           ▼
//!                                                     DispatchReport
//! ```
//!
//! ## Rules
//! - **Registration order**: listeners run in the order they were added.
//! - **Isolation**: every call runs inside its own `catch_unwind` boundary; an
//!   error or panic never stops the loop.
//! - **Snapshot**: listeners added or removed during dispatch take effect for
//!   the next dispatch only.
//! - **Halt passes through**: a listener that itself requests exit halts the
//!   context; that unwind is re-raised, not swallowed.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a listener panics while holding a lock.

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::events::ShutdownEvent;
use crate::exit::halt_code;
use crate::listeners::ShutdownListener;

/// Handle returned by [`ListenerSet::add`], used to remove the listener again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Outcome counters of one dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`.
    pub succeeded: usize,
    /// Listeners that returned `Err`.
    pub failed: usize,
    /// Listeners that panicked.
    pub panicked: usize,
}

impl DispatchReport {
    /// Total number of listeners invoked.
    pub fn invoked(&self) -> usize {
        self.succeeded + self.failed + self.panicked
    }
}

struct Entry {
    id: ListenerId,
    listener: Arc<dyn ShutdownListener>,
}

/// Ordered, thread-safe set of shutdown listeners.
#[derive(Default)]
pub struct ListenerSet {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener; it runs after every listener added before it.
    pub fn add(&self, listener: Arc<dyn ShutdownListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(listener = listener.name(), "shutdown listener added");
        self.entries.write().push(Entry { id, listener });
        id
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Runs every registered listener once, isolating failures.
    ///
    /// Never fails. The only way out other than returning is a halt requested
    /// by a listener, which propagates.
    pub fn dispatch(&self, event: &ShutdownEvent) -> DispatchReport {
        let snapshot: Vec<Arc<dyn ShutdownListener>> = self
            .entries
            .read()
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();

        let mut report = DispatchReport::default();
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_shutdown(event))) {
                Ok(Ok(())) => report.succeeded += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(
                        listener = listener.name(),
                        event = %event.name,
                        error = %err,
                        "shutdown listener failed; continuing"
                    );
                }
                Err(payload) => {
                    if halt_code(payload.as_ref()).is_some() {
                        resume_unwind(payload);
                    }
                    report.panicked += 1;
                    warn!(
                        listener = listener.name(),
                        event = %event.name,
                        panic = %panic_message(payload.as_ref()),
                        "shutdown listener panicked; continuing"
                    );
                }
            }
        }
        report
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
