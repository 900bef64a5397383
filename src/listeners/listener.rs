//! # Shutdown listener trait
//!
//! [`ShutdownListener`] is the extension point for code that wants one last,
//! synchronous look at the context before it halts (flush buffers, write a
//! final log line). It is the counterpart of an `unload` event handler.
//!
//! ## Contract
//! - Called synchronously on the thread requesting the exit; nothing awaits it.
//! - Returning `Err` or panicking is logged and otherwise ignored: the halt
//!   happens regardless.
//! - Async work started from a listener is preempted by the halt.
//!
//! ## Example
//! ```rust
//! use sandbox_globals::{ListenerFn, ShutdownEvent, ShutdownListener};
//!
//! let l = ListenerFn::arc("flush", |ev: &ShutdownEvent| {
//!     println!("exiting with {}", ev.code);
//!     Ok(())
//! });
//! assert_eq!(l.name(), "flush");
//! ```

use std::borrow::Cow;

use crate::events::ShutdownEvent;

/// Error a listener may report; it is logged and discarded.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Contract for shutdown listeners.
pub trait ShutdownListener: Send + Sync + 'static {
    /// Observe the shutdown event.
    ///
    /// # Parameters
    /// - `event`: Reference to the event (does not transfer ownership)
    fn on_shutdown(&self, event: &ShutdownEvent) -> Result<(), ListenerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed listener.
#[derive(Debug)]
pub struct ListenerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ListenerFn<F>
where
    F: Fn(&ShutdownEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    /// Creates a new closure-backed listener.
    ///
    /// Prefer [`ListenerFn::arc`] when you immediately register it.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new(name, f))
    }
}

impl<F> ShutdownListener for ListenerFn<F>
where
    F: Fn(&ShutdownEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn on_shutdown(&self, event: &ShutdownEvent) -> Result<(), ListenerError> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
