//! # LogListener: shutdown event writer
//!
//! A minimal listener that writes the shutdown event through `tracing`.
//! Use it for tests, demos, or as a template for your own listener.
//!
//! ## Example output
//! ```text
//! INFO sandbox_globals::listeners::log: [unload] context=ctx-0 code=42 reason=Some(ExitReason("string"))
//! ```

use tracing::info;

use crate::events::ShutdownEvent;
use crate::listeners::{ListenerError, ShutdownListener};

/// Shutdown event writer.
#[derive(Default)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownListener for LogListener {
    fn on_shutdown(&self, e: &ShutdownEvent) -> Result<(), ListenerError> {
        info!(
            "[{}] context={} code={} reason={:?}",
            e.name, e.context, e.code, e.reason
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LogListener"
    }
}
