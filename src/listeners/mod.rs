//! # Shutdown listeners.
//!
//! This module provides the [`ShutdownListener`] trait, the closure adapter
//! [`ListenerFn`] and the per-context [`ListenerSet`] the termination sequencer
//! dispatches through.
//!
//! ## Architecture
//! ```text
//! Context::exit(code, reason)
//!     └──► Termination ── ShutdownEvent ──► ListenerSet::dispatch
//!                                               │
//!                                               ├──► listener.on_shutdown(&ShutdownEvent)
//!                                               │         │
//!                                               │    ┌────┴────┬──────────┐
//!                                               │    ▼         ▼          ▼
//!                                               │  LogListener  flush   custom ...
//!                                               │
//!                                               └──► DispatchReport ──► Halt::halt(code)
//! ```

mod listener;
#[cfg(feature = "logging")]
mod log;
mod set;

pub use listener::{ListenerError, ListenerFn, ShutdownListener};
#[cfg(feature = "logging")]
pub use log::LogListener;
pub(crate) use set::panic_message;
pub use set::{DispatchReport, ListenerId, ListenerSet};
