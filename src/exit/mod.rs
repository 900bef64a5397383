//! Controlled, irrevocable termination of a context.
//!
//! ## Contents
//! - [`ExitCode`], [`ExitReason`] validated code and opaque annotation
//! - [`Halt`] host primitive, with [`UnwindHalt`] and [`ProcessHalt`]
//! - [`Termination`] the `Running → ShuttingDown → Halted` sequencer

mod code;
mod halt;
mod sequencer;

pub use code::{ExitCode, ExitReason};
pub(crate) use halt::halt_code;
pub use halt::{ExecutionScope, Halt, ProcessHalt, UnwindHalt};
pub use sequencer::{ExitRequest, ExitState, Termination};
