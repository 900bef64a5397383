//! # sandbox-globals
//!
//! **sandbox-globals** provides the runtime globals an embedded, sandboxed
//! script environment exposes to its scripts:
//!
//! - a structured-clone **serialization bridge** (`serialize` / `deserialize`),
//! - a cross-context **broadcast channel** built on that bridge,
//! - a **termination sequencer** (`exit(code, reason)`) that notifies shutdown
//!   listeners before invoking the host's halt primitive.
//!
//! Nothing is global: each isolated script environment is a [`Context`]
//! created by a [`Host`], and every operation is a method on it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Host                                                             │
//! │  - Config                                                         │
//! │  - StructuredClone engine (WireClone by default)                  │
//! │  - Halt primitive (UnwindHalt by default)                         │
//! │  - BroadcastHub (one member list per channel name)                │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Context #0  │   │  Context #1  │   │  Context #2  │
//!     │  bridge      │   │  bridge      │   │  bridge      │
//!     │  listeners   │   │  listeners   │   │  listeners   │
//!     │  termination │   │  termination │   │  termination │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ post(bytes)      │                  │
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │          BroadcastHub group "name" (one queue per member)         │
//! │                   publish skips the posting member                │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!    consumer #0        consumer #1        consumer #2
//!  (skips own posts)  deserialize with   deserialize with
//!                     context #1 bridge  context #2 bridge
//!                            ▼                  ▼
//!                         inbox #1           inbox #2
//! ```
//!
//! ### Termination
//! ```text
//! ctx.exit(code, reason)
//!   ├─► validate code (integer, 0..=i32::MAX) ── invalid ─► Err(InvalidExitCode)
//!   ├─► Running ─► ShuttingDown
//!   ├─► ListenerSet::dispatch(ShutdownEvent)   (each listener isolated)
//!   ├─► record ExitRequest, ShuttingDown ─► Halted
//!   └─► Halt::halt(code)                       (never returns)
//!          └─ UnwindHalt: cancel context token ─► Context::run returns ScriptExit{code, reason}
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Values**        | Structured-clone value model.                                | [`Value`], [`Properties`]                  |
//! | **Cloning**       | Pluggable structured-clone engine.                           | [`StructuredClone`], [`WireClone`]         |
//! | **Bridge**        | Value ⇄ byte sequence conversion.                            | [`SerializationBridge`], [`ByteSequence`]  |
//! | **Broadcast**     | Named pub/sub across contexts.                               | [`BroadcastChannel`], [`BroadcastHub`]     |
//! | **Termination**   | Validated exit with shutdown notification.                   | [`Termination`], [`Halt`], [`ExitCode`]    |
//! | **Listeners**     | Best-effort shutdown hooks.                                  | [`ShutdownListener`], [`ListenerFn`]       |
//! | **Errors**        | Typed errors for every operation.                            | [`CloneError`], [`ChannelError`], [`ExitError`], [`Error`] |
//! | **Configuration** | Host settings.                                               | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogListener`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use sandbox_globals::{Config, ExitReason, Host, ListenerFn, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let host = Host::new(Config::default());
//!     let ctx = host.context();
//!
//!     ctx.on_shutdown(ListenerFn::arc("flush", |ev| {
//!         println!("{} with code {}", ev.name, ev.code);
//!         Ok(())
//!     }));
//!
//!     let err = ctx
//!         .run(|c| {
//!             let bytes = c.serialize(&Value::from("state"))?;
//!             assert_eq!(c.deserialize(&bytes)?, Value::from("state"));
//!             c.exit(42, Some(ExitReason::new("done")))?;
//!             Ok(())
//!         })
//!         .unwrap_err();
//!
//!     let (code, reason) = err.as_script_exit().unwrap();
//!     assert_eq!(code, 42);
//!     assert_eq!(reason.map(ExitReason::value), Some(&Value::from("done")));
//!     assert!(ctx.is_halted());
//! }
//! ```
mod bridge;
mod channel;
mod clone;
mod core;
mod error;
mod events;
mod exit;
mod listeners;
mod value;

// ---- Public re-exports ----

pub use crate::core::{Config, Context, Host, HostBuilder, WeakContext};
pub use bridge::{ByteSequence, SerializationBridge};
pub use channel::{BroadcastChannel, BroadcastHub};
pub use clone::{StructuredClone, WireClone};
pub use error::{ChannelError, CloneError, Error, ExitError};
pub use events::{ContextId, MessageEvent, ShutdownEvent};
pub use exit::{
    ExecutionScope, ExitCode, ExitReason, ExitRequest, ExitState, Halt, ProcessHalt, Termination,
    UnwindHalt,
};
pub use listeners::{
    DispatchReport, ListenerError, ListenerFn, ListenerId, ListenerSet, ShutdownListener,
};
pub use value::{Properties, Value};

// Optional: expose a simple built-in shutdown logger (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogListener;
