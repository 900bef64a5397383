//! # Halt primitives.
//!
//! A [`Halt`] implementation is the host's "terminate now" operation. It is
//! **divergent by contract**: once invoked for a scope, no further code of that
//! scope may run, and the call must not return. The trait method still returns
//! `()` because the host is an external collaborator; the sequencer turns an
//! unexpected return into [`ExitError::UnreachableHaltReturn`](crate::ExitError).
//!
//! ## Provided primitives
//! - [`UnwindHalt`] (default): cancels every async job of the context and
//!   unwinds the script stack up to [`Context::run`](crate::Context::run),
//!   which reports [`Error::ScriptExit`](crate::Error::ScriptExit). The host
//!   process keeps running.
//! - [`ProcessHalt`]: terminates the whole process with the code.

use std::any::Any;
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::events::ContextId;
use crate::exit::ExitCode;

/// Host-supplied immediate-halt primitive.
pub trait Halt: Send + Sync + 'static {
    /// Terminates `scope` with `code`. Must never return.
    fn halt(&self, code: ExitCode, scope: &ExecutionScope);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// What a halt primitive terminates: one context and all of its async work.
#[derive(Clone)]
pub struct ExecutionScope {
    context: ContextId,
    token: CancellationToken,
}

impl ExecutionScope {
    pub(crate) fn new(context: ContextId, token: CancellationToken) -> Self {
        Self { context, token }
    }

    /// Context this scope belongs to.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Preempts every queued or in-flight async job of the scope.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` once the scope was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("context", &self.context)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Unwind payload carried from the halt point to the context boundary.
struct HaltSignal(ExitCode);

/// Extracts the exit code if `payload` is a halt unwind.
pub(crate) fn halt_code(payload: &(dyn Any + Send)) -> Option<ExitCode> {
    payload.downcast_ref::<HaltSignal>().map(|s| s.0)
}

/// Cancels the context and unwinds to the nearest [`Context::run`](crate::Context::run).
///
/// Uses [`std::panic::resume_unwind`], so the process panic hook is not invoked.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnwindHalt;

impl Halt for UnwindHalt {
    fn halt(&self, code: ExitCode, scope: &ExecutionScope) {
        scope.cancel();
        std::panic::resume_unwind(Box::new(HaltSignal(code)));
    }

    fn name(&self) -> &'static str {
        "unwind"
    }
}

/// Terminates the whole process via [`std::process::exit`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessHalt;

impl Halt for ProcessHalt {
    fn halt(&self, code: ExitCode, scope: &ExecutionScope) {
        scope.cancel();
        std::process::exit(code.get());
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
