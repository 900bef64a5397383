//! # Termination sequencer.
//!
//! [`Termination`] runs the exit sequence of one context:
//!
//! ```text
//! request_exit(code, reason)
//!   ├─► validate code ── invalid ─► Err(InvalidExitCode)        (state stays Running)
//!   ├─► Running ─► ShuttingDown
//!   ├─► ListenerSet::dispatch(ShutdownEvent{code, reason})    (errors/panics swallowed)
//!   ├─► record ExitRequest, ShuttingDown ─► Halted
//!   ├─► Halt::halt(code)                                       (never returns)
//!   └─► returned anyway ─► error! + Err(UnreachableHaltReturn)
//! ```
//!
//! A listener that requests exit while the context is already `ShuttingDown`
//! skips the dispatch step and halts straight away with its own code.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::ExitError;
use crate::events::ShutdownEvent;
use crate::exit::{ExecutionScope, ExitCode, ExitReason, Halt};
use crate::listeners::ListenerSet;
use crate::value::Value;

/// Lifecycle of a context with respect to termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitState {
    /// Normal execution; the only initial state.
    Running = 0,
    /// Shutdown listeners are being dispatched.
    ShuttingDown = 1,
    /// The halt primitive was invoked; terminal.
    Halted = 2,
}

impl ExitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ExitState::Running,
            1 => ExitState::ShuttingDown,
            _ => ExitState::Halted,
        }
    }
}

/// Exit request recorded right before the halt primitive runs.
///
/// Readable by the embedder after termination through
/// [`Context::exit_request`](crate::Context::exit_request).
#[derive(Clone, Debug)]
pub struct ExitRequest {
    /// Requested exit code.
    pub code: ExitCode,
    /// Reason passed to `exit`, untouched.
    pub reason: Option<ExitReason>,
}

/// Per-context exit sequencer.
pub struct Termination {
    state: AtomicU8,
    request: Mutex<Option<ExitRequest>>,
    event_name: Arc<str>,
    listeners: Arc<ListenerSet>,
    halt: Arc<dyn Halt>,
    scope: ExecutionScope,
}

impl Termination {
    /// Creates a sequencer in the `Running` state.
    pub fn new(
        event_name: impl Into<Arc<str>>,
        listeners: Arc<ListenerSet>,
        halt: Arc<dyn Halt>,
        scope: ExecutionScope,
    ) -> Self {
        Self {
            state: AtomicU8::new(ExitState::Running as u8),
            request: Mutex::new(None),
            event_name: event_name.into(),
            listeners,
            halt,
            scope,
        }
    }

    /// Current state.
    pub fn state(&self) -> ExitState {
        ExitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Last recorded exit request, if the sequence reached the halt step.
    pub fn exit_request(&self) -> Option<ExitRequest> {
        self.request.lock().clone()
    }

    /// Validates a script-supplied code, then runs [`exit_with`](Self::exit_with).
    ///
    /// An invalid code returns [`ExitError::InvalidExitCode`] without touching
    /// listeners, the halt primitive or the state.
    pub fn request_exit(
        &self,
        code: &Value,
        reason: Option<ExitReason>,
    ) -> Result<Infallible, ExitError> {
        let code = ExitCode::try_from(code)?;
        self.exit_with(code, reason)
    }

    /// Runs the exit sequence for an already validated code.
    ///
    /// The `Ok` type is uninhabited: the only way this returns is the
    /// [`ExitError::UnreachableHaltReturn`] host contract violation.
    pub fn exit_with(
        &self,
        code: ExitCode,
        reason: Option<ExitReason>,
    ) -> Result<Infallible, ExitError> {
        let first = self
            .state
            .compare_exchange(
                ExitState::Running as u8,
                ExitState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if first {
            let event =
                ShutdownEvent::new(Arc::clone(&self.event_name), self.scope.context(), code)
                    .with_reason(reason.clone());
            let report = self.listeners.dispatch(&event);
            debug!(
                context = %self.scope.context(),
                code = code.get(),
                invoked = report.invoked(),
                failed = report.failed,
                panicked = report.panicked,
                "shutdown dispatched"
            );
        } else {
            debug!(
                context = %self.scope.context(),
                code = code.get(),
                state = ?self.state(),
                "exit requested during shutdown; skipping dispatch"
            );
        }

        *self.request.lock() = Some(ExitRequest { code, reason });
        self.state.store(ExitState::Halted as u8, Ordering::Release);

        self.halt.halt(code, &self.scope);

        error!(
            context = %self.scope.context(),
            code = code.get(),
            halt = self.halt.name(),
            "halt primitive returned; host embedding is broken"
        );
        Err(ExitError::UnreachableHaltReturn { code: code.get() })
    }
}

impl fmt::Debug for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Termination")
            .field("state", &self.state())
            .field("event_name", &self.event_name)
            .field("halt", &self.halt.name())
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ContextId;
    use crate::listeners::ListenerFn;
    use tokio_util::sync::CancellationToken;

    /// Halt double that records calls and (wrongly) returns.
    #[derive(Default)]
    struct ReturningHalt {
        calls: Mutex<Vec<ExitCode>>,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Halt for ReturningHalt {
        fn halt(&self, code: ExitCode, _scope: &ExecutionScope) {
            self.order.lock().push("halt");
            self.calls.lock().push(code);
        }
    }

    fn sequencer(halt: Arc<ReturningHalt>) -> (Termination, Arc<ListenerSet>) {
        let listeners = Arc::new(ListenerSet::new());
        let scope = ExecutionScope::new(ContextId(9), CancellationToken::new());
        let t = Termination::new("unload", Arc::clone(&listeners), halt, scope);
        (t, listeners)
    }

    #[test]
    fn invalid_codes_have_no_side_effects() {
        let halt = Arc::new(ReturningHalt::default());
        let (t, listeners) = sequencer(Arc::clone(&halt));
        let fired = Arc::new(Mutex::new(0usize));
        let f = Arc::clone(&fired);
        let _ = listeners.add(ListenerFn::arc("count", move |_| {
            *f.lock() += 1;
            Ok(())
        }));

        for bad in [Value::from(-1), Value::Number(1.5), Value::from("0")] {
            let err = t.request_exit(&bad, None).unwrap_err();
            assert!(matches!(err, ExitError::InvalidExitCode { .. }), "{bad:?}");
        }
        assert_eq!(*fired.lock(), 0);
        assert!(halt.calls.lock().is_empty());
        assert_eq!(t.state(), ExitState::Running);
        assert!(t.exit_request().is_none());
    }

    #[test]
    fn dispatch_happens_before_halt_and_return_is_loud() {
        for code in [0, 137] {
            let halt = Arc::new(ReturningHalt::default());
            let order = Arc::clone(&halt.order);
            let (t, listeners) = sequencer(Arc::clone(&halt));
            let o = Arc::clone(&order);
            let _ = listeners.add(ListenerFn::arc("mark", move |_| {
                o.lock().push("listener");
                Ok(())
            }));

            let err = t.request_exit(&Value::from(code), None).unwrap_err();
            assert_eq!(err, ExitError::UnreachableHaltReturn { code });
            assert!(!err.is_recoverable());
            assert_eq!(*order.lock(), vec!["listener", "halt"]);
            assert_eq!(halt.calls.lock()[0].get(), code);
            assert_eq!(t.state(), ExitState::Halted);
            assert_eq!(t.exit_request().map(|r| r.code.get()), Some(code));
        }
    }

    #[test]
    fn reason_is_recorded_with_the_code() {
        let halt = Arc::new(ReturningHalt::default());
        let (t, _listeners) = sequencer(halt);

        let _ = t.request_exit(&Value::from(2), Some(ExitReason::new("disk full")));
        let req = t.exit_request().unwrap();
        assert_eq!(req.code.get(), 2);
        assert_eq!(req.reason.unwrap().value(), &Value::from("disk full"));
    }

    #[test]
    fn faulty_listeners_do_not_block_halt() {
        let halt = Arc::new(ReturningHalt::default());
        let (t, listeners) = sequencer(Arc::clone(&halt));
        let _ = listeners.add(ListenerFn::arc("err", |_| Err("nope".into())));
        let _ = listeners.add(ListenerFn::arc("panic", |_| panic!("listener exploded")));

        let _ = t.exit_with(ExitCode::new(3).unwrap(), None);
        let calls = halt.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get(), 3);
    }

    #[test]
    fn reentrant_exit_skips_second_dispatch() {
        let halt = Arc::new(ReturningHalt::default());
        let (t, listeners) = sequencer(Arc::clone(&halt));
        let t = Arc::new(t);
        let fired = Arc::new(Mutex::new(0usize));

        let inner = Arc::downgrade(&t);
        let f = Arc::clone(&fired);
        let _ = listeners.add(ListenerFn::arc("nested", move |_| {
            *f.lock() += 1;
            if let Some(t) = inner.upgrade() {
                let _ = t.exit_with(ExitCode::new(7).unwrap(), None);
            }
            Ok(())
        }));

        let _ = t.exit_with(ExitCode::SUCCESS, None);
        assert_eq!(*fired.lock(), 1);
        let codes: Vec<i32> = halt.calls.lock().iter().map(|c| c.get()).collect();
        assert_eq!(codes, vec![7, 0]);
    }
}
