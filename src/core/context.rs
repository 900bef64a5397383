//! # Execution context.
//!
//! A [`Context`] is one isolated script environment. It is the explicit
//! dependency-injection handle script code uses instead of globals: every
//! operation that would be a global (`BroadcastChannel`, `serialize`,
//! `deserialize`, `exit`) is a method here.
//!
//! ## Lifecycle
//! ```text
//! Host::context() ──► Running ──exit(code)──► ShuttingDown ──listeners──► Halted
//!                        │                                                  │
//!                  run / run_async / spawn                         token cancelled:
//!                                                                  channels close,
//!                                                                  spawned jobs stop,
//!                                                                  run* returns ScriptExit,
//!                                                                  later run* returns Halted
//! ```

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    bridge::{ByteSequence, SerializationBridge},
    channel::{BroadcastChannel, BroadcastHub},
    error::{CloneError, Error, ExitError},
    events::ContextId,
    exit::{
        ExecutionScope, ExitCode, ExitReason, ExitRequest, ExitState, Halt, Termination, halt_code,
    },
    listeners::{ListenerId, ListenerSet, ShutdownListener, panic_message},
    value::Value,
};

struct Inner {
    id: ContextId,
    hub: BroadcastHub,
    bridge: SerializationBridge,
    listeners: Arc<ListenerSet>,
    termination: Termination,
    token: CancellationToken,
}

/// Handle on one isolated context. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

/// Non-owning handle on a [`Context`].
///
/// Listeners registered on a context should capture this instead of a
/// [`Context`] clone: the context owns its listener set, so a strong clone
/// inside a listener keeps the context alive forever.
#[derive(Clone)]
pub struct WeakContext {
    inner: Weak<Inner>,
}

impl WeakContext {
    /// Returns the context if it is still alive.
    pub fn upgrade(&self) -> Option<Context> {
        self.inner.upgrade().map(|inner| Context { inner })
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContext")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Context {
    pub(crate) fn new(
        id: ContextId,
        hub: BroadcastHub,
        bridge: SerializationBridge,
        halt: Arc<dyn Halt>,
        shutdown_event: &str,
    ) -> Self {
        let token = CancellationToken::new();
        let listeners = Arc::new(ListenerSet::new());
        let termination = Termination::new(
            shutdown_event,
            Arc::clone(&listeners),
            halt,
            ExecutionScope::new(id, token.clone()),
        );
        debug!(context = %id, "context created");
        Self {
            inner: Arc::new(Inner {
                id,
                hub,
                bridge,
                listeners,
                termination,
                token,
            }),
        }
    }

    /// Context identifier.
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Creates a [`WeakContext`] that does not keep this context alive.
    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Opens a broadcast channel instance named `name` in this context.
    ///
    /// Instances of the same name in any context of the host form one group.
    /// On a halted context the instance is born closed.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn broadcast_channel(&self, name: impl Into<Arc<str>>) -> BroadcastChannel {
        BroadcastChannel::open(
            &self.inner.hub,
            name.into(),
            self.inner.bridge.clone(),
            self.inner.id,
            &self.inner.token,
        )
    }

    /// Serializes `value` with this context's bridge.
    pub fn serialize(&self, value: &Value) -> Result<ByteSequence, CloneError> {
        self.inner.bridge.serialize_to_bytes(value)
    }

    /// Rebuilds a value from bytes with this context's bridge.
    pub fn deserialize(&self, bytes: impl AsRef<[u8]>) -> Result<Value, CloneError> {
        self.inner.bridge.deserialize_from_bytes(bytes)
    }

    /// This context's serialization bridge.
    pub fn bridge(&self) -> &SerializationBridge {
        &self.inner.bridge
    }

    /// Shutdown listeners of this context.
    pub fn listeners(&self) -> &ListenerSet {
        &self.inner.listeners
    }

    /// Registers a shutdown listener.
    pub fn on_shutdown(&self, listener: Arc<dyn ShutdownListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Terminates this context with `code`.
    ///
    /// Listeners run first; then the halt primitive stops the context. With the
    /// default [`UnwindHalt`](crate::UnwindHalt) this call unwinds to the
    /// enclosing [`run`](Self::run) / [`run_async`](Self::run_async), so code
    /// after it never runs.
    ///
    /// # Errors
    /// - [`ExitError::InvalidExitCode`] if `code` is not an integer in
    ///   `0..=i32::MAX`; nothing else happens and the context keeps running.
    /// - [`ExitError::UnreachableHaltReturn`] if the host's halt primitive returned.
    ///
    /// # Panics
    /// With [`UnwindHalt`](crate::UnwindHalt), a successful exit unwinds with a
    /// private halt payload. Outside [`run`](Self::run), [`run_async`](Self::run_async)
    /// or a job from [`spawn`](Self::spawn) nothing catches it, so it surfaces as
    /// an ordinary panic of the calling thread or task. The context is still
    /// halted in that case.
    pub fn exit(
        &self,
        code: impl Into<Value>,
        reason: Option<ExitReason>,
    ) -> Result<Infallible, ExitError> {
        self.inner.termination.request_exit(&code.into(), reason)
    }

    /// Exit request recorded by the last termination, if any.
    pub fn exit_request(&self) -> Option<ExitRequest> {
        self.inner.termination.exit_request()
    }

    /// Current termination state.
    pub fn state(&self) -> ExitState {
        self.inner.termination.state()
    }

    /// `true` once the halt primitive was invoked.
    pub fn is_halted(&self) -> bool {
        self.state() == ExitState::Halted
    }

    /// Spawns async work owned by this context.
    ///
    /// The job is preempted when the context halts and then resolves to `None`.
    /// An exit requested from inside the job also resolves it to `None`.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.inner.token.clone();
        let id = self.inner.id;
        tokio::spawn(async move {
            let job = AssertUnwindSafe(fut).catch_unwind();
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                out = job => match out {
                    Ok(v) => Some(v),
                    Err(payload) if halt_code(payload.as_ref()).is_some() => {
                        debug!(context = %id, "spawned job halted");
                        None
                    }
                    Err(payload) => resume_unwind(payload),
                },
            }
        })
    }

    /// Runs synchronous script code inside this context.
    ///
    /// # Errors
    /// - whatever `f` returns,
    /// - [`Error::ScriptExit`] if `f` exited the context,
    /// - [`Error::Halted`] if the context had already halted (`f` is not called),
    /// - [`Error::Panicked`] if `f` panicked.
    pub fn run<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Context) -> Result<T, Error>,
    {
        self.ensure_running()?;
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(r) => r,
            Err(payload) => Err(self.unwound(payload)),
        }
    }

    /// Async variant of [`run`](Self::run).
    ///
    /// The future is also stopped when the context halts from elsewhere (for
    /// example a job spawned with [`spawn`](Self::spawn) called `exit`).
    pub async fn run_async<T, F, Fut>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.ensure_running()?;
        let ctx = self.clone();
        let body = AssertUnwindSafe(async move { f(ctx).await }).catch_unwind();
        tokio::select! {
            biased;
            _ = self.inner.token.cancelled() => Err(Error::ScriptExit {
                code: self.halted_code().get(),
                reason: self.exit_reason(),
            }),
            out = body => match out {
                Ok(r) => r,
                Err(payload) => Err(self.unwound(payload)),
            },
        }
    }

    fn ensure_running(&self) -> Result<(), Error> {
        if self.is_halted() {
            return Err(Error::Halted {
                code: self.halted_code().get(),
            });
        }
        Ok(())
    }

    /// Code of the recorded exit; the request is stored before the state flips.
    fn halted_code(&self) -> ExitCode {
        self.exit_request().map_or(ExitCode::FAILURE, |r| r.code)
    }

    fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_request().and_then(|r| r.reason)
    }

    fn unwound(&self, payload: Box<dyn std::any::Any + Send>) -> Error {
        match halt_code(payload.as_ref()) {
            Some(code) => {
                debug!(context = %self.inner.id, code = code.get(), "script exited");
                Error::ScriptExit {
                    code: code.get(),
                    reason: self.exit_reason(),
                }
            }
            None => Error::Panicked {
                message: panic_message(payload.as_ref()),
            },
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, Host};
    use crate::listeners::ListenerFn;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn exit_stops_the_script_and_reports_code() {
        let host = Host::new(Config::default());
        let ctx = host.context();
        let after = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&after);

        let err = ctx
            .run(|c| {
                c.exit(42, None)?;
                *flag.lock() = true;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.script_exit_code(), Some(42));
        assert!(!*after.lock());
        assert!(ctx.is_halted());
        assert_eq!(ctx.exit_request().map(|r| r.code.get()), Some(42));

        let again = ctx.run(|_| Ok(())).unwrap_err();
        assert!(matches!(again, Error::Halted { code: 42 }));
    }

    #[test]
    fn invalid_code_leaves_context_running() {
        let host = Host::default();
        let ctx = host.context();
        let err = ctx
            .run(|c| {
                c.exit(-3, None)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Exit(ExitError::InvalidExitCode { .. })));
        assert_eq!(ctx.state(), ExitState::Running);
        assert!(ctx.run(|_| Ok(7)).is_ok());
    }

    #[test]
    fn listeners_run_before_halt_and_see_reason() {
        let host = Host::default();
        let ctx = host.context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let _ = ctx.on_shutdown(ListenerFn::arc("flush", move |ev| {
            out.lock().push((
                ev.name.to_string(),
                ev.code.get(),
                ev.reason.as_ref().map(|r| r.value().clone()),
            ));
            Ok(())
        }));

        let err = ctx
            .run(|c| {
                c.exit(137, Some(ExitReason::new("oom")))?;
                Ok(())
            })
            .unwrap_err();
        let Error::ScriptExit { code, reason } = err else {
            panic!("expected script exit");
        };
        assert_eq!(code, 137);
        assert_eq!(reason.unwrap().value(), &Value::from("oom"));
        assert_eq!(
            *seen.lock(),
            vec![("unload".to_string(), 137, Some(Value::from("oom")))]
        );
    }

    #[test]
    fn exit_from_listener_halts_with_nested_code() {
        let host = Host::default();
        let ctx = host.context();
        let fired = Arc::new(Mutex::new(0usize));
        let f = Arc::clone(&fired);
        let weak = ctx.downgrade();
        let _ = ctx.on_shutdown(ListenerFn::arc("nested", move |_| {
            *f.lock() += 1;
            if let Some(inner) = weak.upgrade() {
                inner.exit(7, None)?;
            }
            Ok(())
        }));

        let err = ctx
            .run(|c| {
                c.exit(0, None)?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.script_exit_code(), Some(7));
        assert_eq!(*fired.lock(), 1);
        assert_eq!(ctx.exit_request().map(|r| r.code.get()), Some(7));

        let weak = ctx.downgrade();
        drop(ctx);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn exit_outside_run_escapes_as_panic() {
        let ctx = Host::default().context();
        let out = catch_unwind(AssertUnwindSafe(|| ctx.exit(4, None)));
        assert!(out.is_err());
        assert!(ctx.is_halted());
        assert!(matches!(ctx.run(|_| Ok(())), Err(Error::Halted { code: 4 })));
    }

    #[test]
    fn panics_are_reported() {
        let ctx = Host::default().context();
        let err = ctx.run(|_| -> Result<(), Error> { panic!("bad script") }).unwrap_err();
        assert!(matches!(err, Error::Panicked { ref message } if message == "bad script"));
        assert_eq!(ctx.state(), ExitState::Running);
    }

    #[tokio::test]
    async fn halting_preempts_spawned_work_and_closes_channels() {
        let host = Host::default();
        let ctx = host.context();
        let peer = host.context();
        let job = ctx.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            1
        });
        let mut ch = ctx.broadcast_channel("jobs");
        let tx = peer.broadcast_channel("jobs");

        let err = ctx
            .run(|c| {
                c.exit(0, None)?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.script_exit_code(), Some(0));

        assert_eq!(timeout(WAIT, job).await.unwrap().unwrap(), None);
        tx.post(&Value::from("late")).unwrap();
        assert!(timeout(WAIT, ch.recv()).await.unwrap().is_none());
        assert!(ch.post(&Value::Null).is_err());
        assert!(ctx.broadcast_channel("other").is_closed());
    }

    #[tokio::test]
    async fn run_async_reports_exit() {
        let ctx = Host::default().context();
        let err = ctx
            .run_async(|c| async move {
                tokio::task::yield_now().await;
                c.exit(3, None)?;
                Ok::<(), Error>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.script_exit_code(), Some(3));
    }

    #[tokio::test]
    async fn exit_from_spawned_job_stops_run_async() {
        let ctx = Host::default().context();
        let worker = ctx.clone();
        let err = ctx
            .run_async(|c| async move {
                let job = c.spawn(async move {
                    let _ = worker.exit(5, Some(ExitReason::new("worker done")));
                });
                let _ = job.await;
                std::future::pending::<()>().await;
                Ok::<(), Error>(())
            })
            .await
            .unwrap_err();
        let (code, reason) = err.as_script_exit().unwrap();
        assert_eq!(code, 5);
        assert_eq!(reason.map(ExitReason::value), Some(&Value::from("worker done")));
    }

    #[test]
    fn serialize_round_trips_through_context() {
        let host = Host::default();
        let (a, b) = (host.context(), host.context());
        let v = Value::object([("k", Value::array([Value::Null, Value::from(true)]))]);
        let bytes = a.serialize(&v).unwrap();
        assert_eq!(b.deserialize(&bytes).unwrap(), v);
        assert!(a.serialize(&Value::HostObject("window".into())).is_err());
    }
}
