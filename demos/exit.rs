//! # Example: exit
//!
//! Terminates a context with a code and a reason, running shutdown listeners first.
//!
//! Shows how to:
//! - Register shutdown listeners ([`LogListener`], a closure, a faulty one).
//! - Call `exit` from script code and read the outcome from [`Context::run`].
//! - Observe that invalid codes are rejected without side effects.
//!
//! ## Flow
//! ```text
//! ctx.run(|c| c.exit(3, reason))
//!     ├─► ListenerSet::dispatch(ShutdownEvent "unload")
//!     │     ├─► LogListener       (info!)
//!     │     ├─► "flush" closure
//!     │     └─► "broken" closure  (Err, logged and skipped)
//!     ├─► UnwindHalt: cancel context, unwind
//!     └─► run() returns Error::ScriptExit { code: 3, reason }
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example exit --features logging
//! ```

use std::sync::Arc;

use sandbox_globals::{Config, Context, Error, ExitReason, Host, ListenerFn, LogListener, Value};
use tracing_subscriber::EnvFilter;

fn script(ctx: &Context) -> Result<(), Error> {
    if let Err(e) = ctx.exit(-1, None) {
        println!("rejected: {} (recoverable: {})", e, e.is_recoverable());
    }

    let state = Value::object([("pending", Value::from(2))]);
    let snapshot = ctx.serialize(&state)?;
    println!("snapshot of {} bytes taken", snapshot.len());

    ctx.exit(3, Some(ExitReason::new(Value::from("maintenance"))))?;
    println!("never printed");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    let host = Host::new(Config::default());
    let ctx = host.context();

    let _ = ctx.on_shutdown(Arc::new(LogListener::new()));
    let _ = ctx.on_shutdown(ListenerFn::arc("flush", |ev| {
        println!("[flush] {} code={} reason={:?}", ev.context, ev.code, ev.reason);
        Ok(())
    }));
    let _ = ctx.on_shutdown(ListenerFn::arc("broken", |_| Err("disk unavailable".into())));

    match ctx.run(script) {
        Err(e) => match e.as_script_exit() {
            Some((code, reason)) => println!("script exited with {code} reason={reason:?}"),
            None => return Err(e.into()),
        },
        Ok(()) => println!("script finished without exit"),
    }

    println!("state={:?} request={:?}", ctx.state(), ctx.exit_request());
    if let Err(e) = ctx.run(|_| Ok(())) {
        println!("second run refused: {e}");
    }
    Ok(())
}
