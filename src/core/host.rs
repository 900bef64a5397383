use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::{
    bridge::SerializationBridge,
    channel::BroadcastHub,
    clone::StructuredClone,
    core::{Config, HostBuilder},
    events::ContextId,
    exit::Halt,
};

use super::context::Context;

/// The embedding host: owns the shared primitives and creates contexts.
///
/// Every context created by the same host shares the broadcast hub, the
/// clone engine and the halt primitive, and nothing else.
///
/// ## Example
/// ```rust
/// use sandbox_globals::{Config, Host, Value};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let host = Host::new(Config::default());
///     let (a, b) = (host.context(), host.context());
///
///     let tx = a.broadcast_channel("jobs");
///     let mut rx = b.broadcast_channel("jobs");
///     tx.post(&Value::from("hello")).unwrap();
///
///     let ev = rx.recv().await.unwrap();
///     assert_eq!(ev.data, Value::from("hello"));
///     assert_eq!(ev.origin, a.id());
/// }
/// ```
pub struct Host {
    cfg: Config,
    hub: BroadcastHub,
    engine: Arc<dyn StructuredClone>,
    halt: Arc<dyn Halt>,
    next_ctx: AtomicU64,
}

impl Host {
    /// Creates a host with default primitives.
    pub fn new(cfg: Config) -> Self {
        HostBuilder::new(cfg).build()
    }

    /// Returns a [`HostBuilder`] for custom primitives.
    pub fn builder(cfg: Config) -> HostBuilder {
        HostBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: Config,
        hub: BroadcastHub,
        engine: Arc<dyn StructuredClone>,
        halt: Arc<dyn Halt>,
    ) -> Self {
        debug!(
            engine = engine.name(),
            halt = halt.name(),
            "host created"
        );
        Self {
            cfg,
            hub,
            engine,
            halt,
            next_ctx: AtomicU64::new(0),
        }
    }

    /// Creates a new isolated context.
    pub fn context(&self) -> Context {
        let id = ContextId(self.next_ctx.fetch_add(1, Ordering::Relaxed));
        Context::new(
            id,
            self.hub.clone(),
            SerializationBridge::new(Arc::clone(&self.engine)),
            Arc::clone(&self.halt),
            self.cfg.shutdown_event_name(),
        )
    }

    /// Host configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Broadcast hub shared by all contexts.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("cfg", &self.cfg)
            .field("hub", &self.hub)
            .field("engine", &self.engine.name())
            .field("halt", &self.halt.name())
            .finish()
    }
}
