use std::sync::Arc;

use crate::{
    channel::BroadcastHub,
    clone::{StructuredClone, WireClone},
    core::Config,
    exit::{Halt, UnwindHalt},
};

use super::host::Host;

/// Builder for a [`Host`] with custom primitives.
///
/// Defaults: a [`WireClone`] engine limited to `cfg.max_depth` and the
/// [`UnwindHalt`] halt primitive.
pub struct HostBuilder {
    cfg: Config,
    engine: Option<Arc<dyn StructuredClone>>,
    halt: Option<Arc<dyn Halt>>,
}

impl HostBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            engine: None,
            halt: None,
        }
    }

    /// Replaces the structured-clone engine used by every context.
    pub fn with_engine(mut self, engine: Arc<dyn StructuredClone>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces the halt primitive used by every context.
    ///
    /// Use [`ProcessHalt`](crate::ProcessHalt) to terminate the whole process on exit.
    pub fn with_halt(mut self, halt: Arc<dyn Halt>) -> Self {
        self.halt = Some(halt);
        self
    }

    /// Builds the host.
    pub fn build(self) -> Host {
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(WireClone::new(self.cfg.max_depth_clamped())));
        let halt = self.halt.unwrap_or_else(|| Arc::new(UnwindHalt));
        let hub = BroadcastHub::new();
        Host::from_parts(self.cfg, hub, engine, halt)
    }
}
