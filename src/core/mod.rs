//! Host and context: wiring of the shared primitives.
//!
//! - [`Config`]: host settings (clone depth, shutdown event name);
//! - [`HostBuilder`]: picks the clone engine and the halt primitive;
//! - [`Host`]: owns the broadcast hub and creates contexts;
//! - [`Context`]: one isolated script environment and the handle scripts use.

mod builder;
mod config;
mod context;
mod host;

pub use builder::HostBuilder;
pub use config::Config;
pub use context::{Context, WeakContext};
pub use host::Host;
