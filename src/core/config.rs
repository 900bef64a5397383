//! # Host configuration.
//!
//! Provides [`Config`], the settings shared by every context of a [`Host`](crate::Host).
//!
//! Config can be built in code (`Config::default()` and field updates) or
//! deserialized from any serde format; missing fields take their defaults.
//!
//! ```rust
//! use sandbox_globals::Config;
//!
//! let cfg: Config = serde_json::from_str(r#"{ "max_depth": 8 }"#).unwrap();
//! assert_eq!(cfg.max_depth, 8);
//! assert_eq!(cfg.shutdown_event, "unload");
//! ```

use serde::Deserialize;

/// Default shutdown event name.
pub(crate) const DEFAULT_SHUTDOWN_EVENT: &str = "unload";

/// Settings for a [`Host`](crate::Host).
///
/// ## Field semantics
/// - `max_depth`: nesting limit of the default clone engine (min 1; clamped)
/// - `shutdown_event`: name carried on every [`ShutdownEvent`](crate::ShutdownEvent)
///
/// All fields are public. Prefer the `_clamped` accessors over reading the raw
/// numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum container nesting the default [`WireClone`](crate::WireClone)
    /// engine accepts in either direction.
    ///
    /// Ignored when a custom engine is installed with
    /// [`HostBuilder::with_engine`](crate::HostBuilder::with_engine).
    pub max_depth: usize,

    /// Event name listeners observe during termination.
    pub shutdown_event: String,
}

impl Config {
    /// Nesting limit clamped to a minimum of 1.
    #[inline]
    pub fn max_depth_clamped(&self) -> usize {
        self.max_depth.max(1)
    }

    /// Shutdown event name, falling back to `"unload"` when blank.
    #[inline]
    pub fn shutdown_event_name(&self) -> &str {
        if self.shutdown_event.trim().is_empty() {
            DEFAULT_SHUTDOWN_EVENT
        } else {
            &self.shutdown_event
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_depth = 128`
    /// - `shutdown_event = "unload"`
    fn default() -> Self {
        Self {
            max_depth: crate::clone::DEFAULT_MAX_DEPTH,
            shutdown_event: DEFAULT_SHUTDOWN_EVENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_clamped() {
        let cfg = Config {
            max_depth: 0,
            shutdown_event: "  ".into(),
        };
        assert_eq!(cfg.max_depth_clamped(), 1);
        assert_eq!(cfg.shutdown_event_name(), "unload");
    }

    #[test]
    fn deserializes_partial_documents() {
        let cfg: Config = serde_json::from_str(r#"{ "shutdown_event": "beforeexit" }"#).unwrap();
        assert_eq!(cfg.shutdown_event_name(), "beforeexit");
        assert_eq!(cfg.max_depth, 128);

        let empty: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.max_depth, 128);
    }
}
