//! Error types used by the sandbox globals.
//!
//! This module defines the error enums surfaced to script-side callers and to
//! the embedding host:
//!
//! - [`CloneError`]: a value could not be converted to or from its byte form.
//! - [`ChannelError`]: a broadcast post was rejected.
//! - [`ExitError`]: the termination sequence was refused or the host broke it.
//! - [`Error`]: what [`Context::run`](crate::Context::run) reports to the embedder.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::sync::Arc;

use thiserror::Error;

use crate::exit::ExitReason;

/// # Errors produced by the serialization bridge.
///
/// Raised synchronously to whoever asked for the conversion. On the receiving
/// side of a broadcast channel a [`CloneError::Deserialization`] only drops the
/// affected delivery.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloneError {
    /// The engine refused to serialize the value (functions, host objects, ...).
    #[error("serialization failed: {reason}")]
    Serialization {
        /// Why the value was rejected.
        reason: String,
    },

    /// The byte sequence is malformed, truncated or otherwise undecodable.
    #[error("deserialization failed: {reason}")]
    Deserialization {
        /// Why the input was rejected.
        reason: String,
    },
}

impl CloneError {
    /// Shorthand for [`CloneError::Serialization`].
    pub fn serialization(reason: impl Into<String>) -> Self {
        CloneError::Serialization {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CloneError::Deserialization`].
    pub fn deserialization(reason: impl Into<String>) -> Self {
        CloneError::Deserialization {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sandbox_globals::CloneError;
    ///
    /// let err = CloneError::serialization("function");
    /// assert_eq!(err.as_label(), "serialization_error");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CloneError::Serialization { .. } => "serialization_error",
            CloneError::Deserialization { .. } => "deserialization_error",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            CloneError::Serialization { reason } => format!("cannot serialize: {reason}"),
            CloneError::Deserialization { reason } => format!("cannot deserialize: {reason}"),
        }
    }
}

/// # Errors produced by [`BroadcastChannel::post`](crate::BroadcastChannel::post).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The message could not be serialized; nothing was enqueued.
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// The instance was closed (explicitly, by drop, or because its context halted).
    #[error("broadcast channel {name:?} is closed")]
    Closed {
        /// Channel name.
        name: Arc<str>,
    },
}

impl ChannelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::Clone(e) => e.as_label(),
            ChannelError::Closed { .. } => "channel_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ChannelError::Clone(e) => e.as_message(),
            ChannelError::Closed { name } => format!("channel {name} closed"),
        }
    }
}

/// # Errors produced by the termination sequencer.
///
/// [`ExitError::InvalidExitCode`] is a caller error: nothing happened and the
/// caller may retry with a corrected code. [`ExitError::UnreachableHaltReturn`]
/// means the host's halt primitive returned, which is an embedding bug.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExitError {
    /// The exit code is not an integer in `0..=i32::MAX`.
    #[error("invalid exit code {got}: expected a non-negative integer")]
    InvalidExitCode {
        /// Debug rendering of the rejected input.
        got: String,
    },

    /// The halt primitive returned control to the sequencer.
    #[error("halt primitive returned after exit({code}); the host embedding is broken")]
    UnreachableHaltReturn {
        /// The code the halt primitive was invoked with.
        code: i32,
    },
}

impl ExitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sandbox_globals::ExitError;
    ///
    /// let err = ExitError::UnreachableHaltReturn { code: 3 };
    /// assert_eq!(err.as_label(), "unreachable_halt_return");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitError::InvalidExitCode { .. } => "invalid_exit_code",
            ExitError::UnreachableHaltReturn { .. } => "unreachable_halt_return",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ExitError::InvalidExitCode { got } => format!("invalid exit code: {got}"),
            ExitError::UnreachableHaltReturn { code } => {
                format!("halt returned for code {code}")
            }
        }
    }

    /// Indicates whether the caller can fix the input and try again.
    ///
    /// ```
    /// use sandbox_globals::ExitError;
    ///
    /// assert!(ExitError::InvalidExitCode { got: "-1".into() }.is_recoverable());
    /// assert!(!ExitError::UnreachableHaltReturn { code: 0 }.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExitError::InvalidExitCode { .. })
    }
}

/// # Errors reported to the embedder by a context run.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Conversion failure that escaped the script body.
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// Broadcast failure that escaped the script body.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Termination failure that escaped the script body.
    #[error(transparent)]
    Exit(#[from] ExitError),

    /// The script requested termination and the context halted.
    #[error("script exited with code {code}")]
    ScriptExit {
        /// Requested exit code.
        code: i32,
        /// Reason passed along with the code, if any.
        reason: Option<ExitReason>,
    },

    /// The context already halted; no further code runs in it.
    #[error("context halted with code {code}")]
    Halted {
        /// Code the context halted with.
        code: i32,
    },

    /// The script body panicked.
    #[error("script panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl Error {
    /// Returns the exit code and reason if this error is a script exit.
    ///
    /// ```
    /// use sandbox_globals::{Error, ExitReason, Value};
    ///
    /// let err = Error::ScriptExit {
    ///     code: 42,
    ///     reason: Some(ExitReason::new("done")),
    /// };
    /// let (code, reason) = err.as_script_exit().unwrap();
    /// assert_eq!(code, 42);
    /// assert_eq!(reason.map(ExitReason::value), Some(&Value::from("done")));
    /// assert!(Error::Halted { code: 42 }.as_script_exit().is_none());
    /// ```
    pub fn as_script_exit(&self) -> Option<(i32, Option<&ExitReason>)> {
        match self {
            Error::ScriptExit { code, reason } => Some((*code, reason.as_ref())),
            _ => None,
        }
    }

    /// Returns only the exit code if this error is a script exit.
    pub fn script_exit_code(&self) -> Option<i32> {
        self.as_script_exit().map(|(code, _)| code)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Clone(e) => e.as_label(),
            Error::Channel(e) => e.as_label(),
            Error::Exit(e) => e.as_label(),
            Error::ScriptExit { .. } => "script_exit",
            Error::Halted { .. } => "context_halted",
            Error::Panicked { .. } => "script_panicked",
        }
    }
}
