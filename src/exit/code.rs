//! Exit code and reason.
//!
//! [`ExitCode`] can only hold a valid code: an integer in `0..=i32::MAX`. Every
//! conversion into it is the single place where `InvalidExitCode` is raised.

use std::fmt;
use std::sync::Arc;

use crate::error::ExitError;
use crate::value::Value;

/// Validated, non-negative process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Exit code `0`.
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// Exit code `1`.
    pub const FAILURE: ExitCode = ExitCode(1);

    /// Returns `None` for negative codes.
    pub const fn new(code: i32) -> Option<Self> {
        if code < 0 { None } else { Some(Self(code)) }
    }

    /// Raw code for the halt primitive.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// `true` for code `0`.
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn invalid(got: impl fmt::Debug) -> ExitError {
    ExitError::InvalidExitCode {
        got: format!("{got:?}"),
    }
}

impl TryFrom<i64> for ExitCode {
    type Error = ExitError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        i32::try_from(code)
            .ok()
            .and_then(ExitCode::new)
            .ok_or_else(|| invalid(code))
    }
}

impl TryFrom<i32> for ExitCode {
    type Error = ExitError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        ExitCode::new(code).ok_or_else(|| invalid(code))
    }
}

impl TryFrom<f64> for ExitCode {
    type Error = ExitError;

    /// Accepts finite, integral numbers in range; `-0.0` counts as `0`.
    fn try_from(code: f64) -> Result<Self, Self::Error> {
        if code.is_finite() && code.fract() == 0.0 && (0.0..=f64::from(i32::MAX)).contains(&code)
        {
            Ok(ExitCode(code as i32))
        } else {
            Err(invalid(code))
        }
    }
}

/// Script-side values: only numbers can be exit codes, strings like `"0"` are rejected.
impl TryFrom<&Value> for ExitCode {
    type Error = ExitError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => ExitCode::try_from(*n),
            other => Err(invalid(other)),
        }
    }
}

/// Opaque annotation passed through to shutdown listeners.
///
/// Never validated and never serialized: it may hold values that cannot cross
/// a context boundary (functions, host objects).
#[derive(Clone)]
pub struct ExitReason(Arc<Value>);

impl ExitReason {
    /// Wraps any value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Arc::new(value.into()))
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Debug for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExitReason").field(&self.0.kind()).finish()
    }
}
