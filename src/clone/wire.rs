//! # Default binary engine.
//!
//! ```text
//! payload := 0xFF VERSION postcard(Value)
//! ```
//!
//! The body is the postcard encoding of [`Value`]'s serde form. Two checks wrap
//! the codec: a pre-pass over the tree before encoding (non-cloneable values and
//! nesting beyond the limit), and a nesting budget while decoding so that
//! hostile payloads cannot exhaust the stack of the receiving context.

use super::StructuredClone;
use crate::error::CloneError;
use crate::value::Value;
use crate::value::depth::{self, DEPTH_EXCEEDED};

const HEADER: u8 = 0xFF;
const VERSION: u8 = 0x02;

/// Default nesting limit, shared with [`Config`](crate::Config).
pub(crate) const DEFAULT_MAX_DEPTH: usize = 128;

/// Postcard-backed structured-clone engine.
///
/// Nesting is limited to `max_depth` containers in both directions.
#[derive(Clone, Copy, Debug)]
pub struct WireClone {
    max_depth: usize,
}

impl WireClone {
    /// Creates an engine with the given nesting limit (min 1).
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Configured nesting limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for WireClone {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl StructuredClone for WireClone {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CloneError> {
        check(value, self.max_depth)?;
        postcard::to_extend(value, vec![HEADER, VERSION])
            .map_err(|e| CloneError::serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, CloneError> {
        let body = match bytes {
            [HEADER, VERSION, body @ ..] => body,
            [] | [HEADER] => return Err(CloneError::deserialization("truncated header")),
            [HEADER, v, ..] => {
                return Err(CloneError::deserialization(format!(
                    "unsupported format version {v}"
                )));
            }
            [h, ..] => {
                return Err(CloneError::deserialization(format!(
                    "bad header byte {h:#04x}"
                )));
            }
        };

        let limit = depth::limit(self.max_depth);
        let (value, rest) = postcard::take_from_bytes::<Value>(body).map_err(|e| {
            if limit.exceeded() {
                CloneError::deserialization(DEPTH_EXCEEDED)
            } else {
                CloneError::deserialization(e.to_string())
            }
        })?;
        drop(limit);

        if !rest.is_empty() {
            return Err(CloneError::deserialization(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }
        Ok(value)
    }

    fn name(&self) -> &'static str {
        "wire"
    }
}

/// Rejects what the codec must never see: non-cloneable values and trees
/// deeper than `depth` containers.
fn check(value: &Value, depth: usize) -> Result<(), CloneError> {
    let inner = || {
        depth
            .checked_sub(1)
            .ok_or_else(|| CloneError::serialization(DEPTH_EXCEEDED))
    };
    match value {
        Value::Array(items) | Value::Set(items) => {
            let depth = inner()?;
            items.iter().try_for_each(|v| check(v, depth))
        }
        Value::Object(props) => {
            let depth = inner()?;
            props.values().try_for_each(|v| check(v, depth))
        }
        Value::Map(entries) => {
            let depth = inner()?;
            entries
                .iter()
                .try_for_each(|(k, v)| check(k, depth).and_then(|()| check(v, depth)))
        }
        Value::Function(name) => Err(CloneError::serialization(format!(
            "function {name:?} could not be cloned"
        ))),
        Value::HostObject(kind) => Err(CloneError::serialization(format!(
            "{kind} object could not be cloned"
        ))),
        _ => Ok(()),
    }
}
