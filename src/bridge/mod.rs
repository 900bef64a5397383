//! # Serialization bridge.
//!
//! [`SerializationBridge`] turns structured values into a [`ByteSequence`] and
//! back by delegating to a [`StructuredClone`] engine. It holds no state besides
//! the shared engine handle and is cheap to clone; every context gets its own
//! bridge over the host's engine.
//!
//! ## Round-trip law
//! For every value `v` accepted by [`serialize_to_bytes`](SerializationBridge::serialize_to_bytes),
//! `deserialize_from_bytes(serialize_to_bytes(v))` is structurally equal to `v`.
//!
//! ## Example
//! ```rust
//! use sandbox_globals::{SerializationBridge, Value};
//!
//! let bridge = SerializationBridge::default();
//! let v = Value::object([("a", Value::array([1, 2, 3])), ("b", Value::from("x"))]);
//! let bytes = bridge.serialize_to_bytes(&v).unwrap();
//! assert!(!bytes.is_empty());
//! assert_eq!(bridge.deserialize_from_bytes(&bytes).unwrap(), v);
//! ```

mod sequence;

pub use sequence::ByteSequence;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::clone::{StructuredClone, WireClone};
use crate::error::CloneError;
use crate::value::Value;

/// Byte-level serialize/deserialize pair over a shared engine.
#[derive(Clone)]
pub struct SerializationBridge {
    engine: Arc<dyn StructuredClone>,
}

impl SerializationBridge {
    /// Creates a bridge over the given engine.
    pub fn new(engine: Arc<dyn StructuredClone>) -> Self {
        Self { engine }
    }

    /// Converts a value into its serialized byte form.
    ///
    /// Fails with [`CloneError::Serialization`] for values the engine rejects.
    pub fn serialize_to_bytes(&self, value: &Value) -> Result<ByteSequence, CloneError> {
        self.engine
            .serialize(value)
            .map(ByteSequence::from)
            .inspect_err(|e| {
                debug!(
                    engine = self.engine.name(),
                    kind = value.kind(),
                    error = %e,
                    "serialize rejected"
                );
            })
    }

    /// Inverse of [`serialize_to_bytes`](Self::serialize_to_bytes).
    ///
    /// Accepts any native byte view, including a [`ByteSequence`]. Fails with
    /// [`CloneError::Deserialization`] on malformed or truncated input.
    pub fn deserialize_from_bytes(&self, bytes: impl AsRef<[u8]>) -> Result<Value, CloneError> {
        let bytes = bytes.as_ref();
        self.engine.deserialize(bytes).inspect_err(|e| {
            debug!(
                engine = self.engine.name(),
                len = bytes.len(),
                error = %e,
                "deserialize rejected"
            );
        })
    }

    /// Deserializes a script-supplied value holding a byte sequence
    /// (array of numbers or array buffer).
    pub fn deserialize_from_value(&self, bytes: &Value) -> Result<Value, CloneError> {
        let seq = ByteSequence::try_from(bytes)?;
        self.deserialize_from_bytes(&seq)
    }

    /// Name of the underlying engine.
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }
}

impl Default for SerializationBridge {
    /// Bridge over a default [`WireClone`] engine.
    fn default() -> Self {
        Self::new(Arc::new(WireClone::default()))
    }
}

impl fmt::Debug for SerializationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationBridge")
            .field("engine", &self.engine.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn example_object_round_trips() {
        let bridge = SerializationBridge::default();
        let v = Value::object([("a", Value::array([1, 2, 3])), ("b", Value::from("x"))]);
        let bytes = bridge.serialize_to_bytes(&v).unwrap();
        assert_eq!(bridge.deserialize_from_bytes(&bytes).unwrap(), v);
    }

    #[test]
    fn sender_value_is_untouched() {
        let bridge = SerializationBridge::default();
        let v = Value::array([Value::from("keep"), Value::BigInt(1)]);
        let before = v.clone();
        let _ = bridge.serialize_to_bytes(&v).unwrap();
        assert_eq!(v, before);
    }

    #[test]
    fn script_side_number_array_is_accepted() {
        let bridge = SerializationBridge::default();
        let v = Value::from("through a script");
        let as_script = bridge.serialize_to_bytes(&v).unwrap().to_value();
        assert_eq!(bridge.deserialize_from_value(&as_script).unwrap(), v);
    }

    #[test]
    fn errors_are_typed() {
        let bridge = SerializationBridge::default();
        let err = bridge
            .serialize_to_bytes(&Value::Function("f".into()))
            .unwrap_err();
        assert!(matches!(err, CloneError::Serialization { .. }));

        let err = bridge.deserialize_from_bytes([0xFFu8]).unwrap_err();
        assert!(matches!(err, CloneError::Deserialization { .. }));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Undefined),
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<f64>().prop_map(Value::Number),
            any::<i128>().prop_map(Value::BigInt),
            ".{0,12}".prop_map(Value::String),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        ]
    }

    fn structured() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Set),
                proptest::collection::vec(("[a-z]{1,6}", inner.clone()), 0..6)
                    .prop_map(|props| Value::Object(props.into_iter().collect())),
                proptest::collection::vec((inner.clone(), inner), 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn round_trip_law(v in structured()) {
            let bridge = SerializationBridge::default();
            let bytes = bridge.serialize_to_bytes(&v).unwrap();
            prop_assert_eq!(bridge.deserialize_from_bytes(&bytes).unwrap(), v);
        }
    }
}
