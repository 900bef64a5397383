//! # Portable byte sequence.
//!
//! [`ByteSequence`] is what the bridge hands to script code: an ordered,
//! indexable sequence of small integers rather than a native buffer type, so it
//! survives crossing into a context that does not share buffer types with the
//! producer. With serde it serializes as a plain array of numbers.

use std::ops::Index;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CloneError;
use crate::value::Value;

/// Ordered bytes of a serialized value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteSequence(Vec<u8>);

impl ByteSequence {
    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the sequence holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Byte at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    /// Iterates over the bytes in order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    /// Borrowed view as a native slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the sequence into a native vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Script-visible form: an array of numbers in `0..=255`.
    ///
    /// ```
    /// use sandbox_globals::{ByteSequence, Value};
    ///
    /// let seq = ByteSequence::from(vec![1, 2]);
    /// assert_eq!(seq.to_value(), Value::array([1u8, 2u8]));
    /// ```
    pub fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Value::from).collect())
    }
}

impl From<Vec<u8>> for ByteSequence {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for ByteSequence {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl From<Bytes> for ByteSequence {
    fn from(b: Bytes) -> Self {
        Self(b.to_vec())
    }
}

impl From<ByteSequence> for Bytes {
    fn from(seq: ByteSequence) -> Self {
        Bytes::from(seq.0)
    }
}

impl From<ByteSequence> for Vec<u8> {
    fn from(seq: ByteSequence) -> Self {
        seq.0
    }
}

impl AsRef<[u8]> for ByteSequence {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Index<usize> for ByteSequence {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl FromIterator<u8> for ByteSequence {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ByteSequence {
    type Item = u8;
    type IntoIter = std::vec::IntoIter<u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Accepts what script code may hand back: an array buffer, or an array of
/// integral numbers in `0..=255`.
impl TryFrom<&Value> for ByteSequence {
    type Error = CloneError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bytes(raw) => Ok(Self(raw.clone())),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Number(n) if n.fract() == 0.0 && (0.0..=255.0).contains(n) => {
                        Ok(*n as u8)
                    }
                    other => Err(CloneError::deserialization(format!(
                        "element {i} is not a byte: {other:?}"
                    ))),
                })
                .collect(),
            other => Err(CloneError::deserialization(format!(
                "expected a byte sequence, got {}",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_shape_is_a_number_array() {
        let seq = ByteSequence::from(vec![0, 17, 255]);
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, "[0,17,255]");
        let back: ByteSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seq);
        assert!(serde_json::from_str::<ByteSequence>("[256]").is_err());
    }

    #[test]
    fn indexable_and_convertible() {
        let seq = ByteSequence::from(Bytes::from_static(b"\x01\x02\x03"));
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[1], 2);
        assert_eq!(seq.get(3), None);
        let native: Bytes = seq.clone().into();
        assert_eq!(native.as_ref(), seq.as_slice());
    }

    #[test]
    fn from_script_value() {
        let ok = Value::array([1u8, 2u8, 255u8]);
        assert_eq!(
            ByteSequence::try_from(&ok).unwrap().into_vec(),
            vec![1, 2, 255]
        );
        assert_eq!(
            ByteSequence::try_from(&Value::Bytes(vec![9])).unwrap().as_slice(),
            &[9]
        );

        for bad in [
            Value::array([Value::Number(256.0)]),
            Value::array([Value::Number(-1.0)]),
            Value::array([Value::Number(1.5)]),
            Value::array([Value::from("1")]),
            Value::from("bytes"),
        ] {
            let err = ByteSequence::try_from(&bad).unwrap_err();
            assert_eq!(err.as_label(), "deserialization_error");
        }
    }
}
