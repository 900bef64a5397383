//! # Structured-clone value model.
//!
//! [`Value`] is the data model that crosses context boundaries. It covers JSON
//! plus the usual structured-clone extras (undefined, big integers, dates,
//! regular expressions, byte buffers, maps and sets).
//!
//! Two variants exist only to be *rejected*: [`Value::Function`] and
//! [`Value::HostObject`] stand in for script values that live in one context and
//! cannot be copied into another.
//!
//! ## Equality
//! `PartialEq` is structural:
//! - numbers compare with SameValueZero (`NaN == NaN`, `0 == -0`);
//! - object keys compare as a set (insertion order is ignored);
//! - arrays, maps and sets compare in order.
//!
//! Owned values form trees, so reference cycles cannot be expressed.

pub(crate) mod depth;
mod json;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string-keyed properties of a plain object.
pub type Properties = IndexMap<String, Value>;

/// A structured value.
///
/// The serde form is the externally tagged enum. [`Value::Function`] and
/// [`Value::HostObject`] refuse to serialize and never deserialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    /// `undefined`.
    #[default]
    Undefined,
    /// `null`.
    Null,
    /// Boolean primitive.
    Bool(bool),
    /// IEEE-754 double.
    Number(f64),
    /// Arbitrary-size integer, truncated to 128 bits.
    BigInt(i128),
    /// UTF-8 string.
    String(String),
    /// Milliseconds since the Unix epoch.
    Date(f64),
    /// Regular expression literal.
    RegExp {
        /// Pattern source.
        source: String,
        /// Flag letters.
        flags: String,
    },
    /// Raw array buffer contents.
    Bytes(Vec<u8>),
    /// Dense array.
    Array(#[serde(deserialize_with = "depth::nested")] Vec<Value>),
    /// Plain object.
    Object(#[serde(deserialize_with = "depth::nested")] Properties),
    /// Ordered key/value map.
    Map(#[serde(deserialize_with = "depth::nested")] Vec<(Value, Value)>),
    /// Ordered set.
    Set(#[serde(deserialize_with = "depth::nested")] Vec<Value>),
    /// A callable; never cloneable.
    #[serde(skip)]
    Function(String),
    /// An engine-owned object (sockets, handles, ...); never cloneable.
    #[serde(skip)]
    HostObject(String),
}

impl Value {
    /// Short type tag used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::RegExp { .. } => "regexp",
            Value::Bytes(_) => "arraybuffer",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::HostObject(_) => "host object",
        }
    }

    /// Builds an object from `(key, value)` pairs, keeping their order.
    ///
    /// ```
    /// use sandbox_globals::Value;
    ///
    /// let v = Value::object([("a", Value::from(1)), ("b", Value::from("x"))]);
    /// assert_eq!(v.get("b"), Some(&Value::from("x")));
    /// ```
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds an array from anything convertible into values.
    pub fn array<T, I>(items: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Property lookup on plain objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(props) => props.get(key),
            _ => None,
        }
    }

    /// Returns the number if this is a [`Value::Number`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// `true` unless the value (or something nested in it) is a function or host object.
    pub fn is_cloneable(&self) -> bool {
        match self {
            Value::Function(_) | Value::HostObject(_) => false,
            Value::Array(items) | Value::Set(items) => items.iter().all(Value::is_cloneable),
            Value::Object(props) => props.values().all(Value::is_cloneable),
            Value::Map(entries) => entries
                .iter()
                .all(|(k, v)| k.is_cloneable() && v.is_cloneable()),
            _ => true,
        }
    }
}

/// SameValueZero on numbers.
fn same_value_zero(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) | (Value::Date(a), Value::Date(b)) => {
                same_value_zero(*a, *b)
            }
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::RegExp { source, flags },
                Value::RegExp {
                    source: s2,
                    flags: f2,
                },
            ) => source == s2 && flags == f2,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::HostObject(a), Value::HostObject(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
