//! Conversions between [`Value`] and `serde_json::Value`.
//!
//! JSON is a strict subset of the structured-clone model, so the inbound
//! direction is total while the outbound one fails on anything JSON cannot
//! represent.

use serde_json::{Map as JsonMap, Number as JsonNumber, Value as Json};

use super::Value;
use crate::error::CloneError;

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(props) => {
                Value::Object(props.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl TryFrom<&Value> for Json {
    type Error = CloneError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(json_number(*n)?),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(Json::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(props) => {
                let mut out = JsonMap::with_capacity(props.len());
                for (k, v) in props {
                    let _ = out.insert(k.clone(), Json::try_from(v)?);
                }
                Json::Object(out)
            }
            other => {
                return Err(CloneError::serialization(format!(
                    "{} has no JSON representation",
                    other.kind()
                )));
            }
        })
    }
}

/// Largest integer a double holds exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Integral doubles become JSON integers so `1` does not turn into `1.0`.
fn json_number(n: f64) -> Result<JsonNumber, CloneError> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(JsonNumber::from(n as i64));
    }
    JsonNumber::from_f64(n)
        .ok_or_else(|| CloneError::serialization(format!("{n} is not a JSON number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip() {
        let src = json!({"a": [1, 2, 3], "b": "x", "c": {"d": null, "e": true}});
        let v = Value::from(src.clone());
        assert_eq!(v.get("b"), Some(&Value::from("x")));
        assert_eq!(Json::try_from(&v).unwrap(), src);
    }

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(Json::try_from(&Value::from(1)).unwrap(), json!(1));
        assert_eq!(Json::try_from(&Value::Number(-0.0)).unwrap(), json!(0));
        assert_eq!(Json::try_from(&Value::Number(2.5)).unwrap(), json!(2.5));
        assert_eq!(Json::try_from(&Value::Number(1e300)).unwrap(), json!(1e300));
    }

    #[test]
    fn non_json_values_are_rejected() {
        let err = Json::try_from(&Value::BigInt(7)).unwrap_err();
        assert_eq!(err.as_label(), "serialization_error");
        assert!(Json::try_from(&Value::Number(f64::INFINITY)).is_err());
        assert!(Json::try_from(&Value::array([Value::Undefined])).is_err());
    }
}
