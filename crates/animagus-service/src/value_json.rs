//! JSON in/out for arbitrary `Value`s at the Call boundary.
//!
//! `animagus_types::json::serialize_to_json` only renders the three
//! chain-data shapes (`Script`/`Header`/`Transaction`) CKB's own RPC needs.
//! Call parameters and results can be any primitive or a `list` of them (the
//! seed scenarios' balance sums and zero/bool results), so this module
//! covers that generic case and falls back to the canonical renderer for
//! the chain-data shapes it already knows.

use crate::error::{ServiceError, ServiceResult};
use animagus_types::{json, Value, ValueType};
use serde_json::Value as Json;

/// Parse one JSON parameter into the primitive `Value` it names. Strings
/// prefixed `0x` decode as bytes; everything else maps the obvious way.
pub fn parse_param(j: &Json) -> ServiceResult<Value> {
    match j {
        Json::Null => Ok(Value::nil()),
        Json::Bool(b) => Ok(Value::bool(*b)),
        Json::Number(n) => {
            let u = n.as_u64().ok_or_else(|| ServiceError::BadParam(format!("{n} is not a u64")))?;
            Ok(Value::uint64(u))
        }
        Json::String(s) => match s.strip_prefix("0x") {
            Some(hex) => {
                let bytes = hex::decode(hex)
                    .map_err(|e| ServiceError::BadParam(format!("{s} is not valid hex: {e}")))?;
                Ok(Value::bytes(bytes))
            }
            None => Err(ServiceError::BadParam(format!("string param {s} must be 0x-prefixed hex"))),
        },
        other => Err(ServiceError::BadParam(format!("unsupported param shape: {other}"))),
    }
}

/// Render an evaluation result back to JSON, preferring the canonical
/// chain-data renderer where it applies and falling back to a generic
/// rendering for primitives, `nil`, and `list`.
pub fn render_value(value: &Value) -> ServiceResult<Json> {
    match value.ty {
        ValueType::Script | ValueType::Header | ValueType::Transaction => {
            Ok(json::serialize_to_json(value)?)
        }
        ValueType::Nil => Ok(Json::Null),
        ValueType::Bool => Ok(Json::Bool(value.as_bool().unwrap_or(false))),
        ValueType::Uint64 => Ok(Json::from(value.as_uint64().unwrap_or_default())),
        ValueType::Bytes => Ok(Json::String(format!("0x{}", hex::encode(value.as_bytes().unwrap_or_default())))),
        ValueType::List => {
            let items = value.children.iter().map(render_value).collect::<ServiceResult<Vec<_>>>()?;
            Ok(Json::Array(items))
        }
        other => Err(ServiceError::BadParam(format!("result of type {other:?} has no JSON rendering"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_string_as_bytes() {
        let v = parse_param(&Json::String("0xdead".into())).unwrap();
        assert_eq!(v.as_bytes(), Some([0xde, 0xad].as_slice()));
    }

    #[test]
    fn parses_integer_as_uint64() {
        let v = parse_param(&Json::from(42)).unwrap();
        assert_eq!(v.as_uint64(), Some(42));
    }

    #[test]
    fn renders_uint64_as_number() {
        let j = render_value(&Value::uint64(9)).unwrap();
        assert_eq!(j, Json::from(9));
    }

    #[test]
    fn renders_list_recursively() {
        let v = Value::list(vec![Value::uint64(1), Value::bool(true), Value::nil()]);
        let j = render_value(&v).unwrap();
        assert_eq!(j, serde_json::json!([1, true, null]));
    }
}
