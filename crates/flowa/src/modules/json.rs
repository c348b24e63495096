//! The `json` builtin module: `encode` and `decode`.
//!
//! Bridges runtime values to `serde_json::Value`. Round-trips hold by
//! content for Integer, Float, String, Boolean, Null, Arrays of those, and
//! Maps with string keys. Unencodable values (functions, modules) surface as
//! Error values rather than fatal errors.

use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::{
    error::{RunResult, RuntimeError},
    value::{
        array_value, bool_value, error_value, float_value, int_value, map_from_pairs, null_value, str_value, Value,
        ValueRef,
    },
};

use super::{module_of, NativeFn};

/// The `json` module value.
pub(crate) fn module() -> ValueRef {
    module_of(
        "json",
        &[("encode", NativeFn::JsonEncode), ("decode", NativeFn::JsonDecode)],
    )
}

/// `json.encode(value) -> String`
pub fn encode(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [value] = args else {
        return Err(RuntimeError::new(format!(
            "json.encode() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    match to_json(value) {
        Ok(json) => Ok(str_value(json.to_string())),
        Err(msg) => Ok(error_value(msg)),
    }
}

/// `json.decode(text) -> value`
pub fn decode(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [text] = args else {
        return Err(RuntimeError::new(format!(
            "json.decode() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    let Value::Str(s) = text.as_ref() else {
        return Err(RuntimeError::new(format!(
            "json.decode() requires a String, got {}",
            text.type_name()
        )));
    };
    match serde_json::from_str::<JsonValue>(s) {
        Ok(json) => Ok(from_json(&json)),
        Err(e) => Ok(error_value(format!("json.decode: {e}"))),
    }
}

fn to_json(value: &ValueRef) -> Result<JsonValue, String> {
    match value.as_ref() {
        Value::Null => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(n) => Ok(JsonValue::Number(Number::from(*n))),
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| format!("json.encode: {f} is not representable")),
        Value::Str(s) => Ok(JsonValue::String(s.clone())),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.borrow().len());
            for item in items.borrow().iter() {
                out.push(to_json(item)?);
            }
            Ok(JsonValue::Array(out))
        }
        Value::Map(pairs) => {
            let mut out = JsonMap::new();
            for (_, pair) in pairs.borrow().iter() {
                let Value::Str(key) = pair.key.as_ref() else {
                    return Err(format!(
                        "json.encode: map keys must be Strings, found {}",
                        pair.key.type_name()
                    ));
                };
                out.insert(key.clone(), to_json(&pair.value)?);
            }
            Ok(JsonValue::Object(out))
        }
        other => Err(format!("json.encode: cannot encode {}", other.type_name())),
    }
}

fn from_json(json: &JsonValue) -> ValueRef {
    match json {
        JsonValue::Null => null_value(),
        JsonValue::Bool(b) => bool_value(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                int_value(i)
            } else {
                float_value(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => str_value(s.clone()),
        JsonValue::Array(items) => array_value(items.iter().map(from_json).collect()),
        JsonValue::Object(entries) => map_from_pairs(
            entries
                .iter()
                .map(|(k, v)| (str_value(k.clone()), from_json(v))),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::values_equal;

    fn roundtrip(value: ValueRef) -> ValueRef {
        let encoded = encode(&[value]).unwrap();
        decode(&[encoded]).unwrap()
    }

    #[test]
    fn test_scalar_roundtrips() {
        assert!(values_equal(&roundtrip(int_value(42)), &int_value(42)));
        assert!(values_equal(&roundtrip(str_value("hi")), &str_value("hi")));
        assert!(values_equal(&roundtrip(bool_value(true)), &bool_value(true)));
        assert!(matches!(roundtrip(null_value()).as_ref(), Value::Null));
    }

    #[test]
    fn test_array_roundtrip_by_content() {
        let arr = array_value(vec![int_value(1), str_value("a"), null_value()]);
        let back = roundtrip(arr);
        match back.as_ref() {
            Value::Array(items) => {
                let items = items.borrow();
                assert!(values_equal(&items[0], &int_value(1)));
                assert!(values_equal(&items[1], &str_value("a")));
                assert!(matches!(items[2].as_ref(), Value::Null));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_map_roundtrip() {
        let map = map_from_pairs([
            (str_value("a"), int_value(1)),
            (str_value("b"), str_value("two")),
        ]);
        let back = roundtrip(map);
        match back.as_ref() {
            Value::Map(pairs) => assert_eq!(pairs.borrow().len(), 2),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_unencodable_returns_error_value() {
        let module = super::module();
        let result = encode(&[module]).unwrap();
        assert!(matches!(result.as_ref(), Value::Error(_)));
    }

    #[test]
    fn test_decode_bad_input_returns_error_value() {
        let result = decode(&[str_value("{nope")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Error(_)));
    }
}
