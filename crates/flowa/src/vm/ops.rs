//! Value operations shared by the dispatch loop and its fused instructions.
//!
//! Every function here implements the exact semantics of one opcode family
//! so the fused instructions (`IncLocal`, `AddLocal`, the fused loop check)
//! can reuse them and stay observably identical to their unfused forms.

use crate::{
    error::{RunResult, RuntimeError},
    value::{
        bool_value, float_value, int_value, map_lookup_str, null_value, str_value, values_equal, MapKey, Value,
        ValueRef,
    },
};

/// `+` — numeric addition with Int→Float promotion; if either side is a
/// String the other side coerces to its decimal/display text and the result
/// is the concatenation. Integer overflow wraps.
pub fn add(left: &ValueRef, right: &ValueRef) -> RunResult<ValueRef> {
    match (left.as_ref(), right.as_ref()) {
        (Value::Int(a), Value::Int(b)) => Ok(int_value(a.wrapping_add(*b))),
        (Value::Float(a), Value::Float(b)) => Ok(float_value(a + b)),
        (Value::Int(a), Value::Float(b)) => Ok(float_value(*a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(float_value(a + *b as f64)),
        (Value::Str(a), Value::Str(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(str_value(out))
        }
        (Value::Str(a), other) => Ok(str_value(format!("{a}{other}"))),
        (other, Value::Str(b)) => Ok(str_value(format!("{other}{b}"))),
        (a, b) => Err(RuntimeError::new(format!(
            "unsupported operand types for +: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// `-` with wrapping integer arithmetic and Float promotion.
pub fn sub(left: &ValueRef, right: &ValueRef) -> RunResult<ValueRef> {
    match (left.as_ref(), right.as_ref()) {
        (Value::Int(a), Value::Int(b)) => Ok(int_value(a.wrapping_sub(*b))),
        (Value::Float(a), Value::Float(b)) => Ok(float_value(a - b)),
        (Value::Int(a), Value::Float(b)) => Ok(float_value(*a as f64 - b)),
        (Value::Float(a), Value::Int(b)) => Ok(float_value(a - *b as f64)),
        (a, b) => Err(RuntimeError::new(format!(
            "unsupported operand types for -: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// `*` with wrapping integer arithmetic and Float promotion.
pub fn mul(left: &ValueRef, right: &ValueRef) -> RunResult<ValueRef> {
    match (left.as_ref(), right.as_ref()) {
        (Value::Int(a), Value::Int(b)) => Ok(int_value(a.wrapping_mul(*b))),
        (Value::Float(a), Value::Float(b)) => Ok(float_value(a * b)),
        (Value::Int(a), Value::Float(b)) => Ok(float_value(*a as f64 * b)),
        (Value::Float(a), Value::Int(b)) => Ok(float_value(a * *b as f64)),
        (a, b) => Err(RuntimeError::new(format!(
            "unsupported operand types for *: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// `/` — integer division truncates; integer division by zero is fatal.
/// Float division follows IEEE-754.
pub fn div(left: &ValueRef, right: &ValueRef) -> RunResult<ValueRef> {
    match (left.as_ref(), right.as_ref()) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(RuntimeError::new("division by zero"));
            }
            Ok(int_value(a.wrapping_div(*b)))
        }
        (Value::Float(a), Value::Float(b)) => Ok(float_value(a / b)),
        (Value::Int(a), Value::Float(b)) => Ok(float_value(*a as f64 / b)),
        (Value::Float(a), Value::Int(b)) => Ok(float_value(a / *b as f64)),
        (a, b) => Err(RuntimeError::new(format!(
            "unsupported operand types for /: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Strict weak ordering for `<`, `>`, `<=`, `>=`. Numbers compare with
/// promotion; strings compare by content.
fn ordering(left: &ValueRef, right: &ValueRef) -> RunResult<std::cmp::Ordering> {
    use std::cmp::Ordering;
    let ord = match (left.as_ref(), right.as_ref()) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (a, b) => {
            return Err(RuntimeError::new(format!(
                "cannot order {} and {}",
                a.type_name(),
                b.type_name()
            )));
        }
    };
    Ok(ord)
}

/// `<` — shared by `LessThan` and the fused loop check.
pub fn less_than(left: &ValueRef, right: &ValueRef) -> RunResult<bool> {
    Ok(ordering(left, right)? == std::cmp::Ordering::Less)
}

pub fn less_equal(left: &ValueRef, right: &ValueRef) -> RunResult<bool> {
    Ok(ordering(left, right)? != std::cmp::Ordering::Greater)
}

pub fn greater_than(left: &ValueRef, right: &ValueRef) -> RunResult<bool> {
    Ok(ordering(left, right)? == std::cmp::Ordering::Greater)
}

pub fn greater_equal(left: &ValueRef, right: &ValueRef) -> RunResult<bool> {
    Ok(ordering(left, right)? != std::cmp::Ordering::Less)
}

/// `==` / `!=` — content equality for numbers/strings/booleans/null,
/// identity otherwise. Results are the shared Boolean singletons.
pub fn equal(left: &ValueRef, right: &ValueRef, negate: bool) -> ValueRef {
    bool_value(values_equal(left, right) != negate)
}

/// In-place step for `IncLocal`/`DecLocal`/`PostfixInc`/`PostfixDec`.
pub fn step(value: &ValueRef, delta: i64) -> RunResult<ValueRef> {
    match value.as_ref() {
        Value::Int(n) => Ok(int_value(n.wrapping_add(delta))),
        Value::Float(f) => Ok(float_value(f + delta as f64)),
        other => Err(RuntimeError::new(format!(
            "cannot increment or decrement {}",
            other.type_name()
        ))),
    }
}

/// `left[index]` for Array, Map, and Module values.
pub fn index(left: &ValueRef, idx: &ValueRef) -> RunResult<ValueRef> {
    match left.as_ref() {
        Value::Array(items) => {
            let Value::Int(i) = idx.as_ref() else {
                return Err(RuntimeError::new(format!(
                    "array index must be an Integer, got {}",
                    idx.type_name()
                )));
            };
            // Out of bounds (including negative) yields Null, not an error.
            let Ok(i) = usize::try_from(*i) else {
                return Ok(null_value());
            };
            Ok(items.borrow().get(i).cloned().unwrap_or_else(null_value))
        }
        Value::Map(pairs) => {
            let key = MapKey::from_value(idx);
            Ok(pairs.borrow().get(&key).map(|p| p.value.clone()).unwrap_or_else(null_value))
        }
        Value::Module(module) => {
            let Value::Str(name) = idx.as_ref() else {
                return Err(RuntimeError::new(format!(
                    "module member name must be a String, got {}",
                    idx.type_name()
                )));
            };
            module
                .get(name)
                .ok_or_else(|| RuntimeError::new(format!("module `{}` has no member `{name}`", module.name)))
        }
        other => Err(RuntimeError::new(format!("{} is not indexable", other.type_name()))),
    }
}

/// Renders a value for HTTP responses and similar host boundaries. Error
/// values keep their message; used by the serve loop.
#[must_use]
pub fn response_parts(value: &ValueRef) -> (i64, String, String) {
    if let Some(status) = map_lookup_str(value, "status") {
        if let Value::Int(code) = status.as_ref() {
            let body = map_lookup_str(value, "body")
                .map(|b| b.to_string())
                .unwrap_or_default();
            let content_type = map_lookup_str(value, "content_type")
                .map(|c| c.to_string())
                .unwrap_or_else(|| "text/plain; charset=utf-8".to_owned());
            return (*code, content_type, body);
        }
    }
    match value.as_ref() {
        Value::Str(s) => (200, "text/plain; charset=utf-8".to_owned(), s.clone()),
        Value::Error(msg) => (500, "text/plain; charset=utf-8".to_owned(), msg.clone()),
        Value::Null => (204, "text/plain; charset=utf-8".to_owned(), String::new()),
        other => {
            let encoded = crate::modules::json::encode(&[value.clone()]);
            match encoded {
                Ok(v) => match v.as_ref() {
                    Value::Str(s) => (200, "application/json".to_owned(), s.clone()),
                    _ => (500, "text/plain; charset=utf-8".to_owned(), format!("unrenderable response: {other}")),
                },
                Err(_) => (500, "text/plain; charset=utf-8".to_owned(), format!("unrenderable response: {other}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_promotes_and_concatenates() {
        let r = add(&int_value(1), &int_value(2)).unwrap();
        assert!(matches!(r.as_ref(), Value::Int(3)));
        let r = add(&int_value(1), &float_value(0.5)).unwrap();
        assert!(matches!(r.as_ref(), Value::Float(f) if *f == 1.5));
        let r = add(&str_value("n="), &int_value(4)).unwrap();
        assert!(matches!(r.as_ref(), Value::Str(s) if s == "n=4"));
        let r = add(&int_value(4), &str_value("!")).unwrap();
        assert!(matches!(r.as_ref(), Value::Str(s) if s == "4!"));
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let r = add(&int_value(i64::MAX), &int_value(1)).unwrap();
        assert!(matches!(r.as_ref(), Value::Int(n) if *n == i64::MIN));
    }

    #[test]
    fn test_integer_division_truncates_and_checks_zero() {
        let r = div(&int_value(20), &int_value(4)).unwrap();
        assert!(matches!(r.as_ref(), Value::Int(5)));
        let r = div(&int_value(7), &int_value(2)).unwrap();
        assert!(matches!(r.as_ref(), Value::Int(3)));
        assert!(div(&int_value(1), &int_value(0)).is_err());
    }

    #[test]
    fn test_orderings() {
        assert!(less_than(&int_value(1), &int_value(2)).unwrap());
        assert!(greater_equal(&int_value(2), &int_value(2)).unwrap());
        assert!(less_than(&str_value("a"), &str_value("b")).unwrap());
        assert!(less_than(&int_value(1), &float_value(1.5)).unwrap());
        assert!(ordering(&null_value(), &int_value(1)).is_err());
    }

    #[test]
    fn test_array_index_out_of_bounds_is_null() {
        let arr = crate::value::array_value(vec![int_value(10), int_value(20)]);
        let r = index(&arr, &int_value(99)).unwrap();
        assert!(matches!(r.as_ref(), Value::Null));
        let r = index(&arr, &int_value(-1)).unwrap();
        assert!(matches!(r.as_ref(), Value::Null));
        let r = index(&arr, &int_value(1)).unwrap();
        assert!(matches!(r.as_ref(), Value::Int(20)));
    }

    #[test]
    fn test_map_missing_key_is_null() {
        let map = crate::value::map_from_pairs([(str_value("a"), int_value(1))]);
        let r = index(&map, &str_value("b")).unwrap();
        assert!(matches!(r.as_ref(), Value::Null));
    }
}
