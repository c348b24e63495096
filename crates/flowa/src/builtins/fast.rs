//! Native fast-path builtins for tight numeric loops.
//!
//! These run entirely in host arithmetic: no per-iteration Value allocation,
//! which is the point of having them in the table.

use crate::{
    error::{RunResult, RuntimeError},
    value::{array_value, int_value, str_value, Value, ValueRef},
};

/// `fast_sum_to(n)` — the sum of `0..n` (exclusive upper bound).
pub fn builtin_fast_sum_to(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [arg] = args else {
        return Err(RuntimeError::new(format!(
            "fast_sum_to() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    let Value::Int(n) = arg.as_ref() else {
        return Err(RuntimeError::new(format!(
            "fast_sum_to() requires an Integer, got {}",
            arg.type_name()
        )));
    };
    Ok(int_value(sum_range(0, *n)))
}

/// `fast_sum_range(a, b)` — the sum of `a..b` (exclusive upper bound), so
/// `fast_sum_range(0, n) == fast_sum_to(n)`.
pub fn builtin_fast_sum_range(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [start, end] = args else {
        return Err(RuntimeError::new(format!(
            "fast_sum_range() takes exactly 2 arguments, got {}",
            args.len()
        )));
    };
    let (Value::Int(a), Value::Int(b)) = (start.as_ref(), end.as_ref()) else {
        return Err(RuntimeError::new("fast_sum_range() requires Integer bounds"));
    };
    Ok(int_value(sum_range(*a, *b)))
}

fn sum_range(start: i64, end: i64) -> i64 {
    let mut total = 0i64;
    let mut i = start;
    while i < end {
        total = total.wrapping_add(i);
        i += 1;
    }
    total
}

/// `fast_repeat(value, n)` — a String repeated n times, or an Array of n
/// shared copies of the value.
pub fn builtin_fast_repeat(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [value, count] = args else {
        return Err(RuntimeError::new(format!(
            "fast_repeat() takes exactly 2 arguments, got {}",
            args.len()
        )));
    };
    let Value::Int(n) = count.as_ref() else {
        return Err(RuntimeError::new(format!(
            "fast_repeat() count must be an Integer, got {}",
            count.type_name()
        )));
    };
    if *n < 0 {
        return Err(RuntimeError::new("fast_repeat() count must be non-negative"));
    }
    let n = usize::try_from(*n).map_err(|_| RuntimeError::new("fast_repeat() count too large"))?;
    match value.as_ref() {
        Value::Str(s) => Ok(str_value(s.repeat(n))),
        _ => Ok(array_value(vec![value.clone(); n])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_sum_to() {
        let result = builtin_fast_sum_to(&[int_value(10)]).unwrap();
        assert!(matches!(result.as_ref(), Value::Int(45)));
        let zero = builtin_fast_sum_to(&[int_value(0)]).unwrap();
        assert!(matches!(zero.as_ref(), Value::Int(0)));
    }

    #[test]
    fn test_fast_sum_range_matches_sum_to() {
        let a = builtin_fast_sum_range(&[int_value(0), int_value(100)]).unwrap();
        let b = builtin_fast_sum_to(&[int_value(100)]).unwrap();
        assert!(crate::value::values_equal(&a, &b));
    }

    #[test]
    fn test_fast_repeat_string() {
        let result = builtin_fast_repeat(&[str_value("ab"), int_value(3)]).unwrap();
        assert!(matches!(result.as_ref(), Value::Str(s) if s == "ababab"));
    }

    #[test]
    fn test_fast_repeat_array() {
        let result = builtin_fast_repeat(&[int_value(7), int_value(4)]).unwrap();
        match result.as_ref() {
            Value::Array(items) => assert_eq!(items.borrow().len(), 4),
            other => panic!("expected array, got {other:?}"),
        }
    }
}
