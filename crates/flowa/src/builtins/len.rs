//! Implementation of the `len()` builtin.

use crate::{
    error::{RunResult, RuntimeError},
    value::{int_value, Value, ValueRef},
};

/// Length of a String (in characters), Array, or Map.
pub fn builtin_len(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [arg] = args else {
        return Err(RuntimeError::new(format!("len() takes exactly 1 argument, got {}", args.len())));
    };
    let length = match arg.as_ref() {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        Value::Map(pairs) => pairs.borrow().len(),
        other => {
            return Err(RuntimeError::new(format!("len() does not support {}", other.type_name())));
        }
    };
    Ok(int_value(i64::try_from(length).unwrap_or(i64::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{array_value, str_value};

    #[test]
    fn test_len_of_string_counts_chars() {
        let result = builtin_len(&[str_value("héllo")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Int(5)));
    }

    #[test]
    fn test_len_of_array() {
        let arr = array_value(vec![str_value("a"), str_value("b")]);
        let result = builtin_len(&[arr]).unwrap();
        assert!(matches!(result.as_ref(), Value::Int(2)));
    }

    #[test]
    fn test_len_rejects_integers() {
        assert!(builtin_len(&[crate::value::int_value(3)]).is_err());
    }
}
