//! The `config` builtin module: process environment access.

use crate::{
    error::{RunResult, RuntimeError},
    value::{null_value, str_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

pub(crate) fn module() -> ValueRef {
    module_of(
        "config",
        &[("get", NativeFn::ConfigGet), ("get_or", NativeFn::ConfigGetOr)],
    )
}

fn name_arg<'a>(args: &'a [ValueRef], func: &str, arity: usize) -> RunResult<&'a str> {
    if args.len() != arity {
        return Err(RuntimeError::new(format!(
            "config.{func}() takes exactly {arity} argument(s), got {}",
            args.len()
        )));
    }
    match args[0].as_ref() {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::new(format!(
            "config.{func}() name must be a String, got {}",
            other.type_name()
        ))),
    }
}

/// `config.get(name) -> String | Null`
pub fn get(args: &[ValueRef]) -> RunResult<ValueRef> {
    let name = name_arg(args, "get", 1)?;
    match std::env::var(name) {
        Ok(value) => Ok(str_value(value)),
        Err(_) => Ok(null_value()),
    }
}

/// `config.get_or(name, default) -> String`
pub fn get_or(args: &[ValueRef]) -> RunResult<ValueRef> {
    let name = name_arg(args, "get_or", 2)?;
    match std::env::var(name) {
        Ok(value) => Ok(str_value(value)),
        Err(_) => Ok(args[1].clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_returns_null() {
        let result = get(&[str_value("FLOWA_TEST_UNSET_VARIABLE")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Null));
    }

    #[test]
    fn test_get_or_falls_back() {
        let fallback = str_value("default");
        let result = get_or(&[str_value("FLOWA_TEST_UNSET_VARIABLE"), fallback.clone()]).unwrap();
        assert!(crate::value::values_equal(&result, &fallback));
    }
}
