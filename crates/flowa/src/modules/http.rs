//! The `http` builtin module: outbound client requests via `ureq`.
//!
//! Responses come back as a Map `{"status": Integer, "body": String}`.
//! Transport failures return Error values; a non-2xx status is still a
//! response, not an error.

use crate::{
    error::{RunResult, RuntimeError},
    value::{error_value, int_value, map_from_pairs, str_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

pub(crate) fn module() -> ValueRef {
    module_of("http", &[("get", NativeFn::HttpGet), ("post", NativeFn::HttpPost)])
}

fn url_arg<'a>(args: &'a [ValueRef], func: &str, arity: usize) -> RunResult<&'a str> {
    if args.len() != arity {
        return Err(RuntimeError::new(format!(
            "http.{func}() takes exactly {arity} argument(s), got {}",
            args.len()
        )));
    }
    match args[0].as_ref() {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::new(format!(
            "http.{func}() url must be a String, got {}",
            other.type_name()
        ))),
    }
}

fn response_map(status: u16, body: String) -> ValueRef {
    map_from_pairs([
        (str_value("status"), int_value(i64::from(status))),
        (str_value("body"), str_value(body)),
    ])
}

/// `http.get(url) -> Map | Error`
pub fn get(args: &[ValueRef]) -> RunResult<ValueRef> {
    let url = url_arg(args, "get", 1)?;
    match ureq::get(url).call() {
        Ok(response) => {
            let status = response.status();
            let body = response.into_string().unwrap_or_default();
            Ok(response_map(status, body))
        }
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Ok(response_map(status, body))
        }
        Err(e) => Ok(error_value(format!("http.get: {e}"))),
    }
}

/// `http.post(url, body) -> Map | Error`
pub fn post(args: &[ValueRef]) -> RunResult<ValueRef> {
    let url = url_arg(args, "post", 2)?;
    let Value::Str(body) = args[1].as_ref() else {
        return Err(RuntimeError::new(format!(
            "http.post() body must be a String, got {}",
            args[1].type_name()
        )));
    };
    match ureq::post(url).send_string(body) {
        Ok(response) => {
            let status = response.status();
            let text = response.into_string().unwrap_or_default();
            Ok(response_map(status, text))
        }
        Err(ureq::Error::Status(status, response)) => {
            let text = response.into_string().unwrap_or_default();
            Ok(response_map(status, text))
        }
        Err(e) => Ok(error_value(format!("http.post: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_host_is_error_value() {
        // Reserved TLD per RFC 2606; never resolves.
        let result = get(&[str_value("http://unreachable.invalid/")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Error(_)));
    }

    #[test]
    fn test_bad_arity_is_fatal() {
        assert!(get(&[]).is_err());
    }
}
