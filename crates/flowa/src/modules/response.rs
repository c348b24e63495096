//! The `response` builtin module: helpers that build response Maps for HTTP
//! handlers. Pure value construction, no I/O.
//!
//! A response Map carries `status` (Integer), `body` (String), and
//! `content_type` (String); the serve loop renders these into the wire
//! response.

use crate::{
    error::{RunResult, RuntimeError},
    modules::json,
    value::{int_value, map_from_pairs, str_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

pub(crate) fn module() -> ValueRef {
    module_of(
        "response",
        &[
            ("json", NativeFn::ResponseJson),
            ("html", NativeFn::ResponseHtml),
            ("text", NativeFn::ResponseText),
            ("status", NativeFn::ResponseStatus),
        ],
    )
}

fn build(status: i64, content_type: &str, body: String) -> ValueRef {
    map_from_pairs([
        (str_value("status"), int_value(status)),
        (str_value("body"), str_value(body)),
        (str_value("content_type"), str_value(content_type)),
    ])
}

/// `response.json(value)` — 200 with the value JSON-encoded.
pub fn json_response(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [value] = args else {
        return Err(RuntimeError::new(format!(
            "response.json() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    let encoded = json::encode(std::slice::from_ref(value))?;
    match encoded.as_ref() {
        Value::Str(body) => Ok(build(200, "application/json", body.clone())),
        // json.encode produced an Error value; pass it through.
        _ => Ok(encoded),
    }
}

/// `response.html(text)` — 200 with an HTML body.
pub fn html(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [body] = args else {
        return Err(RuntimeError::new(format!(
            "response.html() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    let Value::Str(text) = body.as_ref() else {
        return Err(RuntimeError::new(format!(
            "response.html() body must be a String, got {}",
            body.type_name()
        )));
    };
    Ok(build(200, "text/html; charset=utf-8", text.clone()))
}

/// `response.text(body)` — 200 with a plain-text body.
pub fn text(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [body] = args else {
        return Err(RuntimeError::new(format!(
            "response.text() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    let Value::Str(content) = body.as_ref() else {
        return Err(RuntimeError::new(format!(
            "response.text() body must be a String, got {}",
            body.type_name()
        )));
    };
    Ok(build(200, "text/plain; charset=utf-8", content.clone()))
}

/// `response.status(code, body)` — explicit status with a plain-text body.
pub fn status(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [code, body] = args else {
        return Err(RuntimeError::new(format!(
            "response.status() takes exactly 2 arguments, got {}",
            args.len()
        )));
    };
    let Value::Int(code) = code.as_ref() else {
        return Err(RuntimeError::new(format!(
            "response.status() code must be an Integer, got {}",
            code.type_name()
        )));
    };
    let Value::Str(content) = body.as_ref() else {
        return Err(RuntimeError::new(format!(
            "response.status() body must be a String, got {}",
            body.type_name()
        )));
    };
    Ok(build(*code, "text/plain; charset=utf-8", content.clone()))
}
