//! Host functions reached through the module-shaped builtins.
//!
//! Each module-shaped builtin (`json`, `fs`, `http`, ...) hands out a Module
//! value whose exports are `NativeFn` values. Calling one lands in
//! `call_native`, which dispatches to the per-module implementations.

pub mod auth;
pub mod config;
pub mod fs;
pub mod http;
pub mod json;
pub mod jwt;
pub mod mail;
pub mod response;
pub mod websocket;

use std::rc::Rc;

use ahash::AHashMap;
use strum::{Display, IntoStaticStr};

use crate::{
    error::RunResult,
    value::{ModuleValue, Value, ValueRef},
};

/// Every host function exposed through a builtin module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum NativeFn {
    #[strum(serialize = "json.encode")]
    JsonEncode,
    #[strum(serialize = "json.decode")]
    JsonDecode,
    #[strum(serialize = "fs.read")]
    FsRead,
    #[strum(serialize = "fs.write")]
    FsWrite,
    #[strum(serialize = "fs.append")]
    FsAppend,
    #[strum(serialize = "fs.exists")]
    FsExists,
    #[strum(serialize = "http.get")]
    HttpGet,
    #[strum(serialize = "http.post")]
    HttpPost,
    #[strum(serialize = "config.get")]
    ConfigGet,
    #[strum(serialize = "config.get_or")]
    ConfigGetOr,
    #[strum(serialize = "auth.hash")]
    AuthHash,
    #[strum(serialize = "auth.verify")]
    AuthVerify,
    #[strum(serialize = "jwt.sign")]
    JwtSign,
    #[strum(serialize = "jwt.verify")]
    JwtVerify,
    #[strum(serialize = "mail.send")]
    MailSend,
    #[strum(serialize = "response.json")]
    ResponseJson,
    #[strum(serialize = "response.html")]
    ResponseHtml,
    #[strum(serialize = "response.text")]
    ResponseText,
    #[strum(serialize = "response.status")]
    ResponseStatus,
    #[strum(serialize = "websocket.send")]
    WebsocketSend,
    #[strum(serialize = "websocket.on")]
    WebsocketOn,
}

/// Dispatches a call to a module host function.
pub fn call_native(func: NativeFn, args: &[ValueRef]) -> RunResult<ValueRef> {
    match func {
        NativeFn::JsonEncode => json::encode(args),
        NativeFn::JsonDecode => json::decode(args),
        NativeFn::FsRead => fs::read(args),
        NativeFn::FsWrite => fs::write(args),
        NativeFn::FsAppend => fs::append(args),
        NativeFn::FsExists => fs::exists(args),
        NativeFn::HttpGet => http::get(args),
        NativeFn::HttpPost => http::post(args),
        NativeFn::ConfigGet => config::get(args),
        NativeFn::ConfigGetOr => config::get_or(args),
        NativeFn::AuthHash => auth::hash(args),
        NativeFn::AuthVerify => auth::verify(args),
        NativeFn::JwtSign => jwt::sign(args),
        NativeFn::JwtVerify => jwt::verify(args),
        NativeFn::MailSend => mail::send(args),
        NativeFn::ResponseJson => response::json_response(args),
        NativeFn::ResponseHtml => response::html(args),
        NativeFn::ResponseText => response::text(args),
        NativeFn::ResponseStatus => response::status(args),
        NativeFn::WebsocketSend => websocket::send(args),
        NativeFn::WebsocketOn => websocket::on(args),
    }
}

/// Builds a Module value from `(export name, function)` pairs.
pub(crate) fn module_of(name: &str, entries: &[(&str, NativeFn)]) -> ValueRef {
    let mut exports = AHashMap::with_capacity(entries.len());
    for (export, func) in entries {
        exports.insert((*export).to_owned(), Rc::new(Value::NativeFn(*func)) as ValueRef);
    }
    Rc::new(Value::Module(Rc::new(ModuleValue {
        name: name.to_owned(),
        exports,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_construction() {
        let module = module_of("json", &[("encode", NativeFn::JsonEncode)]);
        match module.as_ref() {
            Value::Module(m) => {
                assert_eq!(m.name, "json");
                assert!(m.get("encode").is_some());
                assert!(m.get("nope").is_none());
            }
            other => panic!("expected module, got {other:?}"),
        }
    }

    #[test]
    fn test_native_fn_display() {
        assert_eq!(NativeFn::JsonEncode.to_string(), "json.encode");
        assert_eq!(NativeFn::ConfigGetOr.to_string(), "config.get_or");
    }
}
