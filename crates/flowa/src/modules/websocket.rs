//! The `websocket` builtin module.
//!
//! The table slot and calling convention are stable, but this build does not
//! bundle a WebSocket transport; every operation reports that as an Error
//! value so scripts can degrade gracefully.

use crate::{
    error::{RunResult, RuntimeError},
    value::{error_value, ValueRef},
};

use super::{module_of, NativeFn};

pub(crate) fn module() -> ValueRef {
    module_of(
        "websocket",
        &[("send", NativeFn::WebsocketSend), ("on", NativeFn::WebsocketOn)],
    )
}

/// `websocket.send(conn, message)`
pub fn send(args: &[ValueRef]) -> RunResult<ValueRef> {
    if args.len() != 2 {
        return Err(RuntimeError::new(format!(
            "websocket.send() takes exactly 2 arguments, got {}",
            args.len()
        )));
    }
    Ok(error_value("websocket: transport is not bundled in this build"))
}

/// `websocket.on(event, handler)`
pub fn on(args: &[ValueRef]) -> RunResult<ValueRef> {
    if args.len() != 2 {
        return Err(RuntimeError::new(format!(
            "websocket.on() takes exactly 2 arguments, got {}",
            args.len()
        )));
    }
    Ok(error_value("websocket: transport is not bundled in this build"))
}
