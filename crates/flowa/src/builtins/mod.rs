//! The fixed-index builtin table.
//!
//! Indices are a stable ABI shared between the compiler and the VM: the
//! compiler emits `GetBuiltin` with the `#[repr(u8)]` discriminant, and the
//! VM's table is built in the same order. Reordering this enum is a breaking
//! change.
//!
//! `route`, `listen`, and `middleware` are VM-aware: the dispatch loop
//! intercepts calls to them to reach its route table. Everything else is an
//! opaque callable or a module of host functions.

mod fast;
mod len;
mod print;

use std::rc::Rc;

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

use crate::{
    error::{RunResult, RuntimeError},
    io::PrintWriter,
    modules,
    value::{int_value, Value, ValueRef},
};
pub use fast::{builtin_fast_repeat, builtin_fast_sum_range, builtin_fast_sum_to};
pub use len::builtin_len;
pub use print::builtin_print;

/// Entries of the builtin table, in ABI order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Print = 0,
    Len,
    Time,
    Auth,
    Json,
    Http,
    Fs,
    Response,
    Websocket,
    Mail,
    Jwt,
    Config,
    FastSumTo,
    FastSumRange,
    FastRepeat,
    Route,
    Listen,
    Middleware,
}

impl Builtin {
    /// Every table entry, in index order.
    #[must_use]
    pub fn all() -> [Self; 18] {
        [
            Self::Print,
            Self::Len,
            Self::Time,
            Self::Auth,
            Self::Json,
            Self::Http,
            Self::Fs,
            Self::Response,
            Self::Websocket,
            Self::Mail,
            Self::Jwt,
            Self::Config,
            Self::FastSumTo,
            Self::FastSumRange,
            Self::FastRepeat,
            Self::Route,
            Self::Listen,
            Self::Middleware,
        ]
    }

    /// The name the symbol table seeds for this entry.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// True for the builtins the VM handles itself.
    #[must_use]
    pub fn is_vm_aware(self) -> bool {
        matches!(self, Self::Route | Self::Listen | Self::Middleware)
    }
}

/// Builds the VM's builtin table. Module-shaped entries construct their
/// export maps once here.
#[must_use]
pub fn table() -> Vec<ValueRef> {
    Builtin::all()
        .into_iter()
        .map(|b| match b {
            Builtin::Auth => modules::auth::module(),
            Builtin::Json => modules::json::module(),
            Builtin::Http => modules::http::module(),
            Builtin::Fs => modules::fs::module(),
            Builtin::Response => modules::response::module(),
            Builtin::Websocket => modules::websocket::module(),
            Builtin::Mail => modules::mail::module(),
            Builtin::Jwt => modules::jwt::module(),
            Builtin::Config => modules::config::module(),
            other => Rc::new(Value::Builtin(other)),
        })
        .collect()
}

/// Dispatches a call to a plain (non-VM-aware) builtin.
pub fn call_builtin(builtin: Builtin, args: &[ValueRef], print: &mut dyn PrintWriter) -> RunResult<ValueRef> {
    match builtin {
        Builtin::Print => builtin_print(args, print),
        Builtin::Len => builtin_len(args),
        Builtin::Time => builtin_time(args),
        Builtin::FastSumTo => builtin_fast_sum_to(args),
        Builtin::FastSumRange => builtin_fast_sum_range(args),
        Builtin::FastRepeat => builtin_fast_repeat(args),
        Builtin::Route | Builtin::Listen | Builtin::Middleware => Err(RuntimeError::new(format!(
            "`{builtin}` is handled by the virtual machine and cannot be called detached"
        ))),
        // Module-shaped entries are never callable values; the table hands
        // out Module values for them instead.
        other => Err(RuntimeError::new(format!("`{other}` is a module, not a function"))),
    }
}

/// `time()` — milliseconds since the Unix epoch.
fn builtin_time(args: &[ValueRef]) -> RunResult<ValueRef> {
    if !args.is_empty() {
        return Err(RuntimeError::new(format!("time() takes no arguments, got {}", args.len())));
    }
    Ok(int_value(chrono::Utc::now().timestamp_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_indices_are_stable() {
        assert_eq!(Builtin::Print as u8, 0);
        assert_eq!(Builtin::Len as u8, 1);
        assert_eq!(Builtin::Time as u8, 2);
        assert_eq!(Builtin::Auth as u8, 3);
        assert_eq!(Builtin::Json as u8, 4);
        assert_eq!(Builtin::Http as u8, 5);
        assert_eq!(Builtin::Fs as u8, 6);
        assert_eq!(Builtin::Response as u8, 7);
        assert_eq!(Builtin::Websocket as u8, 8);
        assert_eq!(Builtin::Mail as u8, 9);
        assert_eq!(Builtin::Jwt as u8, 10);
        assert_eq!(Builtin::Config as u8, 11);
        assert_eq!(Builtin::FastSumTo as u8, 12);
        assert_eq!(Builtin::FastSumRange as u8, 13);
        assert_eq!(Builtin::FastRepeat as u8, 14);
        assert_eq!(Builtin::Route as u8, 15);
        assert_eq!(Builtin::Listen as u8, 16);
        assert_eq!(Builtin::Middleware as u8, 17);
    }

    #[test]
    fn test_names_match_source_spelling() {
        assert_eq!(Builtin::FastSumTo.name(), "fast_sum_to");
        assert_eq!(Builtin::Print.name(), "print");
        assert_eq!(Builtin::Middleware.name(), "middleware");
    }

    #[test]
    fn test_table_covers_every_index() {
        let table = table();
        assert_eq!(table.len(), 18);
        assert!(matches!(table[0].as_ref(), Value::Builtin(Builtin::Print)));
        assert!(matches!(table[4].as_ref(), Value::Module(_)));
        assert!(matches!(table[11].as_ref(), Value::Module(_)));
        assert!(matches!(table[17].as_ref(), Value::Builtin(Builtin::Middleware)));
    }
}
