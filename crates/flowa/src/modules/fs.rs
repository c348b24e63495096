//! The `fs` builtin module: read, write, append, exists.
//!
//! I/O failures surface as Error values so scripts can test for them;
//! argument-shape mistakes are fatal like every other builtin.

use std::fs as host_fs;
use std::io::Write as _;

use crate::{
    error::{RunResult, RuntimeError},
    value::{bool_value, error_value, str_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

pub(crate) fn module() -> ValueRef {
    module_of(
        "fs",
        &[
            ("read", NativeFn::FsRead),
            ("write", NativeFn::FsWrite),
            ("append", NativeFn::FsAppend),
            ("exists", NativeFn::FsExists),
        ],
    )
}

fn path_arg<'a>(args: &'a [ValueRef], func: &str, arity: usize) -> RunResult<&'a str> {
    if args.len() != arity {
        return Err(RuntimeError::new(format!(
            "fs.{func}() takes exactly {arity} argument(s), got {}",
            args.len()
        )));
    }
    match args[0].as_ref() {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::new(format!(
            "fs.{func}() path must be a String, got {}",
            other.type_name()
        ))),
    }
}

fn text_arg<'a>(args: &'a [ValueRef], func: &str) -> RunResult<&'a str> {
    match args[1].as_ref() {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::new(format!(
            "fs.{func}() content must be a String, got {}",
            other.type_name()
        ))),
    }
}

/// `fs.read(path) -> String | Error`
pub fn read(args: &[ValueRef]) -> RunResult<ValueRef> {
    let path = path_arg(args, "read", 1)?;
    match host_fs::read_to_string(path) {
        Ok(text) => Ok(str_value(text)),
        Err(e) => Ok(error_value(format!("fs.read: {path}: {e}"))),
    }
}

/// `fs.write(path, text) -> Boolean | Error`
pub fn write(args: &[ValueRef]) -> RunResult<ValueRef> {
    let path = path_arg(args, "write", 2)?;
    let text = text_arg(args, "write")?;
    match host_fs::write(path, text) {
        Ok(()) => Ok(bool_value(true)),
        Err(e) => Ok(error_value(format!("fs.write: {path}: {e}"))),
    }
}

/// `fs.append(path, text) -> Boolean | Error`
pub fn append(args: &[ValueRef]) -> RunResult<ValueRef> {
    let path = path_arg(args, "append", 2)?;
    let text = text_arg(args, "append")?;
    let result = host_fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(text.as_bytes()));
    match result {
        Ok(()) => Ok(bool_value(true)),
        Err(e) => Ok(error_value(format!("fs.append: {path}: {e}"))),
    }
}

/// `fs.exists(path) -> Boolean`
pub fn exists(args: &[ValueRef]) -> RunResult<ValueRef> {
    let path = path_arg(args, "exists", 1)?;
    Ok(bool_value(std::path::Path::new(path).exists()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_append_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path_str = path.to_str().unwrap();

        write(&[str_value(path_str), str_value("one\n")]).unwrap();
        append(&[str_value(path_str), str_value("two\n")]).unwrap();
        let content = read(&[str_value(path_str)]).unwrap();
        assert!(matches!(content.as_ref(), Value::Str(s) if s == "one\ntwo\n"));

        let exists_result = exists(&[str_value(path_str)]).unwrap();
        assert!(matches!(exists_result.as_ref(), Value::Bool(true)));
    }

    #[test]
    fn test_read_missing_file_is_error_value() {
        let result = read(&[str_value("/definitely/not/here.txt")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Error(_)));
    }
}
