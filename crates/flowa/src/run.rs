//! Public interface for running Flowa programs.
//!
//! `Runner` front-loads the pipeline: parse and compile once, then execute
//! any number of times against fresh VM state. Parse diagnostics are
//! reported together; compilation stops at the first error; execution
//! errors carry the failing instruction pointer.

use std::path::{Path, PathBuf};

use crate::{
    bytecode::Bytecode,
    compiler::Compiler,
    error::FlowaError,
    io::{CollectStringPrint, PrintWriter, StdPrint},
    parser,
    vm::Vm,
};

/// Primary interface for running Flowa code.
///
/// # Example
/// ```
/// use flowa::Runner;
///
/// let runner = Runner::from_source("print(1 + 2 * 3)", ".").unwrap();
/// assert_eq!(runner.run_capture().unwrap(), "7\n");
/// ```
#[derive(Debug)]
pub struct Runner {
    bytecode: Bytecode,
    base_dir: PathBuf,
    serve_limit: Option<usize>,
}

impl Runner {
    /// Parses and compiles a source string. `base_dir` is the directory
    /// import paths resolve against.
    pub fn from_source(source: &str, base_dir: impl Into<PathBuf>) -> Result<Self, FlowaError> {
        let base_dir = base_dir.into();
        let program = parser::parse(source).map_err(FlowaError::Parse)?;
        let mut compiler = Compiler::new();
        compiler.set_base_dir(&base_dir);
        let bytecode = compiler.compile(&program)?;
        Ok(Self {
            bytecode,
            base_dir,
            serve_limit: None,
        })
    }

    /// Reads, parses, and compiles a `.flowa` file. Imports resolve
    /// relative to the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowaError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            FlowaError::Compile(crate::error::CompileError::new(format!(
                "cannot read `{}`: {e}",
                path.display()
            )))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        Self::from_source(&source, base_dir)
    }

    /// Bounds the number of requests a `listen` call serves. Testing hook;
    /// `None` (the default) blocks indefinitely.
    pub fn set_serve_limit(&mut self, limit: Option<usize>) {
        self.serve_limit = limit;
    }

    /// The compiled program.
    #[must_use]
    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    /// Executes with output going to stdout.
    pub fn run(&self) -> Result<(), FlowaError> {
        let mut print = StdPrint::new();
        self.run_with(&mut print)
    }

    /// Executes and returns everything the program printed.
    pub fn run_capture(&self) -> Result<String, FlowaError> {
        let mut print = CollectStringPrint::new();
        self.run_with(&mut print)?;
        Ok(print.into_output())
    }

    /// Executes with a caller-supplied print writer.
    pub fn run_with(&self, print: &mut dyn PrintWriter) -> Result<(), FlowaError> {
        let mut vm = Vm::new(&self.bytecode, print)
            .with_base_dir(&self.base_dir)
            .with_serve_limit(self.serve_limit);
        vm.run()?;
        debug_assert_eq!(
            vm.stack_depth(),
            usize::from(self.bytecode.main_locals),
            "stack imbalance after normal termination"
        );
        debug_assert_eq!(vm.frames_depth(), 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_collected() {
        let err = Runner::from_source("x = \nz ==\n", ".").unwrap_err();
        match err {
            FlowaError::Parse(errors) => assert!(errors.len() >= 2),
            other => panic!("expected parse errors, got {other}"),
        }
    }

    #[test]
    fn test_compile_error_stops_at_first() {
        let err = Runner::from_source("x = missing", ".").unwrap_err();
        match err {
            FlowaError::Compile(e) => assert!(e.message.contains("undefined identifier")),
            other => panic!("expected compile error, got {other}"),
        }
    }

    #[test]
    fn test_runtime_error_reports_ip() {
        let runner = Runner::from_source("x = 1\ny = 0\nprint(x / y)", ".").unwrap();
        let err = runner.run_capture().unwrap_err();
        match err {
            FlowaError::Runtime(e) => {
                assert!(e.message.contains("division by zero"));
                assert!(e.ip.is_some());
            }
            other => panic!("expected runtime error, got {other}"),
        }
    }
}
