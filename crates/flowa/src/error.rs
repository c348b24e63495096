//! Error taxonomy for the Flowa pipeline.
//!
//! Lexical and parse diagnostics accumulate so one pass can report several
//! problems; compilation stops at the first error; runtime errors unwind the
//! VM and surface a single error to the embedder, carrying the instruction
//! pointer of the failing opcode when available.

use std::fmt;

/// A single lexical or syntactic diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// 1-based source line the diagnostic points at.
    pub line: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Compilation aborts on the first of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)
    }
}

/// A fatal execution error. Unwinds every frame; there is no language-level
/// catch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
    /// Instruction pointer of the failing opcode, when the error originated
    /// inside the dispatch loop.
    pub ip: Option<usize>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ip: None,
        }
    }

    /// Attaches the failing instruction pointer if none was recorded yet.
    #[must_use]
    pub fn with_ip(mut self, ip: usize) -> Self {
        if self.ip.is_none() {
            self.ip = Some(ip);
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "runtime error at ip={ip}: {}", self.message),
            None => write!(f, "runtime error: {}", self.message),
        }
    }
}

/// Everything that can go wrong between source text and a finished run.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowaError {
    /// All lexical/syntactic diagnostics from one parse.
    Parse(Vec<ParseError>),
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl fmt::Display for FlowaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "parse error: {err}")?;
                }
                Ok(())
            }
            Self::Compile(err) => err.fmt(f),
            Self::Runtime(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for FlowaError {}

impl From<CompileError> for FlowaError {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<RuntimeError> for FlowaError {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(err)
    }
}

/// Result alias used throughout the VM.
pub type RunResult<T> = Result<T, RuntimeError>;
