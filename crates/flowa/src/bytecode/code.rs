//! Compiled code containers.
//!
//! The compiler produces one `Bytecode` per program: the top-level
//! instruction stream, a shared constant pool (functions included, as
//! `CompiledFunction` constants), the top-level local-slot count, and the
//! constant index of a `main` function when the program declares one.

use crate::value::ValueRef;

/// A compiled Flowa function.
///
/// Instructions reference the program-wide constant pool; locals occupy
/// frame-relative slots `0..num_locals` with parameters in `0..num_params`.
#[derive(Debug)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_params: usize,
    /// Declared name, for display and tracebacks. Synthesized functions
    /// (type constructors) carry their type name.
    pub name: Option<String>,
}

/// The compiler's output. Lives only in memory for a single run.
#[derive(Debug)]
pub struct Bytecode {
    /// Top-level instruction stream.
    pub instructions: Vec<u8>,
    /// Append-only during compilation, read-only during execution.
    pub constants: Vec<ValueRef>,
    /// Local slots reserved by the implicit top-level frame.
    pub main_locals: u16,
    /// Constant-pool index of the program's `main` function, or -1. When
    /// present, the VM calls it after the top-level statements finish.
    pub main_function: i32,
}
