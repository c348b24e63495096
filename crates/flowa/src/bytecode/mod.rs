//! Bytecode representation for Flowa.
//!
//! - `op` — opcode definitions, operand widths, and the disassembler
//! - `code` — `Bytecode` and `CompiledFunction` containers
//! - `builder` — `CodeBuilder` for emitting instructions with jump patching

pub use builder::{CodeBuilder, JumpLabel};
pub use code::{Bytecode, CompiledFunction};
pub use op::{disassemble, Opcode};

mod builder;
mod code;
mod op;
