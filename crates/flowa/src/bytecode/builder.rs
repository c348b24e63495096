//! Builder for emitting bytecode during compilation.
//!
//! One `CodeBuilder` exists per compilation scope (the implicit top level,
//! plus one per function body). It encodes opcodes and operands into raw
//! bytes and manages forward jumps, which are emitted with a placeholder
//! target and patched once the destination offset is known.

use super::op::Opcode;

/// Placeholder written into unpatched jump operands. A function whose code
/// legitimately reaches this offset would long since have overflowed the
/// u16 jump space.
const UNPATCHED: u16 = 0xFFFF;

/// Label for a forward jump that needs patching. Stores the byte offset of
/// the jump's target operand.
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel(usize);

/// Emits encoded instructions for a single scope.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<u8>,
    /// Opcode of the most recently emitted instruction. The compiler uses
    /// this to skip a synthetic `Return` after an explicit one.
    last_op: Option<Opcode>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a no-operand instruction.
    pub fn emit(&mut self, op: Opcode) {
        self.instructions.push(op as u8);
        self.last_op = Some(op);
    }

    /// Emits an instruction with a u8 operand.
    pub fn emit_u8(&mut self, op: Opcode, operand: u8) {
        self.instructions.push(op as u8);
        self.instructions.push(operand);
        self.last_op = Some(op);
    }

    /// Emits an instruction with a u16 operand (big-endian).
    pub fn emit_u16(&mut self, op: Opcode, operand: u16) {
        self.instructions.push(op as u8);
        self.instructions.extend_from_slice(&operand.to_be_bytes());
        self.last_op = Some(op);
    }

    /// Emits an instruction with two u8 operands (`AddLocal dest, src`).
    pub fn emit_u8_u8(&mut self, op: Opcode, operand1: u8, operand2: u8) {
        self.instructions.push(op as u8);
        self.instructions.push(operand1);
        self.instructions.push(operand2);
        self.last_op = Some(op);
    }

    /// Emits a forward jump with a placeholder target; patch it with
    /// `patch_jump` once the destination is known.
    #[must_use]
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        self.instructions.push(op as u8);
        let label = JumpLabel(self.instructions.len());
        self.instructions.extend_from_slice(&UNPATCHED.to_be_bytes());
        self.last_op = Some(op);
        label
    }

    /// Emits a jump to an already-known absolute target (backward jumps).
    pub fn emit_jump_to(&mut self, op: Opcode, target: usize) {
        let target = u16::try_from(target).expect("jump target exceeds u16 range; function too large");
        self.emit_u16(op, target);
    }

    /// Emits the fused `JumpIfLocalGreaterEqualConst` instruction, returning
    /// a label for its (forward) exit target.
    #[must_use]
    pub fn emit_fused_loop_check(&mut self, slot: u8, const_idx: u16) -> JumpLabel {
        self.instructions.push(Opcode::JumpIfLocalGreaterEqualConst as u8);
        self.instructions.push(slot);
        self.instructions.extend_from_slice(&const_idx.to_be_bytes());
        let label = JumpLabel(self.instructions.len());
        self.instructions.extend_from_slice(&UNPATCHED.to_be_bytes());
        self.last_op = Some(Opcode::JumpIfLocalGreaterEqualConst);
        label
    }

    /// Opcode of the most recently emitted instruction, if any.
    #[must_use]
    pub fn last_opcode(&self) -> Option<Opcode> {
        self.last_op
    }

    /// Patches a forward jump to point at the current offset.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = self.current_offset();
        self.patch_jump_to(label, target);
    }

    /// Patches a forward jump to an explicit absolute target.
    pub fn patch_jump_to(&mut self, label: JumpLabel, target: usize) {
        let target = u16::try_from(target).expect("jump target exceeds u16 range; function too large");
        let bytes = target.to_be_bytes();
        self.instructions[label.0] = bytes[0];
        self.instructions[label.0 + 1] = bytes[1];
    }

    /// Current byte offset; the target for backward jumps recorded before
    /// loop bodies.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    /// Consumes the builder, returning the encoded instruction stream.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.instructions
    }

    /// Borrow of the bytes emitted so far.
    #[must_use]
    pub fn instructions(&self) -> &[u8] {
        &self.instructions
    }
}
