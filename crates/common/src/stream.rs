//! The instruction stream: an append-only recording of one routine body.

use std::fmt::Write as _;

use crate::error::InstructionError;
use crate::handles::Label;
use crate::instruction::{Instruction, MetaOp, Op};
use crate::operand::{BranchTarget, Operand};

/// An ordered recording of instructions with non-decreasing byte positions.
///
/// Meta operations occupy zero bytes, so several instructions may share one
/// position. The stream is append-only; the only mutation after the fact is
/// an operand patch, used by branch fixups and by the disassembler's target
/// resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionStream {
    instrs: Vec<Instruction>,
}

impl InstructionStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instrs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instrs.iter()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instrs
    }

    /// Byte position one past the last encodable instruction; the position
    /// the next appended instruction must carry at minimum.
    pub fn next_position(&self) -> u32 {
        self.instrs
            .last()
            .map(|i| i.position() + i.encoded_size())
            .unwrap_or(0)
    }

    /// Append an instruction. Positions must never regress.
    pub fn append(&mut self, instr: Instruction) -> Result<(), InstructionError> {
        if let Some(last) = self.instrs.last() {
            if instr.position() < last.position() {
                return Err(InstructionError::PositionRegression {
                    last: last.position(),
                    next: instr.position(),
                });
            }
        }
        self.instrs.push(instr);
        Ok(())
    }

    /// Find the encodable instruction starting at byte `offset`.
    ///
    /// Positions are sorted, so the scan stops as soon as it passes
    /// `offset`. Meta operations are skipped; they share positions with
    /// their encodable neighbors but start no bytes.
    pub fn at_offset(&self, offset: u32) -> Option<(usize, &Instruction)> {
        for (index, instr) in self.instrs.iter().enumerate() {
            if instr.position() > offset {
                break;
            }
            if instr.position() == offset && matches!(instr.op(), Op::Code(_)) {
                return Some((index, instr));
            }
        }
        None
    }

    /// Replace the operand of the instruction at `index`, re-validating the
    /// operation/operand pairing.
    pub fn patch_operand(
        &mut self,
        index: usize,
        operand: Operand,
    ) -> Result<(), InstructionError> {
        let len = self.instrs.len();
        let instr = self
            .instrs
            .get_mut(index)
            .ok_or(InstructionError::PatchOutOfBounds { index, len })?;
        if !instr.op().admits(&operand) {
            return Err(InstructionError::OperandMismatch {
                op: instr.op().name().to_string(),
                expected: match instr.op() {
                    Op::Code(opcode) => opcode.operand_kind().name().to_string(),
                    Op::Meta(meta) => meta.directive().to_string(),
                },
                found: operand.shape_name(),
            });
        }
        instr.set_operand_unchecked(operand);
        Ok(())
    }

    /// Positions of all marked labels, in stream order.
    fn label_marks(&self) -> Vec<(Label, u32)> {
        let mut marks = Vec::new();
        for instr in &self.instrs {
            if let (Op::Meta(MetaOp::MarkLabel), Operand::Target(BranchTarget::Label(label))) =
                (instr.op(), instr.operand())
            {
                marks.push((*label, instr.position()));
            }
        }
        marks
    }

    /// Render the stream as one listing line per instruction.
    pub fn render(&self) -> String {
        let marks = self.label_marks();
        let mut out = String::new();
        for instr in &self.instrs {
            let _ = write!(out, "IL_{:04x}: {}", instr.position(), instr.op().name());
            let text = self.render_operand(instr, &marks);
            if !text.is_empty() {
                out.push(' ');
                out.push_str(&text);
            }
            out.push('\n');
        }
        out
    }

    fn render_target(target: &BranchTarget, marks: &[(Label, u32)]) -> String {
        match target {
            BranchTarget::Label(label) => match marks.iter().find(|(l, _)| l == label) {
                Some((_, pos)) => format!("IL_{pos:04x}"),
                None => format!("L_{}", label.index()),
            },
            BranchTarget::Offset(offset) => format!("IL_{offset:04x}"),
            BranchTarget::Instruction(pos) => format!("IL_{pos:04x}"),
        }
    }

    fn render_operand(&self, instr: &Instruction, marks: &[(Label, u32)]) -> String {
        match instr.operand() {
            Operand::None => String::new(),
            Operand::Int8(v) => v.to_string(),
            Operand::Int32(v) => v.to_string(),
            Operand::Int64(v) => v.to_string(),
            Operand::Float32(v) => format!("{v:?}"),
            Operand::Float64(v) => format!("{v:?}"),
            Operand::Str(s) => format!("{s:?}"),
            Operand::Type(ty) => ty.to_string(),
            Operand::Field(field) => field.to_string(),
            Operand::Method(method) => method.to_string(),
            Operand::Signature(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    let _ = write!(hex, "{b:02x}");
                }
                format!("sig({hex})")
            }
            Operand::Local(slot) => {
                if matches!(instr.op(), Op::Meta(MetaOp::DeclareLocal)) {
                    let mut text = format!("V_{} {}", slot.index(), slot.ty());
                    if slot.pinned() {
                        text.push_str(" pinned");
                    }
                    text
                } else {
                    format!("V_{}", slot.index())
                }
            }
            Operand::Arg(arg) => format!("A_{}", arg.index),
            Operand::Target(target) => Self::render_target(target, marks),
            Operand::Switch(targets) => {
                let parts: Vec<String> = targets
                    .iter()
                    .map(|t| Self::render_target(t, marks))
                    .collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

impl<'a> IntoIterator for &'a InstructionStream {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instrs.iter()
    }
}
