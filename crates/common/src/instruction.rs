//! Instructions: an operation paired with a validated operand at a byte
//! position.
//!
//! Two families of operation share the stream. Encodable opcodes occupy
//! bytes in the routine body; meta operations record generator-level events
//! (local declarations, label marks, exception-region boundaries) and occupy
//! zero bytes, so consecutive positions are non-decreasing rather than
//! strictly increasing.

use crate::error::InstructionError;
use crate::opcode::Opcode;
use crate::operand::{Operand, OperandKind};

/// A generator-level event recorded in the stream without encoding to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaOp {
    /// Declares a typed local slot. Operand: the slot.
    DeclareLocal,
    /// Brings a label into existence. Operand: the label as a target.
    DefineLabel,
    /// Pins a previously defined label to the current position. Operand: the
    /// label as a target.
    MarkLabel,
    /// Opens a protected region. Operand: the region's end label as a target.
    BeginExceptionBlock,
    /// Opens a typed handler. Operand: the caught type.
    BeginCatchBlock,
    BeginFilterBlock,
    BeginFaultBlock,
    BeginFinallyBlock,
    /// Closes the innermost protected region.
    EndExceptionBlock,
    BeginScope,
    EndScope,
    /// Records a namespace import for downstream tooling. Operand: the
    /// namespace string.
    UsingNamespace,
    /// Convenience console write. Operand: a string literal, a field, or a
    /// local.
    WriteLine,
    /// Constructs and throws an exception of the operand type.
    ThrowException,
}

/// All meta operations, for exhaustive testing.
pub const ALL_META_OPS: [MetaOp; 14] = [
    MetaOp::DeclareLocal,
    MetaOp::DefineLabel,
    MetaOp::MarkLabel,
    MetaOp::BeginExceptionBlock,
    MetaOp::BeginCatchBlock,
    MetaOp::BeginFilterBlock,
    MetaOp::BeginFaultBlock,
    MetaOp::BeginFinallyBlock,
    MetaOp::EndExceptionBlock,
    MetaOp::BeginScope,
    MetaOp::EndScope,
    MetaOp::UsingNamespace,
    MetaOp::WriteLine,
    MetaOp::ThrowException,
];

impl MetaOp {
    /// Dot-directive spelling used by the renderer.
    pub fn directive(self) -> &'static str {
        match self {
            MetaOp::DeclareLocal => ".local",
            MetaOp::DefineLabel => ".label",
            MetaOp::MarkLabel => ".mark",
            MetaOp::BeginExceptionBlock => ".try",
            MetaOp::BeginCatchBlock => ".catch",
            MetaOp::BeginFilterBlock => ".filter",
            MetaOp::BeginFaultBlock => ".fault",
            MetaOp::BeginFinallyBlock => ".finally",
            MetaOp::EndExceptionBlock => ".endtry",
            MetaOp::BeginScope => ".scope",
            MetaOp::EndScope => ".endscope",
            MetaOp::UsingNamespace => ".namespace",
            MetaOp::WriteLine => ".writeline",
            MetaOp::ThrowException => ".thrownew",
        }
    }

    /// Whether `operand` has a shape this meta operation accepts.
    pub fn admits(self, operand: &Operand) -> bool {
        match self {
            MetaOp::DeclareLocal => matches!(operand, Operand::Local(_)),
            MetaOp::DefineLabel | MetaOp::MarkLabel | MetaOp::BeginExceptionBlock => {
                matches!(operand, Operand::Target(_))
            }
            MetaOp::BeginCatchBlock | MetaOp::ThrowException => {
                matches!(operand, Operand::Type(_))
            }
            MetaOp::UsingNamespace => matches!(operand, Operand::Str(_)),
            MetaOp::WriteLine => matches!(
                operand,
                Operand::Str(_) | Operand::Field(_) | Operand::Local(_)
            ),
            MetaOp::BeginFilterBlock
            | MetaOp::BeginFaultBlock
            | MetaOp::BeginFinallyBlock
            | MetaOp::EndExceptionBlock
            | MetaOp::BeginScope
            | MetaOp::EndScope => matches!(operand, Operand::None),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            MetaOp::DeclareLocal => "local",
            MetaOp::DefineLabel | MetaOp::MarkLabel | MetaOp::BeginExceptionBlock => {
                "branch target"
            }
            MetaOp::BeginCatchBlock | MetaOp::ThrowException => "type",
            MetaOp::UsingNamespace => "string",
            MetaOp::WriteLine => "string, field, or local",
            _ => "none",
        }
    }
}

/// An operation: either an encodable opcode or a zero-width meta event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Code(Opcode),
    Meta(MetaOp),
}

impl Op {
    /// Whether `operand` is acceptable for this operation.
    pub fn admits(&self, operand: &Operand) -> bool {
        match self {
            Op::Code(opcode) => opcode.operand_kind().admits(operand),
            Op::Meta(meta) => meta.admits(operand),
        }
    }

    /// Display name: the opcode mnemonic or the meta directive.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Code(opcode) => opcode.mnemonic(),
            Op::Meta(meta) => meta.directive(),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Op::Code(opcode) => opcode.operand_kind().name(),
            Op::Meta(meta) => meta.expected(),
        }
    }
}

/// One recorded instruction. Construction validates the operation/operand
/// pairing, so a held `Instruction` is well-formed by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    position: u32,
    op: Op,
    operand: Operand,
}

impl Instruction {
    /// Pair `op` with `operand` at byte position `position`.
    pub fn new(position: u32, op: Op, operand: Operand) -> Result<Self, InstructionError> {
        if !op.admits(&operand) {
            return Err(InstructionError::OperandMismatch {
                op: op.name().to_string(),
                expected: op.expected().to_string(),
                found: operand.shape_name(),
            });
        }
        Ok(Instruction {
            position,
            op,
            operand,
        })
    }

    /// Byte offset of this instruction within the routine body. Meta
    /// operations share the position of the next encodable instruction.
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub(crate) fn set_operand_unchecked(&mut self, operand: Operand) {
        self.operand = operand;
    }

    /// Encoded size in bytes: opcode length plus operand width. Meta
    /// operations encode to nothing.
    pub fn encoded_size(&self) -> u32 {
        match self.op {
            Op::Meta(_) => 0,
            Op::Code(opcode) => {
                let operand_bytes = match (&self.operand, opcode.operand_kind().width()) {
                    (Operand::Switch(targets), None) => 4 + 4 * targets.len() as u32,
                    (_, Some(w)) => w,
                    // Switch is the only variable-width kind; admits() makes
                    // this arm unreachable.
                    (_, None) => 0,
                };
                opcode.encoded_len() + operand_bytes
            }
        }
    }
}
