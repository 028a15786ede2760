//! Operand modeling: a closed sum type, one variant per operand kind.
//!
//! The pairing between an operation and its operand shape is validated at
//! instruction construction, so a stream never holds an operand its
//! operation does not declare.

use crate::handles::{Label, LocalSlot};
use crate::typedesc::{ArgRef, FieldRef, MethodRef, TypeDesc};

/// A branch destination in one of its three lifecycles: a symbolic label
/// during assembly, a raw absolute byte offset after disassembly pass one,
/// and a resolved instruction position after pass two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTarget {
    Label(Label),
    Offset(u32),
    Instruction(u32),
}

/// The data accompanying an operation.
#[derive(Debug, Clone)]
pub enum Operand {
    None,
    Int8(i8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
    Type(TypeDesc),
    Field(FieldRef),
    Method(MethodRef),
    Signature(Vec<u8>),
    Local(LocalSlot),
    Arg(ArgRef),
    Target(BranchTarget),
    Switch(Vec<BranchTarget>),
}

impl Operand {
    /// Short name of the runtime shape, for diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Operand::None => "none",
            Operand::Int8(_) => "int8",
            Operand::Int32(_) => "int32",
            Operand::Int64(_) => "int64",
            Operand::Float32(_) => "float32",
            Operand::Float64(_) => "float64",
            Operand::Str(_) => "string",
            Operand::Type(_) => "type",
            Operand::Field(_) => "field",
            Operand::Method(_) => "method",
            Operand::Signature(_) => "signature",
            Operand::Local(_) => "local",
            Operand::Arg(_) => "argument",
            Operand::Target(_) => "branch target",
            Operand::Switch(_) => "switch table",
        }
    }
}

// Structural deep equality; floats compare by bit pattern so `Eq` holds and
// two recordings of the same sequence always diff cleanly.
impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::None, Operand::None) => true,
            (Operand::Int8(a), Operand::Int8(b)) => a == b,
            (Operand::Int32(a), Operand::Int32(b)) => a == b,
            (Operand::Int64(a), Operand::Int64(b)) => a == b,
            (Operand::Float32(a), Operand::Float32(b)) => a.to_bits() == b.to_bits(),
            (Operand::Float64(a), Operand::Float64(b)) => a.to_bits() == b.to_bits(),
            (Operand::Str(a), Operand::Str(b)) => a == b,
            (Operand::Type(a), Operand::Type(b)) => a == b,
            (Operand::Field(a), Operand::Field(b)) => a == b,
            (Operand::Method(a), Operand::Method(b)) => a == b,
            (Operand::Signature(a), Operand::Signature(b)) => a == b,
            (Operand::Local(a), Operand::Local(b)) => a == b,
            (Operand::Arg(a), Operand::Arg(b)) => a == b,
            (Operand::Target(a), Operand::Target(b)) => a == b,
            (Operand::Switch(a), Operand::Switch(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Operand {}

/// The operand shape an operation declares, with its encoded byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    None,
    /// One-byte signed immediate.
    Int8,
    Int32,
    Int64,
    Float32,
    Float64,
    /// String token (4 bytes on the wire).
    Str,
    /// Type token (4 bytes).
    Type,
    /// Field token (4 bytes).
    Field,
    /// Method/constructor token (4 bytes).
    Method,
    /// Standalone-signature token (4 bytes).
    Signature,
    /// One-byte local slot index.
    LocalShort,
    /// Two-byte local slot index.
    LocalLong,
    /// One-byte argument index.
    ArgShort,
    /// Two-byte argument index.
    ArgLong,
    /// One-byte relative displacement.
    TargetShort,
    /// Four-byte relative displacement.
    TargetLong,
    /// Four-byte count followed by that many four-byte displacements.
    Switch,
}

/// All operand kinds, for exhaustive testing.
pub const ALL_OPERAND_KINDS: [OperandKind; 18] = [
    OperandKind::None,
    OperandKind::Int8,
    OperandKind::Int32,
    OperandKind::Int64,
    OperandKind::Float32,
    OperandKind::Float64,
    OperandKind::Str,
    OperandKind::Type,
    OperandKind::Field,
    OperandKind::Method,
    OperandKind::Signature,
    OperandKind::LocalShort,
    OperandKind::LocalLong,
    OperandKind::ArgShort,
    OperandKind::ArgLong,
    OperandKind::TargetShort,
    OperandKind::TargetLong,
    OperandKind::Switch,
];

impl OperandKind {
    /// Encoded operand width in bytes. `None` for the variable-length
    /// switch table.
    pub fn width(self) -> Option<u32> {
        match self {
            OperandKind::None => Some(0),
            OperandKind::Int8
            | OperandKind::LocalShort
            | OperandKind::ArgShort
            | OperandKind::TargetShort => Some(1),
            OperandKind::LocalLong | OperandKind::ArgLong => Some(2),
            OperandKind::Int32
            | OperandKind::Float32
            | OperandKind::Str
            | OperandKind::Type
            | OperandKind::Field
            | OperandKind::Method
            | OperandKind::Signature
            | OperandKind::TargetLong => Some(4),
            OperandKind::Int64 | OperandKind::Float64 => Some(8),
            OperandKind::Switch => None,
        }
    }

    /// Whether `operand`'s runtime shape satisfies this declared kind.
    pub fn admits(self, operand: &Operand) -> bool {
        matches!(
            (self, operand),
            (OperandKind::None, Operand::None)
                | (OperandKind::Int8, Operand::Int8(_))
                | (OperandKind::Int32, Operand::Int32(_))
                | (OperandKind::Int64, Operand::Int64(_))
                | (OperandKind::Float32, Operand::Float32(_))
                | (OperandKind::Float64, Operand::Float64(_))
                | (OperandKind::Str, Operand::Str(_))
                | (OperandKind::Type, Operand::Type(_))
                | (OperandKind::Field, Operand::Field(_))
                | (OperandKind::Method, Operand::Method(_))
                | (OperandKind::Signature, Operand::Signature(_))
                | (OperandKind::LocalShort, Operand::Local(_))
                | (OperandKind::LocalLong, Operand::Local(_))
                | (OperandKind::ArgShort, Operand::Arg(_))
                | (OperandKind::ArgLong, Operand::Arg(_))
                | (OperandKind::TargetShort, Operand::Target(_))
                | (OperandKind::TargetLong, Operand::Target(_))
                | (OperandKind::Switch, Operand::Switch(_))
        )
    }

    /// Name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            OperandKind::None => "none",
            OperandKind::Int8 => "int8",
            OperandKind::Int32 => "int32",
            OperandKind::Int64 => "int64",
            OperandKind::Float32 => "float32",
            OperandKind::Float64 => "float64",
            OperandKind::Str => "string",
            OperandKind::Type => "type",
            OperandKind::Field => "field",
            OperandKind::Method => "method",
            OperandKind::Signature => "signature",
            OperandKind::LocalShort | OperandKind::LocalLong => "local",
            OperandKind::ArgShort | OperandKind::ArgLong => "argument",
            OperandKind::TargetShort | OperandKind::TargetLong => "branch target",
            OperandKind::Switch => "switch table",
        }
    }
}
