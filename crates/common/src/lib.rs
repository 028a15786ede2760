//! ilforge common types: the instruction model shared by the assembler, the
//! coercion planner, and the disassembler.
//!
//! This crate provides the foundational data structures for the ilforge
//! stack-machine instruction set:
//!
//! - [`Opcode`] — the full one-byte and `0xFE`-prefixed opcode tables
//! - [`Operand`] / [`OperandKind`] — closed operand sum type with widths
//! - [`Instruction`] / [`Op`] / [`MetaOp`] — validated operation/operand pairs
//! - [`InstructionStream`] — append-only recording with offset lookup
//! - [`Label`] / [`LocalSlot`] / [`HandleMint`] — session-owned handles
//! - [`TypeDesc`] and the [`TypeOracle`] / [`MetadataOracle`] seams
//!
//! # Dependencies
//!
//! This crate uses `thiserror` (compile-time proc-macro, zero runtime cost)
//! and has no other dependencies.

pub mod error;
pub mod handles;
pub mod instruction;
pub mod metadata;
pub mod opcode;
pub mod operand;
pub mod stream;
pub mod typedesc;

// Re-export commonly used types at the crate root.
pub use error::{InstructionError, MetadataError};
pub use handles::{HandleMint, Label, LocalSlot, SessionId};
pub use instruction::{Instruction, MetaOp, Op};
pub use metadata::{GenericContext, MetadataOracle, NullMetadata};
pub use opcode::{Opcode, EXT_PREFIX};
pub use operand::{BranchTarget, Operand, OperandKind};
pub use stream::InstructionStream;
pub use typedesc::{
    ArgRef, EmitContext, FieldRef, MethodRef, ParamSpec, Primitive, TableOracle, TypeDesc,
    TypeKind, TypeOracle, WellKnown,
};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy that generates a random valid Opcode.
    fn arb_opcode() -> impl Strategy<Value = Opcode> {
        prop::sample::select(&opcode::ALL_OPCODES[..])
    }

    /// Strategy that generates an operand matching `opcode`'s declared kind.
    fn arb_operand_for(opcode: Opcode) -> BoxedStrategy<Operand> {
        match opcode.operand_kind() {
            OperandKind::None => Just(Operand::None).boxed(),
            OperandKind::Int8 => any::<i8>().prop_map(Operand::Int8).boxed(),
            OperandKind::Int32 => any::<i32>().prop_map(Operand::Int32).boxed(),
            OperandKind::Int64 => any::<i64>().prop_map(Operand::Int64).boxed(),
            OperandKind::Float32 => any::<f32>().prop_map(Operand::Float32).boxed(),
            OperandKind::Float64 => any::<f64>().prop_map(Operand::Float64).boxed(),
            OperandKind::Str => ".{0,12}".prop_map(Operand::Str).boxed(),
            OperandKind::Type => Just(Operand::Type(TypeDesc::int32())).boxed(),
            OperandKind::Field => Just(Operand::Field(FieldRef {
                declaring: "T".to_string(),
                name: "f".to_string(),
                ty: TypeDesc::int32(),
                is_static: false,
            }))
            .boxed(),
            OperandKind::Method => {
                Just(Operand::Method(MethodRef::parameterless_ctor("T"))).boxed()
            }
            OperandKind::Signature => prop::collection::vec(any::<u8>(), 0..8)
                .prop_map(Operand::Signature)
                .boxed(),
            OperandKind::LocalShort | OperandKind::LocalLong => {
                Just(Operand::Local(HandleMint::new().local(TypeDesc::int32(), false))).boxed()
            }
            OperandKind::ArgShort | OperandKind::ArgLong => {
                any::<u16>().prop_map(|i| Operand::Arg(ArgRef::index(i))).boxed()
            }
            OperandKind::TargetShort | OperandKind::TargetLong => any::<u32>()
                .prop_map(|o| Operand::Target(BranchTarget::Offset(o)))
                .boxed(),
            OperandKind::Switch => prop::collection::vec(any::<u32>(), 0..6)
                .prop_map(|offsets| {
                    Operand::Switch(offsets.into_iter().map(BranchTarget::Offset).collect())
                })
                .boxed(),
        }
    }

    proptest! {
        /// Every opcode accepts an operand of its declared kind and rejects
        /// a deliberately foreign shape.
        #[test]
        fn declared_pairings_construct(opcode in arb_opcode()) {
            let operand = arb_operand_for(opcode)
                .new_tree(&mut proptest::test_runner::TestRunner::deterministic())
                .unwrap()
                .current();
            prop_assert!(Instruction::new(0, Op::Code(opcode), operand).is_ok());

            let foreign = match opcode.operand_kind() {
                OperandKind::Int64 => Operand::Int32(0),
                _ => Operand::Int64(0),
            };
            prop_assert!(Instruction::new(0, Op::Code(opcode), foreign).is_err());
        }

        /// Opcode values survive the byte-table round trip.
        #[test]
        fn opcode_table_round_trip(opcode in arb_opcode()) {
            let value = opcode.value();
            let back = if opcode.is_extended() {
                Opcode::from_ext((value & 0xFF) as u8)
            } else {
                Opcode::from_byte(value as u8)
            };
            prop_assert_eq!(back, Some(opcode));
        }

        /// Appending instructions at their natural positions keeps the
        /// stream's positions non-decreasing and the cursor consistent.
        #[test]
        fn stream_positions_are_monotonic(opcodes in prop::collection::vec(arb_opcode(), 0..40)) {
            let mut stream = InstructionStream::new();
            for opcode in opcodes {
                let operand = arb_operand_for(opcode)
                    .new_tree(&mut proptest::test_runner::TestRunner::deterministic())
                    .unwrap()
                    .current();
                let position = stream.next_position();
                let instr = Instruction::new(position, Op::Code(opcode), operand).unwrap();
                stream.append(instr).unwrap();
            }
            let mut last = 0u32;
            for instr in &stream {
                prop_assert!(instr.position() >= last);
                last = instr.position();
            }
            prop_assert_eq!(stream.next_position() >= last, true);
        }
    }
}
