//! The in-repo code-emission backend: assembles accepted instructions into
//! raw body bytes.
//!
//! Metadata descriptors are interned into a [`TokenTable`] of CIL-style
//! tagged tokens. The table doubles as a [`MetadataOracle`], which is what
//! closes the assemble-then-disassemble round trip.

use std::collections::HashMap;

use ilforge_common::metadata::{token, GenericContext};
use ilforge_common::{
    BranchTarget, FieldRef, Instruction, Label, MetadataError, MetadataOracle, MetaOp, MethodRef,
    Op, Operand, OperandKind, TypeDesc, EXT_PREFIX,
};

use crate::error::EncodeError;
use crate::target::EmitTarget;

/// Interned metadata descriptors, addressed by tagged 4-byte tokens.
/// Row indices start at 1; a zero row is never issued.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TokenTable {
    types: Vec<TypeDesc>,
    fields: Vec<FieldRef>,
    methods: Vec<MethodRef>,
    signatures: Vec<Vec<u8>>,
    strings: Vec<String>,
}

fn intern<T: PartialEq + Clone>(rows: &mut Vec<T>, value: &T) -> u32 {
    let index = match rows.iter().position(|row| row == value) {
        Some(index) => index,
        None => {
            rows.push(value.clone());
            rows.len() - 1
        }
    };
    index as u32 + 1
}

fn row<'t, T>(rows: &'t [T], tok: u32) -> Result<&'t T, MetadataError> {
    let index = token::index(tok);
    if index == 0 {
        return Err(MetadataError::UnknownToken { token: tok });
    }
    rows.get(index as usize - 1)
        .ok_or(MetadataError::UnknownToken { token: tok })
}

fn expect_table(tok: u32, table: u8, expected: &'static str) -> Result<(), MetadataError> {
    if token::table(tok) == table {
        Ok(())
    } else {
        Err(MetadataError::WrongTable {
            token: tok,
            expected,
        })
    }
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_type(&mut self, ty: &TypeDesc) -> u32 {
        token::make(token::TYPE, intern(&mut self.types, ty))
    }

    pub fn intern_field(&mut self, field: &FieldRef) -> u32 {
        token::make(token::FIELD, intern(&mut self.fields, field))
    }

    pub fn intern_method(&mut self, method: &MethodRef) -> u32 {
        token::make(token::METHOD, intern(&mut self.methods, method))
    }

    pub fn intern_signature(&mut self, signature: &Vec<u8>) -> u32 {
        token::make(token::SIGNATURE, intern(&mut self.signatures, signature))
    }

    pub fn intern_string(&mut self, text: &String) -> u32 {
        token::make(token::STRING, intern(&mut self.strings, text))
    }
}

impl MetadataOracle for TokenTable {
    fn resolve_type(&self, tok: u32, _ctx: &GenericContext) -> Result<TypeDesc, MetadataError> {
        expect_table(tok, token::TYPE, "type")?;
        row(&self.types, tok).cloned()
    }

    fn resolve_field(&self, tok: u32, _ctx: &GenericContext) -> Result<FieldRef, MetadataError> {
        expect_table(tok, token::FIELD, "field")?;
        row(&self.fields, tok).cloned()
    }

    fn resolve_method(&self, tok: u32, _ctx: &GenericContext) -> Result<MethodRef, MetadataError> {
        expect_table(tok, token::METHOD, "method")?;
        row(&self.methods, tok).cloned()
    }

    fn resolve_string(&self, tok: u32) -> Result<String, MetadataError> {
        expect_table(tok, token::STRING, "string")?;
        row(&self.strings, tok).cloned()
    }

    fn resolve_signature(&self, tok: u32) -> Result<Vec<u8>, MetadataError> {
        expect_table(tok, token::SIGNATURE, "signature")?;
        row(&self.signatures, tok).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FixTarget {
    Label(Label),
    Absolute(u32),
}

#[derive(Debug, Clone)]
struct Fixup {
    patch_at: usize,
    /// Displacements are relative to the end of the owning instruction.
    base: u32,
    target: FixTarget,
    short: bool,
}

/// The finished product of a [`BodyWriter`].
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub bytes: Vec<u8>,
    pub tokens: TokenTable,
}

/// An [`EmitTarget`] that encodes accepted instructions to raw bytes.
///
/// Branch operands are written as placeholders and patched in [`finish`],
/// so forward references cost nothing at accept time. Meta operations other
/// than label marks produce no bytes.
///
/// [`finish`]: BodyWriter::finish
#[derive(Debug, Default)]
pub struct BodyWriter {
    bytes: Vec<u8>,
    tokens: TokenTable,
    marks: HashMap<Label, u32>,
    fixups: Vec<Fixup>,
}

impl BodyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes encoded so far, before fixup resolution.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn push_target(&mut self, target: &BranchTarget, short: bool, instruction_end: u32) {
        let fix = match target {
            BranchTarget::Label(label) => FixTarget::Label(*label),
            BranchTarget::Offset(o) | BranchTarget::Instruction(o) => FixTarget::Absolute(*o),
        };
        self.fixups.push(Fixup {
            patch_at: self.bytes.len(),
            base: instruction_end,
            target: fix,
            short,
        });
        let width = if short { 1 } else { 4 };
        self.bytes.extend(std::iter::repeat(0u8).take(width));
    }

    fn push_operand(&mut self, instr: &Instruction, kind: OperandKind) {
        match (instr.operand(), kind) {
            (Operand::None, _) => {}
            (Operand::Int8(v), _) => self.bytes.push(*v as u8),
            (Operand::Int32(v), _) => self.bytes.extend(v.to_le_bytes()),
            (Operand::Int64(v), _) => self.bytes.extend(v.to_le_bytes()),
            (Operand::Float32(v), _) => self.bytes.extend(v.to_le_bytes()),
            (Operand::Float64(v), _) => self.bytes.extend(v.to_le_bytes()),
            (Operand::Str(s), _) => {
                let tok = self.tokens.intern_string(s);
                self.bytes.extend(tok.to_le_bytes());
            }
            (Operand::Type(ty), _) => {
                let tok = self.tokens.intern_type(ty);
                self.bytes.extend(tok.to_le_bytes());
            }
            (Operand::Field(field), _) => {
                let tok = self.tokens.intern_field(field);
                self.bytes.extend(tok.to_le_bytes());
            }
            (Operand::Method(method), _) => {
                let tok = self.tokens.intern_method(method);
                self.bytes.extend(tok.to_le_bytes());
            }
            (Operand::Signature(sig), _) => {
                let tok = self.tokens.intern_signature(sig);
                self.bytes.extend(tok.to_le_bytes());
            }
            (Operand::Local(slot), OperandKind::LocalShort) => self.bytes.push(slot.index() as u8),
            (Operand::Local(slot), _) => self.bytes.extend(slot.index().to_le_bytes()),
            (Operand::Arg(arg), OperandKind::ArgShort) => self.bytes.push(arg.index as u8),
            (Operand::Arg(arg), _) => self.bytes.extend(arg.index.to_le_bytes()),
            (Operand::Target(target), kind) => {
                let short = kind == OperandKind::TargetShort;
                let end = instr.position() + instr.encoded_size();
                self.push_target(target, short, end);
            }
            (Operand::Switch(targets), _) => {
                self.bytes.extend((targets.len() as u32).to_le_bytes());
                let end = instr.position() + instr.encoded_size();
                for target in targets {
                    self.push_target(target, false, end);
                }
            }
        }
    }

    /// Resolve every recorded fixup and return the finished body.
    pub fn finish(mut self) -> Result<EncodedBody, EncodeError> {
        for fixup in std::mem::take(&mut self.fixups) {
            let target = match &fixup.target {
                FixTarget::Label(label) => {
                    *self
                        .marks
                        .get(label)
                        .ok_or(EncodeError::UnresolvedLabel {
                            index: label.index(),
                        })?
                }
                FixTarget::Absolute(offset) => *offset,
            };
            let displacement = i64::from(target) - i64::from(fixup.base);
            if fixup.short {
                let byte = i8::try_from(displacement).map_err(|_| {
                    EncodeError::ShortBranchOutOfRange {
                        at: fixup.patch_at as u32,
                        displacement,
                    }
                })?;
                self.bytes[fixup.patch_at] = byte as u8;
            } else {
                let word = displacement as i32;
                self.bytes[fixup.patch_at..fixup.patch_at + 4]
                    .copy_from_slice(&word.to_le_bytes());
            }
        }
        Ok(EncodedBody {
            bytes: self.bytes,
            tokens: self.tokens,
        })
    }
}

impl EmitTarget for BodyWriter {
    fn accept(&mut self, instr: &Instruction) {
        match instr.op() {
            Op::Meta(MetaOp::MarkLabel) => {
                if let Operand::Target(BranchTarget::Label(label)) = instr.operand() {
                    self.marks.insert(*label, self.bytes.len() as u32);
                }
            }
            Op::Meta(_) => {}
            Op::Code(opcode) => {
                let value = opcode.value();
                if opcode.is_extended() {
                    self.bytes.push(EXT_PREFIX);
                    self.bytes.push((value & 0xFF) as u8);
                } else {
                    self.bytes.push(value as u8);
                }
                self.push_operand(instr, opcode.operand_kind());
            }
        }
    }

    fn label_in_short_range(&self, label: &Label, from: u32) -> bool {
        match self.marks.get(label) {
            Some(&mark) => {
                let displacement = i64::from(mark) - (i64::from(from) + 2);
                i8::try_from(displacement).is_ok()
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilforge_common::{HandleMint, Opcode};

    fn code(position: u32, opcode: Opcode, operand: Operand) -> Instruction {
        Instruction::new(position, Op::Code(opcode), operand).unwrap()
    }

    #[test]
    fn encodes_constants_and_extended_opcodes() {
        let mut writer = BodyWriter::new();
        writer.accept(&code(0, Opcode::LdcI4S, Operand::Int8(-3)));
        writer.accept(&code(2, Opcode::LdcI4, Operand::Int32(0x0102_0304)));
        writer.accept(&code(7, Opcode::Ceq, Operand::None));
        writer.accept(&code(9, Opcode::Ret, Operand::None));
        let body = writer.finish().unwrap();
        assert_eq!(
            body.bytes,
            vec![0x1F, 0xFD, 0x20, 0x04, 0x03, 0x02, 0x01, 0xFE, 0x01, 0x2A]
        );
    }

    #[test]
    fn backward_short_branch_displacement() {
        let mut mint = HandleMint::new();
        let top = mint.label();
        let mut writer = BodyWriter::new();
        writer.accept(
            &Instruction::new(
                0,
                Op::Meta(MetaOp::MarkLabel),
                Operand::Target(BranchTarget::Label(top)),
            )
            .unwrap(),
        );
        writer.accept(&code(0, Opcode::Nop, Operand::None));
        writer.accept(&code(
            1,
            Opcode::BrS,
            Operand::Target(BranchTarget::Label(top)),
        ));
        let body = writer.finish().unwrap();
        // br.s displacement is relative to the end of the branch (offset 3).
        assert_eq!(body.bytes, vec![0x00, 0x2B, 0xFD]);
    }

    #[test]
    fn forward_long_branch_is_patched() {
        let mut mint = HandleMint::new();
        let out = mint.label();
        let mut writer = BodyWriter::new();
        writer.accept(&code(
            0,
            Opcode::Br,
            Operand::Target(BranchTarget::Label(out)),
        ));
        writer.accept(&code(5, Opcode::Nop, Operand::None));
        writer.accept(
            &Instruction::new(
                6,
                Op::Meta(MetaOp::MarkLabel),
                Operand::Target(BranchTarget::Label(out)),
            )
            .unwrap(),
        );
        writer.accept(&code(6, Opcode::Ret, Operand::None));
        let body = writer.finish().unwrap();
        assert_eq!(body.bytes, vec![0x38, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2A]);
    }

    #[test]
    fn unresolved_label_fails_finish() {
        let mut mint = HandleMint::new();
        let nowhere = mint.label();
        let mut writer = BodyWriter::new();
        writer.accept(&code(
            0,
            Opcode::Br,
            Operand::Target(BranchTarget::Label(nowhere)),
        ));
        assert_eq!(
            writer.finish().unwrap_err(),
            EncodeError::UnresolvedLabel {
                index: nowhere.index()
            }
        );
    }

    #[test]
    fn short_branch_out_of_range_fails_finish() {
        let mut mint = HandleMint::new();
        let out = mint.label();
        let mut writer = BodyWriter::new();
        writer.accept(&code(
            0,
            Opcode::BrS,
            Operand::Target(BranchTarget::Label(out)),
        ));
        for i in 0..200u32 {
            writer.accept(&code(2 + i, Opcode::Nop, Operand::None));
        }
        writer.accept(
            &Instruction::new(
                202,
                Op::Meta(MetaOp::MarkLabel),
                Operand::Target(BranchTarget::Label(out)),
            )
            .unwrap(),
        );
        let err = writer.finish().unwrap_err();
        assert_eq!(
            err,
            EncodeError::ShortBranchOutOfRange {
                at: 1,
                displacement: 200
            }
        );
    }

    #[test]
    fn switch_table_displacements() {
        let mut writer = BodyWriter::new();
        // switch with two absolute targets, then two nops at those offsets.
        writer.accept(&code(
            0,
            Opcode::Switch,
            Operand::Switch(vec![
                BranchTarget::Offset(13),
                BranchTarget::Offset(14),
            ]),
        ));
        writer.accept(&code(13, Opcode::Nop, Operand::None));
        writer.accept(&code(14, Opcode::Ret, Operand::None));
        let body = writer.finish().unwrap();
        // 1 opcode + 4 count + 8 table = 13 bytes; displacements 0 and 1.
        assert_eq!(body.bytes.len(), 15);
        assert_eq!(&body.bytes[1..5], &2u32.to_le_bytes());
        assert_eq!(&body.bytes[5..9], &0i32.to_le_bytes());
        assert_eq!(&body.bytes[9..13], &1i32.to_le_bytes());
    }

    #[test]
    fn token_interning_round_trips() {
        let mut table = TokenTable::new();
        let ty = TypeDesc::int32();
        let tok = table.intern_type(&ty);
        assert_eq!(tok, token::make(token::TYPE, 1));
        assert_eq!(table.intern_type(&ty), tok);
        let ctx = GenericContext::empty();
        assert_eq!(table.resolve_type(tok, &ctx).unwrap(), ty);
        assert_eq!(
            table.resolve_string(tok),
            Err(MetadataError::WrongTable {
                token: tok,
                expected: "string"
            })
        );
        assert_eq!(
            table.resolve_type(token::make(token::TYPE, 9), &ctx),
            Err(MetadataError::UnknownToken {
                token: token::make(token::TYPE, 9)
            })
        );
    }
}
