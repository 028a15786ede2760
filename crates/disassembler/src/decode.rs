//! The two-pass decoder.
//!
//! Pass one walks a single forward cursor over the byte buffer, selecting
//! opcodes from the one-byte and extended tables and consuming operand bytes
//! per the opcode's declared kind; branch operands are stored as absolute
//! byte offsets. Pass two resolves every stored offset to the instruction
//! at that offset, which requires the first pass to be complete.

use ilforge_common::{
    ArgRef, BranchTarget, GenericContext, HandleMint, Instruction, InstructionStream, LocalSlot,
    MetaOp, MetadataOracle, Op, Opcode, Operand, OperandKind, TypeDesc, EXT_PREFIX,
};

use crate::error::DisasmError;

/// Everything the decoder needs to know about an already-compiled routine.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Raw instruction bytes of the routine body.
    pub code: Vec<u8>,
    /// Declared local types, in slot order.
    pub locals: Vec<TypeDesc>,
    /// Declared parameter types, excluding any `this`.
    pub params: Vec<TypeDesc>,
    /// Declaring type, used to synthesize the `this` pseudo-parameter.
    pub declaring: Option<TypeDesc>,
    /// Instance routines get `this` at argument index 0.
    pub is_instance: bool,
    /// Generic arguments in scope, forwarded to every token resolution.
    pub generics: GenericContext,
}

impl MethodInfo {
    /// A static, local-less, parameter-less routine over `code`.
    pub fn body(code: Vec<u8>) -> Self {
        MethodInfo {
            code,
            locals: Vec::new(),
            params: Vec::new(),
            declaring: None,
            is_instance: false,
            generics: GenericContext::empty(),
        }
    }
}

struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    fn take(&mut self, n: usize, at: u32) -> Result<&'b [u8], DisasmError> {
        if self.pos + n > self.bytes.len() {
            return Err(DisasmError::UnexpectedEnd { at });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self, at: u32) -> Result<u8, DisasmError> {
        Ok(self.take(1, at)?[0])
    }

    fn read_u16(&mut self, at: u32) -> Result<u16, DisasmError> {
        let b = self.take(2, at)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self, at: u32) -> Result<u32, DisasmError> {
        let b = self.take(4, at)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, at: u32) -> Result<u64, DisasmError> {
        let b = self.take(8, at)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }
}

fn absolute(base: i64, displacement: i64) -> Result<u32, DisasmError> {
    let offset = base + displacement;
    u32::try_from(offset).map_err(|_| DisasmError::MisalignedTarget { offset })
}

/// Decode a compiled routine back into an instruction stream.
///
/// The stream opens with one `.local` directive per declared slot, in slot
/// order, followed by the decoded instructions.
///
/// All failures are fatal: an unrecognized opcode, a truncated operand, a
/// token the oracle cannot resolve, or a branch target that aligns with no
/// instruction boundary each abort the whole decode.
pub fn disassemble(
    method: &MethodInfo,
    oracle: &dyn MetadataOracle,
) -> Result<InstructionStream, DisasmError> {
    if method.code.is_empty() {
        return Err(DisasmError::MissingBody);
    }

    // The decoded stream is its own session; its slots belong to it alone.
    let mut mint = HandleMint::new();
    let locals: Vec<LocalSlot> = method
        .locals
        .iter()
        .map(|ty| mint.local(ty.clone(), false))
        .collect();

    let mut args: Vec<ArgRef> = Vec::with_capacity(method.params.len() + 1);
    if method.is_instance {
        let this_ty = method
            .declaring
            .clone()
            .unwrap_or_else(TypeDesc::object);
        args.push(ArgRef::typed(0, this_ty));
    }
    for ty in &method.params {
        args.push(ArgRef::typed(args.len() as u16, ty.clone()));
    }

    let mut reader = Reader {
        bytes: &method.code,
        pos: 0,
    };
    let mut stream = InstructionStream::new();

    // Surface the slot table as leading directives. Slots reached only
    // through the dedicated zero-operand forms never appear in an operand,
    // so without these a replay could not reconstruct the table.
    for slot in &locals {
        stream.append(Instruction::new(
            0,
            Op::Meta(MetaOp::DeclareLocal),
            Operand::Local(slot.clone()),
        )?)?;
    }

    while reader.pos < method.code.len() {
        let start = reader.pos as u32;
        let first = reader.read_u8(start)?;
        let opcode = if first == EXT_PREFIX {
            let second = reader.read_u8(start)?;
            Opcode::from_ext(second).ok_or(DisasmError::UnknownExtendedOpcode {
                at: start,
                byte: second,
            })?
        } else {
            Opcode::from_byte(first).ok_or(DisasmError::UnknownOpcode {
                at: start,
                byte: first,
            })?
        };

        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::Int8 => Operand::Int8(reader.read_u8(start)? as i8),
            OperandKind::Int32 => Operand::Int32(reader.read_u32(start)? as i32),
            OperandKind::Int64 => Operand::Int64(reader.read_u64(start)? as i64),
            OperandKind::Float32 => {
                Operand::Float32(f32::from_bits(reader.read_u32(start)?))
            }
            OperandKind::Float64 => {
                Operand::Float64(f64::from_bits(reader.read_u64(start)?))
            }
            OperandKind::Str => {
                let tok = reader.read_u32(start)?;
                Operand::Str(oracle.resolve_string(tok)?)
            }
            OperandKind::Type => {
                let tok = reader.read_u32(start)?;
                Operand::Type(oracle.resolve_type(tok, &method.generics)?)
            }
            OperandKind::Field => {
                let tok = reader.read_u32(start)?;
                Operand::Field(oracle.resolve_field(tok, &method.generics)?)
            }
            OperandKind::Method => {
                let tok = reader.read_u32(start)?;
                Operand::Method(oracle.resolve_method(tok, &method.generics)?)
            }
            OperandKind::Signature => {
                let tok = reader.read_u32(start)?;
                Operand::Signature(oracle.resolve_signature(tok)?)
            }
            OperandKind::LocalShort | OperandKind::LocalLong => {
                let index = if opcode.operand_kind() == OperandKind::LocalShort {
                    u16::from(reader.read_u8(start)?)
                } else {
                    reader.read_u16(start)?
                };
                let slot = locals
                    .get(usize::from(index))
                    .ok_or(DisasmError::NoSuchLocal { at: start, index })?;
                Operand::Local(slot.clone())
            }
            OperandKind::ArgShort | OperandKind::ArgLong => {
                let index = if opcode.operand_kind() == OperandKind::ArgShort {
                    u16::from(reader.read_u8(start)?)
                } else {
                    reader.read_u16(start)?
                };
                let arg = args
                    .get(usize::from(index))
                    .ok_or(DisasmError::NoSuchArgument { at: start, index })?;
                Operand::Arg(arg.clone())
            }
            OperandKind::TargetShort => {
                let displacement = i64::from(reader.read_u8(start)? as i8);
                let end = reader.pos as i64;
                Operand::Target(BranchTarget::Offset(absolute(end, displacement)?))
            }
            OperandKind::TargetLong => {
                let displacement = i64::from(reader.read_u32(start)? as i32);
                let end = reader.pos as i64;
                Operand::Target(BranchTarget::Offset(absolute(end, displacement)?))
            }
            OperandKind::Switch => {
                let count = reader.read_u32(start)? as usize;
                let mut displacements = Vec::with_capacity(count);
                for _ in 0..count {
                    displacements.push(i64::from(reader.read_u32(start)? as i32));
                }
                let end = reader.pos as i64;
                let targets = displacements
                    .into_iter()
                    .map(|d| Ok(BranchTarget::Offset(absolute(end, d)?)))
                    .collect::<Result<Vec<_>, DisasmError>>()?;
                Operand::Switch(targets)
            }
        };

        stream.append(Instruction::new(start, Op::Code(opcode), operand)?)?;
    }

    resolve_targets(&mut stream)?;
    Ok(stream)
}

/// Pass two: every raw offset target becomes a reference to the instruction
/// at that offset.
fn resolve_targets(stream: &mut InstructionStream) -> Result<(), DisasmError> {
    let mut patches: Vec<(usize, Operand)> = Vec::new();
    for (index, instr) in stream.iter().enumerate() {
        match instr.operand() {
            Operand::Target(BranchTarget::Offset(offset)) => {
                let resolved = resolve_one(stream, *offset)?;
                patches.push((index, Operand::Target(resolved)));
            }
            Operand::Switch(targets) => {
                let resolved = targets
                    .iter()
                    .map(|t| match t {
                        BranchTarget::Offset(offset) => resolve_one(stream, *offset),
                        other => Ok(*other),
                    })
                    .collect::<Result<Vec<_>, DisasmError>>()?;
                patches.push((index, Operand::Switch(resolved)));
            }
            _ => {}
        }
    }
    for (index, operand) in patches {
        stream.patch_operand(index, operand)?;
    }
    Ok(())
}

fn resolve_one(stream: &InstructionStream, offset: u32) -> Result<BranchTarget, DisasmError> {
    match stream.at_offset(offset) {
        Some((_, instr)) => Ok(BranchTarget::Instruction(instr.position())),
        None => Err(DisasmError::MisalignedTarget {
            offset: i64::from(offset),
        }),
    }
}
