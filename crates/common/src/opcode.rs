//! Opcode definitions for the ilforge stack-machine instruction set.
//!
//! One-byte opcodes carry their encoding byte as the discriminant. Extended
//! opcodes are prefixed with `0xFE` on the wire and carry `0xFE00 | second`
//! so every opcode has a single stable `u16` value.

use crate::operand::OperandKind;

/// Prefix byte selecting the extended (two-byte) opcode table.
pub const EXT_PREFIX: u8 = 0xFE;

/// Identifies one primitive instruction of the target stack machine.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop = 0x00,

    // Dedicated argument/local forms (indices 0-3 baked into the opcode).
    Ldarg0 = 0x02,
    Ldarg1 = 0x03,
    Ldarg2 = 0x04,
    Ldarg3 = 0x05,
    Ldloc0 = 0x06,
    Ldloc1 = 0x07,
    Ldloc2 = 0x08,
    Ldloc3 = 0x09,
    Stloc0 = 0x0A,
    Stloc1 = 0x0B,
    Stloc2 = 0x0C,
    Stloc3 = 0x0D,

    // Short (one-byte-index) argument/local forms.
    LdargS = 0x0E,
    LdargaS = 0x0F,
    StargS = 0x10,
    LdlocS = 0x11,
    LdlocaS = 0x12,
    StlocS = 0x13,

    Ldnull = 0x14,

    // Dedicated small integer constants (-1 through 8).
    LdcI4M1 = 0x15,
    LdcI4_0 = 0x16,
    LdcI4_1 = 0x17,
    LdcI4_2 = 0x18,
    LdcI4_3 = 0x19,
    LdcI4_4 = 0x1A,
    LdcI4_5 = 0x1B,
    LdcI4_6 = 0x1C,
    LdcI4_7 = 0x1D,
    LdcI4_8 = 0x1E,
    LdcI4S = 0x1F,
    LdcI4 = 0x20,
    LdcI8 = 0x21,
    LdcR4 = 0x22,
    LdcR8 = 0x23,

    Dup = 0x25,
    Pop = 0x26,

    Call = 0x28,
    Calli = 0x29,
    Ret = 0x2A,

    // Short (one-byte relative) branches.
    BrS = 0x2B,
    BrfalseS = 0x2C,
    BrtrueS = 0x2D,
    BeqS = 0x2E,
    BgeS = 0x2F,
    BgtS = 0x30,
    BleS = 0x31,
    BltS = 0x32,
    BneUnS = 0x33,
    BgeUnS = 0x34,
    BgtUnS = 0x35,
    BleUnS = 0x36,
    BltUnS = 0x37,

    // Long (four-byte relative) branches.
    Br = 0x38,
    Brfalse = 0x39,
    Brtrue = 0x3A,
    Beq = 0x3B,
    Bge = 0x3C,
    Bgt = 0x3D,
    Ble = 0x3E,
    Blt = 0x3F,
    BneUn = 0x40,
    BgeUn = 0x41,
    BgtUn = 0x42,
    BleUn = 0x43,
    BltUn = 0x44,

    Switch = 0x45,

    // Indirect loads/stores through an address.
    LdindI1 = 0x46,
    LdindU1 = 0x47,
    LdindI2 = 0x48,
    LdindU2 = 0x49,
    LdindI4 = 0x4A,
    LdindU4 = 0x4B,
    LdindI8 = 0x4C,
    LdindI = 0x4D,
    LdindR4 = 0x4E,
    LdindR8 = 0x4F,
    LdindRef = 0x50,
    StindRef = 0x51,
    StindI1 = 0x52,
    StindI2 = 0x53,
    StindI4 = 0x54,
    StindI8 = 0x55,
    StindR4 = 0x56,
    StindR8 = 0x57,

    // Arithmetic and logic.
    Add = 0x58,
    Sub = 0x59,
    Mul = 0x5A,
    Div = 0x5B,
    DivUn = 0x5C,
    Rem = 0x5D,
    RemUn = 0x5E,
    And = 0x5F,
    Or = 0x60,
    Xor = 0x61,
    Shl = 0x62,
    Shr = 0x63,
    ShrUn = 0x64,
    Neg = 0x65,
    Not = 0x66,

    // Numeric conversions.
    ConvI1 = 0x67,
    ConvI2 = 0x68,
    ConvI4 = 0x69,
    ConvI8 = 0x6A,
    ConvR4 = 0x6B,
    ConvR8 = 0x6C,
    ConvU4 = 0x6D,
    ConvU8 = 0x6E,

    Callvirt = 0x6F,
    Ldobj = 0x71,
    Ldstr = 0x72,
    Newobj = 0x73,
    Castclass = 0x74,
    Isinst = 0x75,
    Unbox = 0x79,
    Throw = 0x7A,

    // Field access.
    Ldfld = 0x7B,
    Ldflda = 0x7C,
    Stfld = 0x7D,
    Ldsfld = 0x7E,
    Ldsflda = 0x7F,
    Stsfld = 0x80,
    Stobj = 0x81,

    Box = 0x8C,
    Newarr = 0x8D,
    Ldlen = 0x8E,
    Ldelema = 0x8F,

    // Specialized element loads.
    LdelemI1 = 0x90,
    LdelemU1 = 0x91,
    LdelemI2 = 0x92,
    LdelemU2 = 0x93,
    LdelemI4 = 0x94,
    LdelemU4 = 0x95,
    LdelemI8 = 0x96,
    LdelemI = 0x97,
    LdelemR4 = 0x98,
    LdelemR8 = 0x99,
    LdelemRef = 0x9A,

    // Specialized element stores.
    StelemI = 0x9B,
    StelemI1 = 0x9C,
    StelemI2 = 0x9D,
    StelemI4 = 0x9E,
    StelemI8 = 0x9F,
    StelemR4 = 0xA0,
    StelemR8 = 0xA1,
    StelemRef = 0xA2,

    // Generic typed element access and unboxing.
    Ldelem = 0xA3,
    Stelem = 0xA4,
    UnboxAny = 0xA5,

    Endfinally = 0xDC,
    Leave = 0xDD,
    LeaveS = 0xDE,

    // Extended (0xFE-prefixed) opcodes.
    Ceq = 0xFE01,
    Cgt = 0xFE02,
    CgtUn = 0xFE03,
    Clt = 0xFE04,
    CltUn = 0xFE05,
    Ldarg = 0xFE09,
    Ldarga = 0xFE0A,
    Starg = 0xFE0B,
    Ldloc = 0xFE0C,
    Ldloca = 0xFE0D,
    Stloc = 0xFE0E,
    Unaligned = 0xFE12,
    Rethrow = 0xFE1A,
}

/// All opcodes, in encoding order. Useful for exhaustive testing and for
/// the linear byte-to-opcode lookups.
pub const ALL_OPCODES: [Opcode; 165] = [
    Opcode::Nop,
    Opcode::Ldarg0,
    Opcode::Ldarg1,
    Opcode::Ldarg2,
    Opcode::Ldarg3,
    Opcode::Ldloc0,
    Opcode::Ldloc1,
    Opcode::Ldloc2,
    Opcode::Ldloc3,
    Opcode::Stloc0,
    Opcode::Stloc1,
    Opcode::Stloc2,
    Opcode::Stloc3,
    Opcode::LdargS,
    Opcode::LdargaS,
    Opcode::StargS,
    Opcode::LdlocS,
    Opcode::LdlocaS,
    Opcode::StlocS,
    Opcode::Ldnull,
    Opcode::LdcI4M1,
    Opcode::LdcI4_0,
    Opcode::LdcI4_1,
    Opcode::LdcI4_2,
    Opcode::LdcI4_3,
    Opcode::LdcI4_4,
    Opcode::LdcI4_5,
    Opcode::LdcI4_6,
    Opcode::LdcI4_7,
    Opcode::LdcI4_8,
    Opcode::LdcI4S,
    Opcode::LdcI4,
    Opcode::LdcI8,
    Opcode::LdcR4,
    Opcode::LdcR8,
    Opcode::Dup,
    Opcode::Pop,
    Opcode::Call,
    Opcode::Calli,
    Opcode::Ret,
    Opcode::BrS,
    Opcode::BrfalseS,
    Opcode::BrtrueS,
    Opcode::BeqS,
    Opcode::BgeS,
    Opcode::BgtS,
    Opcode::BleS,
    Opcode::BltS,
    Opcode::BneUnS,
    Opcode::BgeUnS,
    Opcode::BgtUnS,
    Opcode::BleUnS,
    Opcode::BltUnS,
    Opcode::Br,
    Opcode::Brfalse,
    Opcode::Brtrue,
    Opcode::Beq,
    Opcode::Bge,
    Opcode::Bgt,
    Opcode::Ble,
    Opcode::Blt,
    Opcode::BneUn,
    Opcode::BgeUn,
    Opcode::BgtUn,
    Opcode::BleUn,
    Opcode::BltUn,
    Opcode::Switch,
    Opcode::LdindI1,
    Opcode::LdindU1,
    Opcode::LdindI2,
    Opcode::LdindU2,
    Opcode::LdindI4,
    Opcode::LdindU4,
    Opcode::LdindI8,
    Opcode::LdindI,
    Opcode::LdindR4,
    Opcode::LdindR8,
    Opcode::LdindRef,
    Opcode::StindRef,
    Opcode::StindI1,
    Opcode::StindI2,
    Opcode::StindI4,
    Opcode::StindI8,
    Opcode::StindR4,
    Opcode::StindR8,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::DivUn,
    Opcode::Rem,
    Opcode::RemUn,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Shl,
    Opcode::Shr,
    Opcode::ShrUn,
    Opcode::Neg,
    Opcode::Not,
    Opcode::ConvI1,
    Opcode::ConvI2,
    Opcode::ConvI4,
    Opcode::ConvI8,
    Opcode::ConvR4,
    Opcode::ConvR8,
    Opcode::ConvU4,
    Opcode::ConvU8,
    Opcode::Callvirt,
    Opcode::Ldobj,
    Opcode::Ldstr,
    Opcode::Newobj,
    Opcode::Castclass,
    Opcode::Isinst,
    Opcode::Unbox,
    Opcode::Throw,
    Opcode::Ldfld,
    Opcode::Ldflda,
    Opcode::Stfld,
    Opcode::Ldsfld,
    Opcode::Ldsflda,
    Opcode::Stsfld,
    Opcode::Stobj,
    Opcode::Box,
    Opcode::Newarr,
    Opcode::Ldlen,
    Opcode::Ldelema,
    Opcode::LdelemI1,
    Opcode::LdelemU1,
    Opcode::LdelemI2,
    Opcode::LdelemU2,
    Opcode::LdelemI4,
    Opcode::LdelemU4,
    Opcode::LdelemI8,
    Opcode::LdelemI,
    Opcode::LdelemR4,
    Opcode::LdelemR8,
    Opcode::LdelemRef,
    Opcode::StelemI,
    Opcode::StelemI1,
    Opcode::StelemI2,
    Opcode::StelemI4,
    Opcode::StelemI8,
    Opcode::StelemR4,
    Opcode::StelemR8,
    Opcode::StelemRef,
    Opcode::Ldelem,
    Opcode::Stelem,
    Opcode::UnboxAny,
    Opcode::Endfinally,
    Opcode::Leave,
    Opcode::LeaveS,
    Opcode::Ceq,
    Opcode::Cgt,
    Opcode::CgtUn,
    Opcode::Clt,
    Opcode::CltUn,
    Opcode::Ldarg,
    Opcode::Ldarga,
    Opcode::Starg,
    Opcode::Ldloc,
    Opcode::Ldloca,
    Opcode::Stloc,
    Opcode::Unaligned,
    Opcode::Rethrow,
];

impl Opcode {
    /// The stable `u16` value: the encoding byte, or `0xFE00 | second` for
    /// extended opcodes.
    pub fn value(self) -> u16 {
        self as u16
    }

    /// True if this opcode encodes with the `0xFE` prefix.
    pub fn is_extended(self) -> bool {
        self.value() > 0xFF
    }

    /// Number of opcode bytes on the wire (1 or 2).
    pub fn encoded_len(self) -> u32 {
        if self.is_extended() {
            2
        } else {
            1
        }
    }

    /// Look up a one-byte opcode. `None` for unassigned bytes and for the
    /// extended-table prefix itself.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        if byte == EXT_PREFIX {
            return None;
        }
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| op.value() == u16::from(byte))
    }

    /// Look up the second byte of an extended (`0xFE`-prefixed) opcode.
    pub fn from_ext(byte: u8) -> Option<Opcode> {
        let value = 0xFE00 | u16::from(byte);
        ALL_OPCODES.iter().copied().find(|op| op.value() == value)
    }

    /// Canonical lowercase mnemonic, as used in renderings.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Ldarg0 => "ldarg.0",
            Opcode::Ldarg1 => "ldarg.1",
            Opcode::Ldarg2 => "ldarg.2",
            Opcode::Ldarg3 => "ldarg.3",
            Opcode::Ldloc0 => "ldloc.0",
            Opcode::Ldloc1 => "ldloc.1",
            Opcode::Ldloc2 => "ldloc.2",
            Opcode::Ldloc3 => "ldloc.3",
            Opcode::Stloc0 => "stloc.0",
            Opcode::Stloc1 => "stloc.1",
            Opcode::Stloc2 => "stloc.2",
            Opcode::Stloc3 => "stloc.3",
            Opcode::LdargS => "ldarg.s",
            Opcode::LdargaS => "ldarga.s",
            Opcode::StargS => "starg.s",
            Opcode::LdlocS => "ldloc.s",
            Opcode::LdlocaS => "ldloca.s",
            Opcode::StlocS => "stloc.s",
            Opcode::Ldnull => "ldnull",
            Opcode::LdcI4M1 => "ldc.i4.m1",
            Opcode::LdcI4_0 => "ldc.i4.0",
            Opcode::LdcI4_1 => "ldc.i4.1",
            Opcode::LdcI4_2 => "ldc.i4.2",
            Opcode::LdcI4_3 => "ldc.i4.3",
            Opcode::LdcI4_4 => "ldc.i4.4",
            Opcode::LdcI4_5 => "ldc.i4.5",
            Opcode::LdcI4_6 => "ldc.i4.6",
            Opcode::LdcI4_7 => "ldc.i4.7",
            Opcode::LdcI4_8 => "ldc.i4.8",
            Opcode::LdcI4S => "ldc.i4.s",
            Opcode::LdcI4 => "ldc.i4",
            Opcode::LdcI8 => "ldc.i8",
            Opcode::LdcR4 => "ldc.r4",
            Opcode::LdcR8 => "ldc.r8",
            Opcode::Dup => "dup",
            Opcode::Pop => "pop",
            Opcode::Call => "call",
            Opcode::Calli => "calli",
            Opcode::Ret => "ret",
            Opcode::BrS => "br.s",
            Opcode::BrfalseS => "brfalse.s",
            Opcode::BrtrueS => "brtrue.s",
            Opcode::BeqS => "beq.s",
            Opcode::BgeS => "bge.s",
            Opcode::BgtS => "bgt.s",
            Opcode::BleS => "ble.s",
            Opcode::BltS => "blt.s",
            Opcode::BneUnS => "bne.un.s",
            Opcode::BgeUnS => "bge.un.s",
            Opcode::BgtUnS => "bgt.un.s",
            Opcode::BleUnS => "ble.un.s",
            Opcode::BltUnS => "blt.un.s",
            Opcode::Br => "br",
            Opcode::Brfalse => "brfalse",
            Opcode::Brtrue => "brtrue",
            Opcode::Beq => "beq",
            Opcode::Bge => "bge",
            Opcode::Bgt => "bgt",
            Opcode::Ble => "ble",
            Opcode::Blt => "blt",
            Opcode::BneUn => "bne.un",
            Opcode::BgeUn => "bge.un",
            Opcode::BgtUn => "bgt.un",
            Opcode::BleUn => "ble.un",
            Opcode::BltUn => "blt.un",
            Opcode::Switch => "switch",
            Opcode::LdindI1 => "ldind.i1",
            Opcode::LdindU1 => "ldind.u1",
            Opcode::LdindI2 => "ldind.i2",
            Opcode::LdindU2 => "ldind.u2",
            Opcode::LdindI4 => "ldind.i4",
            Opcode::LdindU4 => "ldind.u4",
            Opcode::LdindI8 => "ldind.i8",
            Opcode::LdindI => "ldind.i",
            Opcode::LdindR4 => "ldind.r4",
            Opcode::LdindR8 => "ldind.r8",
            Opcode::LdindRef => "ldind.ref",
            Opcode::StindRef => "stind.ref",
            Opcode::StindI1 => "stind.i1",
            Opcode::StindI2 => "stind.i2",
            Opcode::StindI4 => "stind.i4",
            Opcode::StindI8 => "stind.i8",
            Opcode::StindR4 => "stind.r4",
            Opcode::StindR8 => "stind.r8",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::DivUn => "div.un",
            Opcode::Rem => "rem",
            Opcode::RemUn => "rem.un",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::ShrUn => "shr.un",
            Opcode::Neg => "neg",
            Opcode::Not => "not",
            Opcode::ConvI1 => "conv.i1",
            Opcode::ConvI2 => "conv.i2",
            Opcode::ConvI4 => "conv.i4",
            Opcode::ConvI8 => "conv.i8",
            Opcode::ConvR4 => "conv.r4",
            Opcode::ConvR8 => "conv.r8",
            Opcode::ConvU4 => "conv.u4",
            Opcode::ConvU8 => "conv.u8",
            Opcode::Callvirt => "callvirt",
            Opcode::Ldobj => "ldobj",
            Opcode::Ldstr => "ldstr",
            Opcode::Newobj => "newobj",
            Opcode::Castclass => "castclass",
            Opcode::Isinst => "isinst",
            Opcode::Unbox => "unbox",
            Opcode::Throw => "throw",
            Opcode::Ldfld => "ldfld",
            Opcode::Ldflda => "ldflda",
            Opcode::Stfld => "stfld",
            Opcode::Ldsfld => "ldsfld",
            Opcode::Ldsflda => "ldsflda",
            Opcode::Stsfld => "stsfld",
            Opcode::Stobj => "stobj",
            Opcode::Box => "box",
            Opcode::Newarr => "newarr",
            Opcode::Ldlen => "ldlen",
            Opcode::Ldelema => "ldelema",
            Opcode::LdelemI1 => "ldelem.i1",
            Opcode::LdelemU1 => "ldelem.u1",
            Opcode::LdelemI2 => "ldelem.i2",
            Opcode::LdelemU2 => "ldelem.u2",
            Opcode::LdelemI4 => "ldelem.i4",
            Opcode::LdelemU4 => "ldelem.u4",
            Opcode::LdelemI8 => "ldelem.i8",
            Opcode::LdelemI => "ldelem.i",
            Opcode::LdelemR4 => "ldelem.r4",
            Opcode::LdelemR8 => "ldelem.r8",
            Opcode::LdelemRef => "ldelem.ref",
            Opcode::StelemI => "stelem.i",
            Opcode::StelemI1 => "stelem.i1",
            Opcode::StelemI2 => "stelem.i2",
            Opcode::StelemI4 => "stelem.i4",
            Opcode::StelemI8 => "stelem.i8",
            Opcode::StelemR4 => "stelem.r4",
            Opcode::StelemR8 => "stelem.r8",
            Opcode::StelemRef => "stelem.ref",
            Opcode::Ldelem => "ldelem",
            Opcode::Stelem => "stelem",
            Opcode::UnboxAny => "unbox.any",
            Opcode::Endfinally => "endfinally",
            Opcode::Leave => "leave",
            Opcode::LeaveS => "leave.s",
            Opcode::Ceq => "ceq",
            Opcode::Cgt => "cgt",
            Opcode::CgtUn => "cgt.un",
            Opcode::Clt => "clt",
            Opcode::CltUn => "clt.un",
            Opcode::Ldarg => "ldarg",
            Opcode::Ldarga => "ldarga",
            Opcode::Starg => "starg",
            Opcode::Ldloc => "ldloc",
            Opcode::Ldloca => "ldloca",
            Opcode::Stloc => "stloc",
            Opcode::Unaligned => "unaligned.",
            Opcode::Rethrow => "rethrow",
        }
    }

    /// The operand shape this opcode declares.
    pub fn operand_kind(self) -> OperandKind {
        use Opcode::*;
        match self {
            LdcI4S | Unaligned => OperandKind::Int8,
            LdcI4 => OperandKind::Int32,
            LdcI8 => OperandKind::Int64,
            LdcR4 => OperandKind::Float32,
            LdcR8 => OperandKind::Float64,
            Ldstr => OperandKind::Str,
            Call | Callvirt | Newobj => OperandKind::Method,
            Calli => OperandKind::Signature,
            Ldobj | Stobj | Castclass | Isinst | Unbox | UnboxAny | Box | Newarr | Ldelema
            | Ldelem | Stelem => OperandKind::Type,
            Ldfld | Ldflda | Stfld | Ldsfld | Ldsflda | Stsfld => OperandKind::Field,
            LdlocS | LdlocaS | StlocS => OperandKind::LocalShort,
            Ldloc | Ldloca | Stloc => OperandKind::LocalLong,
            LdargS | LdargaS | StargS => OperandKind::ArgShort,
            Ldarg | Ldarga | Starg => OperandKind::ArgLong,
            BrS | BrfalseS | BrtrueS | BeqS | BgeS | BgtS | BleS | BltS | BneUnS | BgeUnS
            | BgtUnS | BleUnS | BltUnS | LeaveS => OperandKind::TargetShort,
            Br | Brfalse | Brtrue | Beq | Bge | Bgt | Ble | Blt | BneUn | BgeUn | BgtUn
            | BleUn | BltUn | Leave => OperandKind::TargetLong,
            Switch => OperandKind::Switch,
            _ => OperandKind::None,
        }
    }

    /// True for branch opcodes (including `leave`), short or long form.
    pub fn is_branch(self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::TargetShort | OperandKind::TargetLong
        )
    }

    /// The four-byte-displacement form of a branch opcode (identity for
    /// long forms, `None` for non-branches).
    pub fn long_form(self) -> Option<Opcode> {
        use Opcode::*;
        match self {
            BrS | Br => Some(Br),
            BrfalseS | Brfalse => Some(Brfalse),
            BrtrueS | Brtrue => Some(Brtrue),
            BeqS | Beq => Some(Beq),
            BgeS | Bge => Some(Bge),
            BgtS | Bgt => Some(Bgt),
            BleS | Ble => Some(Ble),
            BltS | Blt => Some(Blt),
            BneUnS | BneUn => Some(BneUn),
            BgeUnS | BgeUn => Some(BgeUn),
            BgtUnS | BgtUn => Some(BgtUn),
            BleUnS | BleUn => Some(BleUn),
            BltUnS | BltUn => Some(BltUn),
            LeaveS | Leave => Some(Leave),
            _ => None,
        }
    }

    /// The one-byte-displacement form of a branch opcode (identity for
    /// short forms, `None` for non-branches).
    pub fn short_form(self) -> Option<Opcode> {
        use Opcode::*;
        match self {
            BrS | Br => Some(BrS),
            BrfalseS | Brfalse => Some(BrfalseS),
            BrtrueS | Brtrue => Some(BrtrueS),
            BeqS | Beq => Some(BeqS),
            BgeS | Bge => Some(BgeS),
            BgtS | Bgt => Some(BgtS),
            BleS | Ble => Some(BleS),
            BltS | Blt => Some(BltS),
            BneUnS | BneUn => Some(BneUnS),
            BgeUnS | BgeUn => Some(BgeUnS),
            BgtUnS | BgtUn => Some(BgtUnS),
            BleUnS | BleUn => Some(BleUnS),
            BltUnS | BltUn => Some(BltUnS),
            LeaveS | Leave => Some(LeaveS),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_opcodes_count() {
        assert_eq!(ALL_OPCODES.len(), 165);
    }

    #[test]
    fn values_are_unique_and_ordered() {
        for pair in ALL_OPCODES.windows(2) {
            assert!(
                pair[0].value() < pair[1].value(),
                "out of order: {:?} {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn roundtrip_one_byte_table() {
        for &op in ALL_OPCODES.iter().filter(|op| !op.is_extended()) {
            let byte = op.value() as u8;
            assert_eq!(Opcode::from_byte(byte), Some(op), "byte {byte:#04x}");
        }
    }

    #[test]
    fn roundtrip_extended_table() {
        for &op in ALL_OPCODES.iter().filter(|op| op.is_extended()) {
            let byte = (op.value() & 0xFF) as u8;
            assert_eq!(Opcode::from_ext(byte), Some(op), "byte 0xfe {byte:#04x}");
        }
    }

    #[test]
    fn prefix_byte_is_never_an_opcode() {
        assert_eq!(Opcode::from_byte(EXT_PREFIX), None);
    }

    #[test]
    fn unassigned_bytes_are_rejected() {
        for byte in [0x01u8, 0x24, 0x27, 0x70, 0x8B, 0xC0, 0xFD] {
            assert_eq!(Opcode::from_byte(byte), None, "byte {byte:#04x}");
        }
        for byte in [0x00u8, 0x06, 0x20, 0xFF] {
            assert_eq!(Opcode::from_ext(byte), None, "ext byte {byte:#04x}");
        }
    }

    #[test]
    fn every_branch_has_both_forms() {
        for &op in ALL_OPCODES.iter().filter(|op| op.is_branch()) {
            let long = op.long_form().expect("long form");
            let short = op.short_form().expect("short form");
            assert_eq!(long.operand_kind(), OperandKind::TargetLong);
            assert_eq!(short.operand_kind(), OperandKind::TargetShort);
            assert_eq!(long.short_form(), Some(short));
            assert_eq!(short.long_form(), Some(long));
        }
    }

    #[test]
    fn non_branches_have_no_forms() {
        assert_eq!(Opcode::Add.long_form(), None);
        assert_eq!(Opcode::Switch.long_form(), None);
        assert_eq!(Opcode::Ret.short_form(), None);
    }

    #[test]
    fn mnemonics_are_lowercase_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for &op in &ALL_OPCODES {
            let m = op.mnemonic();
            assert!(!m.is_empty());
            assert_eq!(m, m.to_lowercase(), "mnemonic should be lowercase: {m}");
            assert!(seen.insert(m), "duplicate mnemonic {m}");
        }
    }

    #[test]
    fn extended_opcodes_encode_two_bytes() {
        assert_eq!(Opcode::Ldloc.encoded_len(), 2);
        assert_eq!(Opcode::Ceq.encoded_len(), 2);
        assert_eq!(Opcode::Ldloc0.encoded_len(), 1);
    }

    #[test]
    fn dedicated_constant_forms_take_no_operand() {
        for op in [
            Opcode::LdcI4M1,
            Opcode::LdcI4_0,
            Opcode::LdcI4_8,
            Opcode::Ldloc0,
            Opcode::Ldarg3,
        ] {
            assert_eq!(op.operand_kind(), OperandKind::None, "{op:?}");
        }
    }
}
