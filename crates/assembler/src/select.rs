//! The opcode selector: pure mappings from logical requests to the most
//! compact concrete instruction form.
//!
//! Every function here is deterministic and side-effect-free so the tier
//! rules can be tested without a live emission target. The emission surface
//! supplies the operand; whether one is needed follows from the selected
//! opcode's declared operand kind.

use ilforge_common::{Opcode, Primitive, TypeDesc};

use crate::error::EmitError;

/// Largest argument index: arguments are counted with a signed 16-bit count.
pub const MAX_ARG_INDEX: i32 = i16::MAX as i32;

/// Load-local tiering: 0-3 dedicated, 4-255 short, 256+ long.
pub fn load_local(index: u16) -> Opcode {
    match index {
        0 => Opcode::Ldloc0,
        1 => Opcode::Ldloc1,
        2 => Opcode::Ldloc2,
        3 => Opcode::Ldloc3,
        4..=255 => Opcode::LdlocS,
        _ => Opcode::Ldloc,
    }
}

/// Store-local tiering, identical tier structure to [`load_local`].
pub fn store_local(index: u16) -> Opcode {
    match index {
        0 => Opcode::Stloc0,
        1 => Opcode::Stloc1,
        2 => Opcode::Stloc2,
        3 => Opcode::Stloc3,
        4..=255 => Opcode::StlocS,
        _ => Opcode::Stloc,
    }
}

/// Load-local-address tiering. No dedicated zero-operand tier exists.
pub fn load_local_address(index: u16) -> Opcode {
    if index <= 255 {
        Opcode::LdlocaS
    } else {
        Opcode::Ldloca
    }
}

fn check_arg_index(index: i32) -> Result<u16, EmitError> {
    if (0..=MAX_ARG_INDEX).contains(&index) {
        Ok(index as u16)
    } else {
        Err(EmitError::ArgumentOutOfRange { index })
    }
}

/// Load-argument tiering. The index must fit a signed 16-bit count; out of
/// range is a hard error, never a truncation.
pub fn load_argument(index: i32) -> Result<Opcode, EmitError> {
    Ok(match check_arg_index(index)? {
        0 => Opcode::Ldarg0,
        1 => Opcode::Ldarg1,
        2 => Opcode::Ldarg2,
        3 => Opcode::Ldarg3,
        4..=255 => Opcode::LdargS,
        _ => Opcode::Ldarg,
    })
}

/// Load-argument-address tiering; same range precondition as
/// [`load_argument`].
pub fn load_argument_address(index: i32) -> Result<Opcode, EmitError> {
    Ok(if check_arg_index(index)? <= 255 {
        Opcode::LdargaS
    } else {
        Opcode::Ldarga
    })
}

/// Store-argument tiering; same range precondition as [`load_argument`].
pub fn store_argument(index: i32) -> Result<Opcode, EmitError> {
    Ok(if check_arg_index(index)? <= 255 {
        Opcode::StargS
    } else {
        Opcode::Starg
    })
}

/// Integer-constant tiering: -1..=8 dedicated, i8 range short, else the
/// four-byte form.
pub fn load_i32(value: i32) -> Opcode {
    match value {
        -1 => Opcode::LdcI4M1,
        0 => Opcode::LdcI4_0,
        1 => Opcode::LdcI4_1,
        2 => Opcode::LdcI4_2,
        3 => Opcode::LdcI4_3,
        4 => Opcode::LdcI4_4,
        5 => Opcode::LdcI4_5,
        6 => Opcode::LdcI4_6,
        7 => Opcode::LdcI4_7,
        8 => Opcode::LdcI4_8,
        _ if i8::try_from(value).is_ok() => Opcode::LdcI4S,
        _ => Opcode::LdcI4,
    }
}

/// Choose between a branch's short and long encoding. Short is taken only
/// when the label is known to be within short range; a best-effort local
/// decision, not a global relaxation pass.
pub fn branch_form(long: Opcode, short_eligible: bool) -> Opcode {
    if short_eligible {
        long.short_form().unwrap_or(long)
    } else {
        long
    }
}

/// Element-load dispatch on the declared element type: specialized
/// zero-operand forms for tagged primitives and references, the generic
/// typed form for everything else.
pub fn element_load(ty: &TypeDesc) -> Opcode {
    match ty.primitive_tag() {
        Some(Primitive::I) => Opcode::LdelemI,
        Some(Primitive::I1) => Opcode::LdelemI1,
        Some(Primitive::U1) => Opcode::LdelemU1,
        Some(Primitive::I2) => Opcode::LdelemI2,
        Some(Primitive::U2) => Opcode::LdelemU2,
        Some(Primitive::I4) => Opcode::LdelemI4,
        Some(Primitive::U4) => Opcode::LdelemU4,
        // No unsigned 8-byte form exists; the signed load is bit-identical.
        Some(Primitive::I8) | Some(Primitive::U8) => Opcode::LdelemI8,
        Some(Primitive::R4) => Opcode::LdelemR4,
        Some(Primitive::R8) => Opcode::LdelemR8,
        None if ty.is_reference_type() => Opcode::LdelemRef,
        None => Opcode::Ldelem,
    }
}

/// Element-store dispatch; unsigned tags store through the signed forms.
pub fn element_store(ty: &TypeDesc) -> Opcode {
    match ty.primitive_tag() {
        Some(Primitive::I) => Opcode::StelemI,
        Some(Primitive::I1) | Some(Primitive::U1) => Opcode::StelemI1,
        Some(Primitive::I2) | Some(Primitive::U2) => Opcode::StelemI2,
        Some(Primitive::I4) | Some(Primitive::U4) => Opcode::StelemI4,
        Some(Primitive::I8) | Some(Primitive::U8) => Opcode::StelemI8,
        Some(Primitive::R4) => Opcode::StelemR4,
        Some(Primitive::R8) => Opcode::StelemR8,
        None if ty.is_reference_type() => Opcode::StelemRef,
        None => Opcode::Stelem,
    }
}

/// Indirect-load dispatch for loading a value through an address.
pub fn indirect_load(ty: &TypeDesc) -> Opcode {
    match ty.primitive_tag() {
        Some(Primitive::I) => Opcode::LdindI,
        Some(Primitive::I1) => Opcode::LdindI1,
        Some(Primitive::U1) => Opcode::LdindU1,
        Some(Primitive::I2) => Opcode::LdindI2,
        Some(Primitive::U2) => Opcode::LdindU2,
        Some(Primitive::I4) => Opcode::LdindI4,
        Some(Primitive::U4) => Opcode::LdindU4,
        Some(Primitive::I8) | Some(Primitive::U8) => Opcode::LdindI8,
        Some(Primitive::R4) => Opcode::LdindR4,
        Some(Primitive::R8) => Opcode::LdindR8,
        None if ty.is_reference_type() => Opcode::LdindRef,
        None => Opcode::Ldobj,
    }
}

/// The three ways a field can be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Load,
    LoadAddress,
    Store,
}

/// Static/instance field dispatch, decided purely by the field's own flag.
pub fn field_opcode(is_static: bool, op: FieldOp) -> Opcode {
    match (is_static, op) {
        (true, FieldOp::Load) => Opcode::Ldsfld,
        (true, FieldOp::LoadAddress) => Opcode::Ldsflda,
        (true, FieldOp::Store) => Opcode::Stsfld,
        (false, FieldOp::Load) => Opcode::Ldfld,
        (false, FieldOp::LoadAddress) => Opcode::Ldflda,
        (false, FieldOp::Store) => Opcode::Stfld,
    }
}
