//! The coercion decision procedure.
//!
//! [`plan`] is pure: it inspects the two type descriptors and the context's
//! assignability oracle and either produces the step sequence that adapts
//! the loaded value, or reports why none exists. The ordering is a triage
//! from the cheapest cases (identity, boxing, unboxing) to the most general
//! (assignability-based downcast); several branches are refused outright
//! rather than approximated.

use ilforge_assembler::{Assembler, EmitError, EmitTarget};
use ilforge_common::{EmitContext, TypeDesc};

use crate::error::CoerceError;

/// One instruction's worth of adaptation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionStep {
    /// Wrap a value type in its reference envelope.
    Box(TypeDesc),
    /// Extract a boxed value back out, by value.
    UnboxAny(TypeDesc),
    /// Extract a boxed value's address.
    UnboxToAddress(TypeDesc),
    /// Downcast a reference.
    Cast(TypeDesc),
    /// Load a value of the given type through the address on the stack.
    LoadIndirect(TypeDesc),
}

/// The instruction sequence adapting a value from one type to another.
/// An empty plan means the value is already compatible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionPlan {
    steps: Vec<CoercionStep>,
}

impl CoercionPlan {
    fn noop() -> Self {
        Self::default()
    }

    fn one(step: CoercionStep) -> Self {
        CoercionPlan { steps: vec![step] }
    }

    pub fn steps(&self) -> &[CoercionStep] {
        &self.steps
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Decide how to adapt a loaded value of `src` to a location of `dst`.
///
/// First match wins:
/// 1. void destination: nothing to produce.
/// 2-4. unmanaged pointers on either side, or a void source, are refused.
/// 5-6. strip by-reference from both sides; equal stripped types either
///    match (no-op), dereference (by-ref source, by-value destination), or
///    are refused (a transient by-value source has no address to take).
/// 7. a by-value `object` source unboxes to a value type (to address when
///    the destination is by-reference) or downcasts to a reference type.
/// 8. any other by-reference combination is refused.
/// 9. an `object` destination boxes value types; references already fit.
/// 10. assignable reference types downcast.
/// 11. otherwise no coercion exists.
pub fn plan(
    src: &TypeDesc,
    dst: &TypeDesc,
    ctx: &EmitContext,
) -> Result<CoercionPlan, CoerceError> {
    if dst.is_void() {
        return Ok(CoercionPlan::noop());
    }
    if dst.is_unmanaged_pointer() {
        return Err(CoerceError::UnmanagedPointer {
            ty: dst.to_string(),
        });
    }
    if src.is_void() {
        return Err(CoerceError::ValueExpected);
    }
    if src.is_unmanaged_pointer() {
        return Err(CoerceError::UnmanagedPointer {
            ty: src.to_string(),
        });
    }

    let src_by_ref = src.is_by_ref();
    let dst_by_ref = dst.is_by_ref();
    let s = src.strip_by_ref();
    let d = dst.strip_by_ref();

    if s == d {
        return if src_by_ref == dst_by_ref {
            Ok(CoercionPlan::noop())
        } else if src_by_ref {
            Ok(CoercionPlan::one(CoercionStep::LoadIndirect(d)))
        } else {
            // The value on the stack has no addressable home to reference.
            Err(CoerceError::ByRefUnsupported {
                src: src.to_string(),
                dst: dst.to_string(),
            })
        };
    }

    if !src_by_ref && &s == ctx.object() {
        if d.is_value_type() {
            return Ok(CoercionPlan::one(if dst_by_ref {
                CoercionStep::UnboxToAddress(d)
            } else {
                CoercionStep::UnboxAny(d)
            }));
        }
        if d.is_reference_type() {
            if dst_by_ref {
                return Err(CoerceError::ByRefUnsupported {
                    src: src.to_string(),
                    dst: dst.to_string(),
                });
            }
            return Ok(CoercionPlan::one(CoercionStep::Cast(d)));
        }
    }

    if src_by_ref || dst_by_ref {
        return Err(CoerceError::ByRefUnsupported {
            src: src.to_string(),
            dst: dst.to_string(),
        });
    }

    if &d == ctx.object() {
        return Ok(if s.is_value_type() {
            CoercionPlan::one(CoercionStep::Box(s))
        } else {
            CoercionPlan::noop()
        });
    }

    if ctx.is_assignable(&s, &d) {
        debug_assert!(s.is_reference_type() && d.is_reference_type());
        return Ok(CoercionPlan::one(CoercionStep::Cast(d)));
    }

    Err(CoerceError::NoConversion {
        src: src.to_string(),
        dst: dst.to_string(),
    })
}

/// Apply a plan through the emission surface's primitives.
pub fn emit_plan<T: EmitTarget>(
    asm: &mut Assembler<'_, T>,
    plan: &CoercionPlan,
) -> Result<(), EmitError> {
    for step in plan.steps() {
        match step {
            CoercionStep::Box(ty) => {
                asm.emit(ilforge_common::Opcode::Box, ilforge_common::Operand::Type(ty.clone()))?;
            }
            CoercionStep::UnboxAny(ty) => {
                asm.emit(
                    ilforge_common::Opcode::UnboxAny,
                    ilforge_common::Operand::Type(ty.clone()),
                )?;
            }
            CoercionStep::UnboxToAddress(ty) => {
                asm.emit(
                    ilforge_common::Opcode::Unbox,
                    ilforge_common::Operand::Type(ty.clone()),
                )?;
            }
            CoercionStep::Cast(ty) => {
                asm.emit(
                    ilforge_common::Opcode::Castclass,
                    ilforge_common::Operand::Type(ty.clone()),
                )?;
            }
            CoercionStep::LoadIndirect(ty) => {
                asm.load_indirect(ty)?;
            }
        }
    }
    Ok(())
}

/// The fail-fast wrapper: plan, then emit, converting a failed plan into an
/// error at the call site.
pub fn coerce<T: EmitTarget>(
    asm: &mut Assembler<'_, T>,
    src: &TypeDesc,
    dst: &TypeDesc,
    ctx: &EmitContext,
) -> Result<(), CoerceError> {
    let plan = plan(src, dst, ctx)?;
    emit_plan(asm, &plan)?;
    Ok(())
}
