//! The fluent emission surface: the one concrete type client code drives.
//!
//! Every public operation validates its arguments, lets the selector pick a
//! concrete opcode where a choice exists, forwards the instruction to the
//! target, and appends the same instruction to the surface's own stream.
//! Helpers are expressed purely in terms of the primitives, so the stream is
//! always a complete account of what was emitted.

use std::collections::HashMap;

use ilforge_common::{
    ArgRef, BranchTarget, EmitContext, FieldRef, HandleMint, Instruction, InstructionStream,
    Label, LocalSlot, MetaOp, MethodRef, Op, Opcode, Operand, OperandKind, ParamSpec, SessionId,
    TypeDesc,
};

use crate::error::EmitError;
use crate::select;
use crate::select::FieldOp;
use crate::target::EmitTarget;

/// A recording emission surface over one [`EmitTarget`].
///
/// One `Assembler` is one session: the labels and locals it mints are only
/// valid against it, and handles from any other session are rejected.
#[derive(Debug)]
pub struct Assembler<'a, T: EmitTarget> {
    target: &'a mut T,
    ctx: &'a EmitContext,
    mint: HandleMint,
    stream: InstructionStream,
    cursor: u32,
    locals: Vec<LocalSlot>,
    marks: HashMap<u32, u32>,
    open_regions: Vec<Label>,
    open_scopes: u32,
}

impl<'a, T: EmitTarget> Assembler<'a, T> {
    pub fn new(target: &'a mut T, ctx: &'a EmitContext) -> Self {
        Assembler {
            target,
            ctx,
            mint: HandleMint::new(),
            stream: InstructionStream::new(),
            cursor: 0,
            locals: Vec::new(),
            marks: HashMap::new(),
            open_regions: Vec::new(),
            open_scopes: 0,
        }
    }

    pub fn session(&self) -> SessionId {
        self.mint.session()
    }

    /// The recording so far.
    pub fn stream(&self) -> &InstructionStream {
        &self.stream
    }

    /// Current byte position of the emission cursor.
    pub fn position(&self) -> u32 {
        self.cursor
    }

    pub fn context(&self) -> &EmitContext {
        self.ctx
    }

    /// Byte position a label was marked at, if it has been marked.
    pub fn mark_of(&self, label: &Label) -> Option<u32> {
        self.marks.get(&label.index()).copied()
    }

    fn check_label(&self, label: &Label) -> Result<(), EmitError> {
        if label.session() != self.mint.session() {
            return Err(EmitError::ForeignLabel);
        }
        Ok(())
    }

    fn check_local(&self, slot: &LocalSlot) -> Result<(), EmitError> {
        if slot.session() != self.mint.session() {
            return Err(EmitError::ForeignLocal);
        }
        if usize::from(slot.index()) >= self.locals.len() {
            return Err(EmitError::NoSuchLocal {
                index: slot.index(),
            });
        }
        Ok(())
    }

    fn check_operand(&self, operand: &Operand) -> Result<(), EmitError> {
        match operand {
            Operand::Local(slot) => self.check_local(slot),
            Operand::Target(BranchTarget::Label(label)) => self.check_label(label),
            Operand::Switch(targets) => {
                for target in targets {
                    if let BranchTarget::Label(label) = target {
                        self.check_label(label)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn record(&mut self, op: Op, operand: Operand) -> Result<(), EmitError> {
        let instr = Instruction::new(self.cursor, op, operand)?;
        self.target.accept(&instr);
        self.cursor += instr.encoded_size();
        self.stream.append(instr)?;
        Ok(())
    }

    /// The core primitive: validate, forward, record.
    pub fn emit(&mut self, opcode: Opcode, operand: Operand) -> Result<&mut Self, EmitError> {
        self.check_operand(&operand)?;
        self.record(Op::Code(opcode), operand)?;
        Ok(self)
    }

    fn meta(&mut self, meta: MetaOp, operand: Operand) -> Result<&mut Self, EmitError> {
        self.check_operand(&operand)?;
        self.record(Op::Meta(meta), operand)?;
        Ok(self)
    }

    // ---- handles ----

    /// Declare a typed local slot for this routine body.
    pub fn declare_local(&mut self, ty: TypeDesc, pinned: bool) -> Result<LocalSlot, EmitError> {
        let slot = self.mint.local(ty, pinned);
        self.locals.push(slot.clone());
        self.record(Op::Meta(MetaOp::DeclareLocal), Operand::Local(slot.clone()))?;
        Ok(slot)
    }

    /// Bring a fresh label into existence.
    pub fn define_label(&mut self) -> Result<Label, EmitError> {
        let label = self.mint.label();
        self.record(
            Op::Meta(MetaOp::DefineLabel),
            Operand::Target(BranchTarget::Label(label)),
        )?;
        Ok(label)
    }

    /// Pin a label to the current position. Each label is marked once.
    pub fn mark_label(&mut self, label: Label) -> Result<&mut Self, EmitError> {
        self.check_label(&label)?;
        if self.marks.contains_key(&label.index()) {
            return Err(EmitError::LabelMarkedTwice {
                index: label.index(),
            });
        }
        self.marks.insert(label.index(), self.cursor);
        self.meta(
            MetaOp::MarkLabel,
            Operand::Target(BranchTarget::Label(label)),
        )
    }

    // ---- locals and arguments ----

    pub fn load_local(&mut self, slot: &LocalSlot) -> Result<&mut Self, EmitError> {
        self.check_local(slot)?;
        let opcode = select::load_local(slot.index());
        self.emit(opcode, Self::local_operand(opcode, slot))
    }

    pub fn store_local(&mut self, slot: &LocalSlot) -> Result<&mut Self, EmitError> {
        self.check_local(slot)?;
        let opcode = select::store_local(slot.index());
        self.emit(opcode, Self::local_operand(opcode, slot))
    }

    pub fn load_local_address(&mut self, slot: &LocalSlot) -> Result<&mut Self, EmitError> {
        self.check_local(slot)?;
        let opcode = select::load_local_address(slot.index());
        self.emit(opcode, Operand::Local(slot.clone()))
    }

    /// Load the local declared at `index`. Fails before emitting anything if
    /// no such slot was declared.
    pub fn load_local_at(&mut self, index: u16) -> Result<&mut Self, EmitError> {
        let slot = self
            .locals
            .get(usize::from(index))
            .cloned()
            .ok_or(EmitError::NoSuchLocal { index })?;
        self.load_local(&slot)
    }

    fn local_operand(opcode: Opcode, slot: &LocalSlot) -> Operand {
        // Dedicated forms bake the index into the opcode.
        if opcode.operand_kind() == OperandKind::None {
            Operand::None
        } else {
            Operand::Local(slot.clone())
        }
    }

    pub fn load_argument(&mut self, index: i32) -> Result<&mut Self, EmitError> {
        let opcode = select::load_argument(index)?;
        self.emit(opcode, Self::arg_operand(opcode, index))
    }

    pub fn load_argument_address(&mut self, index: i32) -> Result<&mut Self, EmitError> {
        let opcode = select::load_argument_address(index)?;
        self.emit(opcode, Self::arg_operand(opcode, index))
    }

    pub fn store_argument(&mut self, index: i32) -> Result<&mut Self, EmitError> {
        let opcode = select::store_argument(index)?;
        self.emit(opcode, Self::arg_operand(opcode, index))
    }

    fn arg_operand(opcode: Opcode, index: i32) -> Operand {
        if opcode.operand_kind() == OperandKind::None {
            Operand::None
        } else {
            Operand::Arg(ArgRef::index(index as u16))
        }
    }

    // ---- constants ----

    pub fn load_i32(&mut self, value: i32) -> Result<&mut Self, EmitError> {
        let opcode = select::load_i32(value);
        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::Int8 => Operand::Int8(value as i8),
            _ => Operand::Int32(value),
        };
        self.emit(opcode, operand)
    }

    pub fn load_i64(&mut self, value: i64) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::LdcI8, Operand::Int64(value))
    }

    pub fn load_f32(&mut self, value: f32) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::LdcR4, Operand::Float32(value))
    }

    pub fn load_f64(&mut self, value: f64) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::LdcR8, Operand::Float64(value))
    }

    pub fn load_str(&mut self, value: &str) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Ldstr, Operand::Str(value.to_string()))
    }

    pub fn load_null(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Ldnull, Operand::None)
    }

    // ---- branches ----

    fn short_eligible(&self, label: &Label) -> bool {
        // Short eligibility is an actual distance computation: the label is
        // already marked and the one-byte displacement from the end of a
        // short branch (2 bytes from the cursor) fits i8.
        match self.marks.get(&label.index()) {
            Some(&mark) => {
                let displacement = i64::from(mark) - (i64::from(self.cursor) + 2);
                i8::try_from(displacement).is_ok()
            }
            None => false,
        }
    }

    /// Emit a branch to `label`, choosing the short form when the label is
    /// within short range. `opcode` may be either form of the branch.
    pub fn branch(&mut self, opcode: Opcode, label: Label) -> Result<&mut Self, EmitError> {
        let long = opcode.long_form().unwrap_or(opcode);
        if !long.is_branch() {
            return Err(EmitError::NotABranch {
                op: opcode.mnemonic(),
            });
        }
        self.check_label(&label)?;
        let short_eligible =
            self.short_eligible(&label) || self.target.label_in_short_range(&label, self.cursor);
        let chosen = select::branch_form(long, short_eligible);
        self.emit(chosen, Operand::Target(BranchTarget::Label(label)))
    }

    pub fn br(&mut self, label: Label) -> Result<&mut Self, EmitError> {
        self.branch(Opcode::Br, label)
    }

    pub fn leave(&mut self, label: Label) -> Result<&mut Self, EmitError> {
        self.branch(Opcode::Leave, label)
    }

    /// Emit a multi-way branch. The table must name at least one target.
    pub fn switch_table(&mut self, labels: &[Label]) -> Result<&mut Self, EmitError> {
        if labels.is_empty() {
            return Err(EmitError::EmptySwitchTable);
        }
        let targets: Vec<BranchTarget> = labels.iter().map(|l| BranchTarget::Label(*l)).collect();
        self.emit(Opcode::Switch, Operand::Switch(targets))
    }

    // ---- elements and indirection ----

    pub fn load_element(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        let opcode = select::element_load(ty);
        self.emit(opcode, Self::typed_operand(opcode, ty))
    }

    pub fn store_element(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        let opcode = select::element_store(ty);
        self.emit(opcode, Self::typed_operand(opcode, ty))
    }

    pub fn load_element_address(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Ldelema, Operand::Type(ty.clone()))
    }

    /// Load a value of `ty` through the address on the stack.
    pub fn load_indirect(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        let opcode = select::indirect_load(ty);
        self.emit(opcode, Self::typed_operand(opcode, ty))
    }

    fn typed_operand(opcode: Opcode, ty: &TypeDesc) -> Operand {
        if opcode.operand_kind() == OperandKind::Type {
            Operand::Type(ty.clone())
        } else {
            Operand::None
        }
    }

    pub fn new_array(&mut self, element: &TypeDesc) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Newarr, Operand::Type(element.clone()))
    }

    pub fn load_length(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Ldlen, Operand::None)
    }

    // ---- fields ----

    /// Load a field's value, dispatching on the field's own static flag.
    pub fn load_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        let opcode = select::field_opcode(field.is_static, FieldOp::Load);
        self.emit(opcode, Operand::Field(field.clone()))
    }

    pub fn load_field_address(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        let opcode = select::field_opcode(field.is_static, FieldOp::LoadAddress);
        self.emit(opcode, Operand::Field(field.clone()))
    }

    pub fn store_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        let opcode = select::field_opcode(field.is_static, FieldOp::Store);
        self.emit(opcode, Operand::Field(field.clone()))
    }

    /// Load explicitly through the static form; a non-static field is an
    /// argument error, not a silent coercion.
    pub fn load_static_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        if !field.is_static {
            return Err(EmitError::ExpectedStaticField {
                field: field.to_string(),
            });
        }
        self.load_field(field)
    }

    /// Load explicitly through the instance form; a static field is rejected.
    pub fn load_instance_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        if field.is_static {
            return Err(EmitError::ExpectedInstanceField {
                field: field.to_string(),
            });
        }
        self.load_field(field)
    }

    pub fn store_static_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        if !field.is_static {
            return Err(EmitError::ExpectedStaticField {
                field: field.to_string(),
            });
        }
        self.store_field(field)
    }

    pub fn store_instance_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        if field.is_static {
            return Err(EmitError::ExpectedInstanceField {
                field: field.to_string(),
            });
        }
        self.store_field(field)
    }

    // ---- calls ----

    pub fn call(&mut self, method: &MethodRef) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Call, Operand::Method(method.clone()))
    }

    pub fn call_virtual(&mut self, method: &MethodRef) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Callvirt, Operand::Method(method.clone()))
    }

    pub fn call_indirect(&mut self, signature: &[u8]) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Calli, Operand::Signature(signature.to_vec()))
    }

    pub fn new_object(&mut self, ctor: &MethodRef) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Newobj, Operand::Method(ctor.clone()))
    }

    // ---- plain opcodes ----

    pub fn ret(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Ret, Operand::None)
    }

    pub fn dup(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Dup, Operand::None)
    }

    pub fn pop(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Pop, Operand::None)
    }

    pub fn nop(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Nop, Operand::None)
    }

    /// Unaligned-access prefix. Alignment is restricted to 1, 2, or 4.
    pub fn unaligned(&mut self, alignment: u8) -> Result<&mut Self, EmitError> {
        if !matches!(alignment, 1 | 2 | 4) {
            return Err(EmitError::BadAlignment { value: alignment });
        }
        self.emit(Opcode::Unaligned, Operand::Int8(alignment as i8))
    }

    // ---- boxing, casts, pops ----

    /// Box a value. A reference type needs no envelope; no-op.
    pub fn box_value(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        if ty.is_reference_type() {
            return Ok(self);
        }
        self.emit(Opcode::Box, Operand::Type(ty.clone()))
    }

    /// Unbox to a value; degrades to a downcast for reference types.
    pub fn unbox_any(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        if ty.is_value_type() {
            self.emit(Opcode::UnboxAny, Operand::Type(ty.clone()))
        } else {
            self.emit(Opcode::Castclass, Operand::Type(ty.clone()))
        }
    }

    /// Downcast; degrades to unbox-to-value for value types, so callers never
    /// branch on value/reference-ness themselves.
    pub fn cast_class(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        if ty.is_value_type() {
            self.emit(Opcode::UnboxAny, Operand::Type(ty.clone()))
        } else {
            self.emit(Opcode::Castclass, Operand::Type(ty.clone()))
        }
    }

    /// Pop the top of stack unless the produced type is absent or void.
    pub fn pop_if_not_void(&mut self, ty: Option<&TypeDesc>) -> Result<&mut Self, EmitError> {
        match ty {
            None => Ok(self),
            Some(ty) if ty.is_void() => Ok(self),
            Some(_) => self.pop(),
        }
    }

    // ---- exceptions ----

    /// Open a protected region; returns its pre-defined end label. The label
    /// is not marked automatically; mark it where control converges.
    pub fn begin_exception_block(&mut self) -> Result<Label, EmitError> {
        let end = self.mint.label();
        self.record(
            Op::Meta(MetaOp::BeginExceptionBlock),
            Operand::Target(BranchTarget::Label(end)),
        )?;
        self.open_regions.push(end);
        Ok(end)
    }

    pub fn begin_catch_block(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        if self.open_regions.is_empty() {
            return Err(EmitError::NoOpenExceptionBlock);
        }
        self.meta(MetaOp::BeginCatchBlock, Operand::Type(ty.clone()))
    }

    pub fn begin_filter_block(&mut self) -> Result<&mut Self, EmitError> {
        if self.open_regions.is_empty() {
            return Err(EmitError::NoOpenExceptionBlock);
        }
        self.meta(MetaOp::BeginFilterBlock, Operand::None)
    }

    pub fn begin_fault_block(&mut self) -> Result<&mut Self, EmitError> {
        if self.open_regions.is_empty() {
            return Err(EmitError::NoOpenExceptionBlock);
        }
        self.meta(MetaOp::BeginFaultBlock, Operand::None)
    }

    pub fn begin_finally_block(&mut self) -> Result<&mut Self, EmitError> {
        if self.open_regions.is_empty() {
            return Err(EmitError::NoOpenExceptionBlock);
        }
        self.meta(MetaOp::BeginFinallyBlock, Operand::None)
    }

    pub fn end_exception_block(&mut self) -> Result<&mut Self, EmitError> {
        if self.open_regions.pop().is_none() {
            return Err(EmitError::NoOpenExceptionBlock);
        }
        self.meta(MetaOp::EndExceptionBlock, Operand::None)
    }

    pub fn throw(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Throw, Operand::None)
    }

    pub fn rethrow(&mut self) -> Result<&mut Self, EmitError> {
        self.emit(Opcode::Rethrow, Operand::None)
    }

    /// Construct and throw an exception of `ty`. The type must derive from
    /// the base exception type and expose a parameterless constructor; both
    /// checks fail here, at assembly time, rather than at execution time.
    pub fn throw_new(&mut self, ty: &TypeDesc) -> Result<&mut Self, EmitError> {
        if !self.ctx.is_assignable(ty, self.ctx.exception()) {
            return Err(EmitError::NotThrowable {
                ty: ty.to_string(),
                base: self.ctx.exception().to_string(),
            });
        }
        if self.ctx.parameterless_ctor(ty).is_none() {
            return Err(EmitError::NoParameterlessCtor { ty: ty.to_string() });
        }
        self.meta(MetaOp::ThrowException, Operand::Type(ty.clone()))
    }

    // ---- scopes, namespaces, debug output ----

    pub fn begin_scope(&mut self) -> Result<&mut Self, EmitError> {
        self.open_scopes += 1;
        self.meta(MetaOp::BeginScope, Operand::None)
    }

    pub fn end_scope(&mut self) -> Result<&mut Self, EmitError> {
        if self.open_scopes == 0 {
            return Err(EmitError::NoOpenScope);
        }
        self.open_scopes -= 1;
        self.meta(MetaOp::EndScope, Operand::None)
    }

    pub fn use_namespace(&mut self, namespace: &str) -> Result<&mut Self, EmitError> {
        self.meta(MetaOp::UsingNamespace, Operand::Str(namespace.to_string()))
    }

    pub fn write_line_str(&mut self, text: &str) -> Result<&mut Self, EmitError> {
        self.meta(MetaOp::WriteLine, Operand::Str(text.to_string()))
    }

    pub fn write_line_field(&mut self, field: &FieldRef) -> Result<&mut Self, EmitError> {
        self.meta(MetaOp::WriteLine, Operand::Field(field.clone()))
    }

    pub fn write_line_local(&mut self, slot: &LocalSlot) -> Result<&mut Self, EmitError> {
        self.check_local(slot)?;
        self.meta(MetaOp::WriteLine, Operand::Local(slot.clone()))
    }

    // ---- params-array loading ----

    /// Load a params array's elements onto the stack, one per expected
    /// parameter. Emits a runtime length check first: the actual array
    /// length must equal the expected parameter count or an exception is
    /// constructed and thrown. By-reference parameters get their element
    /// address loaded instead of the element value.
    pub fn load_params(
        &mut self,
        array_argument: i32,
        params: &[ParamSpec],
    ) -> Result<&mut Self, EmitError> {
        select::load_argument(array_argument)?;
        let ok = self.define_label()?;
        self.load_argument(array_argument)?;
        self.load_length()?;
        self.emit(Opcode::ConvI4, Operand::None)?;
        self.load_i32(params.len() as i32)?;
        self.branch(Opcode::Beq, ok)?;
        self.load_str("parameter count mismatch")?;
        let ctor = MethodRef {
            declaring: self.ctx.exception().name().to_string(),
            name: ".ctor".to_string(),
            params: vec![TypeDesc::string()],
            varargs: Vec::new(),
            return_ty: TypeDesc::void(),
            is_static: false,
        };
        self.new_object(&ctor)?;
        self.throw()?;
        self.mark_label(ok)?;
        for (index, param) in params.iter().enumerate() {
            self.load_argument(array_argument)?;
            self.load_i32(index as i32)?;
            if param.by_ref {
                self.load_element_address(&param.ty)?;
            } else {
                self.load_element(&param.ty)?;
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::NullTarget;
    use ilforge_common::{TableOracle, TypeKind};

    fn ctx() -> EmitContext {
        EmitContext::new(Box::new(TableOracle::new()))
    }

    fn ops(stream: &InstructionStream) -> Vec<Op> {
        stream.iter().map(|i| *i.op()).collect()
    }

    fn code_ops(stream: &InstructionStream) -> Vec<Opcode> {
        stream
            .iter()
            .filter_map(|i| match i.op() {
                Op::Code(op) => Some(*op),
                Op::Meta(_) => None,
            })
            .collect()
    }

    #[test]
    fn undeclared_local_fails_before_emitting() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        assert_eq!(
            asm.load_local_at(5).unwrap_err(),
            EmitError::NoSuchLocal { index: 5 }
        );
        assert!(asm.stream().is_empty());
    }

    #[test]
    fn sixth_local_selects_short_form() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        for _ in 0..6 {
            asm.declare_local(TypeDesc::int32(), false).unwrap();
        }
        let before = asm.stream().len();
        asm.load_local_at(5).unwrap();
        assert_eq!(asm.stream().len(), before + 1);
        assert_eq!(code_ops(asm.stream()), vec![Opcode::LdlocS]);
    }

    #[test]
    fn dedicated_local_forms_carry_no_operand() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let slot = asm.declare_local(TypeDesc::int32(), false).unwrap();
        asm.load_local(&slot).unwrap().store_local(&slot).unwrap();
        let coded: Vec<&Instruction> = asm
            .stream()
            .iter()
            .filter(|i| matches!(i.op(), Op::Code(_)))
            .collect();
        assert_eq!(coded.len(), 2);
        assert_eq!(coded[0].operand(), &Operand::None);
        assert_eq!(coded[1].operand(), &Operand::None);
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let ctx = ctx();
        let mut target_a = NullTarget;
        let mut target_b = NullTarget;
        let mut a = Assembler::new(&mut target_a, &ctx);
        let mut b = Assembler::new(&mut target_b, &ctx);
        let label = a.define_label().unwrap();
        let slot = a.declare_local(TypeDesc::int32(), false).unwrap();
        assert_eq!(b.br(label).unwrap_err(), EmitError::ForeignLabel);
        assert_eq!(b.load_local(&slot).unwrap_err(), EmitError::ForeignLocal);
        assert_eq!(
            b.mark_label(label).unwrap_err(),
            EmitError::ForeignLabel
        );
        assert!(b.stream().is_empty());
    }

    #[test]
    fn backward_branch_in_range_selects_short_form() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let top = asm.define_label().unwrap();
        asm.mark_label(top).unwrap();
        asm.nop().unwrap();
        asm.branch(Opcode::Br, top).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Nop, Opcode::BrS]);
    }

    #[test]
    fn distant_backward_branch_selects_long_form() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let top = asm.define_label().unwrap();
        asm.mark_label(top).unwrap();
        for _ in 0..200 {
            asm.nop().unwrap();
        }
        asm.branch(Opcode::Br, top).unwrap();
        assert_eq!(code_ops(asm.stream()).last(), Some(&Opcode::Br));
    }

    #[test]
    fn forward_branch_defaults_to_long_form() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let out = asm.define_label().unwrap();
        asm.branch(Opcode::Beq, out).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Beq]);
    }

    #[test]
    fn branch_rejects_non_branch_opcode() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let label = asm.define_label().unwrap();
        assert_eq!(
            asm.branch(Opcode::Nop, label).unwrap_err(),
            EmitError::NotABranch { op: "nop" }
        );
    }

    #[test]
    fn box_unbox_symmetry() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let t = TypeDesc::int32();
        asm.box_value(&t).unwrap().unbox_any(&t).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Box, Opcode::UnboxAny]);
    }

    #[test]
    fn box_on_reference_type_is_noop() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        asm.box_value(&TypeDesc::string()).unwrap();
        assert!(asm.stream().is_empty());
    }

    #[test]
    fn cast_class_on_value_type_matches_unbox_any() {
        let ctx = ctx();
        let t = TypeDesc::int64();
        let mut target_a = NullTarget;
        let mut a = Assembler::new(&mut target_a, &ctx);
        a.cast_class(&t).unwrap();
        let mut target_b = NullTarget;
        let mut b = Assembler::new(&mut target_b, &ctx);
        b.unbox_any(&t).unwrap();
        assert_eq!(a.stream(), b.stream());
        assert_eq!(code_ops(a.stream()), vec![Opcode::UnboxAny]);
    }

    #[test]
    fn unbox_any_on_reference_type_degrades_to_cast() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        asm.unbox_any(&TypeDesc::string()).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Castclass]);
    }

    #[test]
    fn pop_if_not_void() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        asm.pop_if_not_void(None).unwrap();
        asm.pop_if_not_void(Some(&TypeDesc::void())).unwrap();
        assert!(asm.stream().is_empty());
        asm.pop_if_not_void(Some(&TypeDesc::int32())).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Pop]);
    }

    #[test]
    fn switch_table_must_be_non_empty() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        assert_eq!(
            asm.switch_table(&[]).unwrap_err(),
            EmitError::EmptySwitchTable
        );
        let a = asm.define_label().unwrap();
        let b = asm.define_label().unwrap();
        asm.switch_table(&[a, b]).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Switch]);
    }

    #[test]
    fn alignment_values_are_restricted() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        for value in [0u8, 3, 8] {
            assert_eq!(
                asm.unaligned(value).unwrap_err(),
                EmitError::BadAlignment { value }
            );
        }
        asm.unaligned(2).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Unaligned]);
    }

    #[test]
    fn field_form_mismatch_is_an_error() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let static_field = FieldRef {
            declaring: "Counters".to_string(),
            name: "total".to_string(),
            ty: TypeDesc::int32(),
            is_static: true,
        };
        let instance_field = FieldRef {
            is_static: false,
            ..static_field.clone()
        };
        assert!(matches!(
            asm.load_instance_field(&static_field).unwrap_err(),
            EmitError::ExpectedInstanceField { .. }
        ));
        assert!(matches!(
            asm.store_static_field(&instance_field).unwrap_err(),
            EmitError::ExpectedStaticField { .. }
        ));
        asm.load_field(&static_field).unwrap();
        asm.load_field(&instance_field).unwrap();
        assert_eq!(code_ops(asm.stream()), vec![Opcode::Ldsfld, Opcode::Ldfld]);
    }

    #[test]
    fn throw_new_validates_throwability_and_ctor() {
        let widget = TypeDesc::named("Widget", TypeKind::Reference);
        let my_error = TypeDesc::named("MyError", TypeKind::Reference);
        let mut oracle = TableOracle::new();
        oracle.add_assignable(&my_error, &TypeDesc::exception());
        let ctx = EmitContext::new(Box::new(oracle));

        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        assert!(matches!(
            asm.throw_new(&widget).unwrap_err(),
            EmitError::NotThrowable { .. }
        ));
        assert!(matches!(
            asm.throw_new(&my_error).unwrap_err(),
            EmitError::NoParameterlessCtor { .. }
        ));

        let mut oracle = TableOracle::new();
        oracle.add_assignable(&my_error, &TypeDesc::exception());
        oracle.add_parameterless_ctor(&my_error);
        let ctx = EmitContext::new(Box::new(oracle));
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        asm.throw_new(&my_error).unwrap();
        assert_eq!(
            ops(asm.stream()),
            vec![Op::Meta(MetaOp::ThrowException)]
        );
    }

    #[test]
    fn catch_without_open_region_fails() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        assert_eq!(
            asm.begin_catch_block(&TypeDesc::exception()).unwrap_err(),
            EmitError::NoOpenExceptionBlock
        );
        assert_eq!(
            asm.end_exception_block().unwrap_err(),
            EmitError::NoOpenExceptionBlock
        );
    }

    #[test]
    fn exception_region_records_directives() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let end = asm.begin_exception_block().unwrap();
        asm.nop().unwrap();
        asm.leave(end).unwrap();
        asm.begin_catch_block(&TypeDesc::exception()).unwrap();
        asm.pop().unwrap();
        asm.end_exception_block().unwrap();
        asm.mark_label(end).unwrap();
        asm.ret().unwrap();
        assert_eq!(
            ops(asm.stream()),
            vec![
                Op::Meta(MetaOp::BeginExceptionBlock),
                Op::Code(Opcode::Nop),
                Op::Code(Opcode::Leave),
                Op::Meta(MetaOp::BeginCatchBlock),
                Op::Code(Opcode::Pop),
                Op::Meta(MetaOp::EndExceptionBlock),
                Op::Meta(MetaOp::MarkLabel),
                Op::Code(Opcode::Ret),
            ]
        );
    }

    #[test]
    fn scope_balance_is_checked() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        assert_eq!(asm.end_scope().unwrap_err(), EmitError::NoOpenScope);
        asm.begin_scope().unwrap().end_scope().unwrap();
    }

    #[test]
    fn marking_a_label_twice_fails() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let label = asm.define_label().unwrap();
        asm.mark_label(label).unwrap();
        assert_eq!(
            asm.mark_label(label).unwrap_err(),
            EmitError::LabelMarkedTwice { index: label.index() }
        );
    }

    #[test]
    fn load_params_expansion() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        let params = [
            ParamSpec {
                ty: TypeDesc::int32(),
                by_ref: false,
            },
            ParamSpec {
                ty: TypeDesc::string(),
                by_ref: true,
            },
        ];
        asm.load_params(1, &params).unwrap();
        let coded = code_ops(asm.stream());
        assert_eq!(
            coded,
            vec![
                Opcode::Ldarg1,
                Opcode::Ldlen,
                Opcode::ConvI4,
                Opcode::LdcI4_2,
                Opcode::Beq,
                Opcode::Ldstr,
                Opcode::Newobj,
                Opcode::Throw,
                Opcode::Ldarg1,
                Opcode::LdcI4_0,
                Opcode::LdelemI4,
                Opcode::Ldarg1,
                Opcode::LdcI4_1,
                Opcode::Ldelema,
            ]
        );
        // The mismatch path throws through the context's exception type.
        let newobj = asm
            .stream()
            .iter()
            .find(|i| i.op() == &Op::Code(Opcode::Newobj))
            .unwrap();
        match newobj.operand() {
            Operand::Method(ctor) => {
                assert_eq!(ctor.declaring, ctx.exception().name());
                assert_eq!(ctor.params, vec![TypeDesc::string()]);
            }
            other => panic!("unexpected operand {other:?}"),
        }
    }

    #[test]
    fn load_params_validates_array_argument_first() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        assert_eq!(
            asm.load_params(-2, &[]).unwrap_err(),
            EmitError::ArgumentOutOfRange { index: -2 }
        );
        assert!(asm.stream().is_empty());
    }

    #[test]
    fn positions_track_encoded_sizes() {
        let ctx = ctx();
        let mut target = NullTarget;
        let mut asm = Assembler::new(&mut target, &ctx);
        asm.load_i32(1000).unwrap(); // 5 bytes
        asm.load_i64(7).unwrap(); // 9 bytes
        asm.rethrow().unwrap(); // 2 bytes (extended)
        asm.ret().unwrap();
        let positions: Vec<u32> = asm.stream().iter().map(|i| i.position()).collect();
        assert_eq!(positions, vec![0, 5, 14, 16]);
        assert_eq!(asm.position(), 17);
    }
}
