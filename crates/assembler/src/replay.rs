//! Replay: re-driving a captured instruction stream through a fresh surface.
//!
//! Every replayed instruction goes back through this surface's own
//! primitives, never through raw byte re-emission. Labels and locals are
//! re-synthesized per session; foreign handles are never forwarded. Branch
//! targets recorded as byte offsets (disassembler output) get fresh labels
//! marked at the matching positions, so decode, edit, re-emit works as a
//! relocation pipeline.

use std::collections::{HashMap, HashSet};

use ilforge_common::{
    BranchTarget, Instruction, InstructionStream, Label, LocalSlot, MetaOp, Op, Opcode, Operand,
    SessionId, TypeDesc,
};

use crate::assembler::Assembler;
use crate::error::EmitError;
use crate::target::EmitTarget;

type HandleKey = (SessionId, u32);

struct ReplayState {
    labels: HashMap<HandleKey, Label>,
    locals: HashMap<(SessionId, u16), LocalSlot>,
    offset_labels: HashMap<u32, Label>,
    marked_offsets: HashSet<u32>,
}

fn label_key(label: &Label) -> HandleKey {
    (label.session(), label.index())
}

fn invalid(instr: &Instruction, expected: &str) -> EmitError {
    EmitError::InvalidInstruction {
        op: instr.op().name().to_string(),
        expected: expected.to_string(),
        found: instr.operand().shape_name().to_string(),
    }
}

impl<'a, T: EmitTarget> Assembler<'a, T> {
    /// Re-issue every instruction of `stream` through this surface.
    pub fn append_stream(&mut self, stream: &InstructionStream) -> Result<(), EmitError> {
        let mut state = ReplayState {
            labels: HashMap::new(),
            locals: HashMap::new(),
            offset_labels: HashMap::new(),
            marked_offsets: HashSet::new(),
        };
        self.replay_prepass(stream, &mut state)?;

        for instr in stream {
            // An offset-addressed target that lands here gets its fresh
            // label marked before the instruction is re-emitted.
            if matches!(instr.op(), Op::Code(_)) {
                if let Some(label) = state.offset_labels.get(&instr.position()) {
                    if state.marked_offsets.insert(instr.position()) {
                        self.mark_label(*label)?;
                    }
                }
            }
            match instr.op() {
                Op::Meta(meta) => self.replay_meta(*meta, instr, &mut state)?,
                Op::Code(opcode) => self.replay_code(*opcode, instr, &state)?,
            }
        }

        // A branch may target the end of the original body.
        let end = stream.next_position();
        if let Some(label) = state.offset_labels.get(&end) {
            if state.marked_offsets.insert(end) {
                self.mark_label(*label)?;
            }
        }
        Ok(())
    }

    /// Define labels for offset-addressed targets and declare locals that
    /// the captured stream references without declaring. Undeclared locals
    /// keep their original indices: re-declaration runs in index order and
    /// a placeholder slot holds every gap index, so two distinct slots can
    /// never collapse onto one replayed slot.
    fn replay_prepass(
        &mut self,
        stream: &InstructionStream,
        state: &mut ReplayState,
    ) -> Result<(), EmitError> {
        let mut declared: HashSet<(SessionId, u16)> = HashSet::new();
        let mut referenced: Vec<LocalSlot> = Vec::new();
        let mut offsets: Vec<u32> = Vec::new();

        let mut note_target = |target: &BranchTarget, offsets: &mut Vec<u32>| match target {
            BranchTarget::Offset(o) | BranchTarget::Instruction(o) => offsets.push(*o),
            BranchTarget::Label(_) => {}
        };

        for instr in stream {
            match (instr.op(), instr.operand()) {
                (Op::Meta(MetaOp::DeclareLocal), Operand::Local(slot)) => {
                    declared.insert((slot.session(), slot.index()));
                }
                (_, Operand::Local(slot)) => referenced.push(slot.clone()),
                (_, Operand::Target(target)) => note_target(target, &mut offsets),
                (_, Operand::Switch(targets)) => {
                    for target in targets {
                        note_target(target, &mut offsets);
                    }
                }
                _ => {}
            }
        }

        referenced.retain(|slot| !declared.contains(&(slot.session(), slot.index())));
        referenced.sort_by_key(|slot| slot.index());
        referenced.dedup_by_key(|slot| (slot.session(), slot.index()));
        if let Some(highest) = referenced.last().map(|slot| slot.index()) {
            let mut pending = referenced.into_iter().peekable();
            for index in 0..=highest {
                let mut filled = false;
                while let Some(slot) = pending.next_if(|s| s.index() == index) {
                    let fresh = self.declare_local(slot.ty().clone(), slot.pinned())?;
                    state.locals.insert((slot.session(), slot.index()), fresh);
                    filled = true;
                }
                if !filled {
                    // Gap index: a slot the stream reaches only through
                    // dedicated zero-operand forms, if at all.
                    self.declare_local(TypeDesc::object(), false)?;
                }
            }
        }

        offsets.sort_unstable();
        offsets.dedup();
        for offset in offsets {
            let label = self.define_label()?;
            state.offset_labels.insert(offset, label);
        }
        Ok(())
    }

    fn replay_meta(
        &mut self,
        meta: MetaOp,
        instr: &Instruction,
        state: &mut ReplayState,
    ) -> Result<(), EmitError> {
        match (meta, instr.operand()) {
            (MetaOp::DeclareLocal, Operand::Local(old)) => {
                let fresh = self.declare_local(old.ty().clone(), old.pinned())?;
                state.locals.insert((old.session(), old.index()), fresh);
            }
            (MetaOp::DefineLabel, Operand::Target(BranchTarget::Label(old))) => {
                let fresh = self.define_label()?;
                state.labels.insert(label_key(old), fresh);
            }
            (MetaOp::MarkLabel, Operand::Target(BranchTarget::Label(old))) => {
                let fresh = *state
                    .labels
                    .get(&label_key(old))
                    .ok_or_else(|| invalid(instr, "label defined in this stream"))?;
                self.mark_label(fresh)?;
            }
            (MetaOp::BeginExceptionBlock, Operand::Target(BranchTarget::Label(old))) => {
                let fresh = self.begin_exception_block()?;
                state.labels.insert(label_key(old), fresh);
            }
            (MetaOp::BeginCatchBlock, Operand::Type(ty)) => {
                self.begin_catch_block(ty)?;
            }
            (MetaOp::BeginFilterBlock, Operand::None) => {
                self.begin_filter_block()?;
            }
            (MetaOp::BeginFaultBlock, Operand::None) => {
                self.begin_fault_block()?;
            }
            (MetaOp::BeginFinallyBlock, Operand::None) => {
                self.begin_finally_block()?;
            }
            (MetaOp::EndExceptionBlock, Operand::None) => {
                self.end_exception_block()?;
            }
            (MetaOp::BeginScope, Operand::None) => {
                self.begin_scope()?;
            }
            (MetaOp::EndScope, Operand::None) => {
                self.end_scope()?;
            }
            (MetaOp::UsingNamespace, Operand::Str(namespace)) => {
                self.use_namespace(namespace)?;
            }
            (MetaOp::WriteLine, Operand::Str(text)) => {
                self.write_line_str(text)?;
            }
            (MetaOp::WriteLine, Operand::Field(field)) => {
                self.write_line_field(field)?;
            }
            (MetaOp::WriteLine, Operand::Local(old)) => {
                let slot = self.replay_local(instr, old, state)?;
                self.write_line_local(&slot)?;
            }
            (MetaOp::ThrowException, Operand::Type(ty)) => {
                self.throw_new(ty)?;
            }
            _ => return Err(invalid(instr, "the directive's declared operand")),
        }
        Ok(())
    }

    fn replay_code(
        &mut self,
        opcode: Opcode,
        instr: &Instruction,
        state: &ReplayState,
    ) -> Result<(), EmitError> {
        if opcode.is_branch() {
            let long = opcode.long_form().unwrap_or(opcode);
            let target = match instr.operand() {
                Operand::Target(target) => target,
                _ => return Err(invalid(instr, "branch target")),
            };
            let label = self.replay_target(instr, target, state)?;
            self.branch(long, label)?;
            return Ok(());
        }
        if opcode == Opcode::Switch {
            let targets = match instr.operand() {
                Operand::Switch(targets) => targets,
                _ => return Err(invalid(instr, "switch table")),
            };
            let labels = targets
                .iter()
                .map(|t| self.replay_target(instr, t, state))
                .collect::<Result<Vec<_>, _>>()?;
            self.switch_table(&labels)?;
            return Ok(());
        }
        match (opcode, instr.operand()) {
            // Local and argument accesses re-run selection so the most
            // compact form is chosen for the re-synthesized index.
            (Opcode::LdlocS | Opcode::Ldloc, Operand::Local(old)) => {
                let slot = self.replay_local(instr, old, state)?;
                self.load_local(&slot)?;
            }
            (Opcode::LdlocaS | Opcode::Ldloca, Operand::Local(old)) => {
                let slot = self.replay_local(instr, old, state)?;
                self.load_local_address(&slot)?;
            }
            (Opcode::StlocS | Opcode::Stloc, Operand::Local(old)) => {
                let slot = self.replay_local(instr, old, state)?;
                self.store_local(&slot)?;
            }
            (Opcode::LdargS | Opcode::Ldarg, Operand::Arg(arg)) => {
                self.load_argument(i32::from(arg.index))?;
            }
            (Opcode::LdargaS | Opcode::Ldarga, Operand::Arg(arg)) => {
                self.load_argument_address(i32::from(arg.index))?;
            }
            (Opcode::StargS | Opcode::Starg, Operand::Arg(arg)) => {
                self.store_argument(i32::from(arg.index))?;
            }
            _ => {
                // Generic path: the opcode's declared operand kind is
                // re-validated by emit.
                self.emit(opcode, instr.operand().clone())?;
            }
        }
        Ok(())
    }

    fn replay_local(
        &self,
        instr: &Instruction,
        old: &LocalSlot,
        state: &ReplayState,
    ) -> Result<LocalSlot, EmitError> {
        state
            .locals
            .get(&(old.session(), old.index()))
            .cloned()
            .ok_or_else(|| invalid(instr, "local declared in this stream"))
    }

    fn replay_target(
        &self,
        instr: &Instruction,
        target: &BranchTarget,
        state: &ReplayState,
    ) -> Result<Label, EmitError> {
        match target {
            BranchTarget::Label(old) => state
                .labels
                .get(&label_key(old))
                .copied()
                .ok_or_else(|| invalid(instr, "label defined in this stream")),
            BranchTarget::Offset(o) | BranchTarget::Instruction(o) => state
                .offset_labels
                .get(o)
                .copied()
                .ok_or_else(|| invalid(instr, "target inside this stream")),
        }
    }
}
