//! The narrow contract between the emission surface and its backend.

use ilforge_common::{Instruction, Label};

/// An external code-emission target.
///
/// The recorded instruction tags mirror this contract one-to-one, which is
/// what makes replay possible: forwarding and recording are the same call.
pub trait EmitTarget {
    /// Accept one instruction, meta operations included.
    fn accept(&mut self, instr: &Instruction);

    /// Whether a short (one-byte relative) branch from byte `from` can reach
    /// `label`. Targets without address knowledge decline.
    fn label_in_short_range(&self, _label: &Label, _from: u32) -> bool {
        false
    }
}

/// A target that discards everything; the surface's own stream is then the
/// only record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTarget;

impl EmitTarget for NullTarget {
    fn accept(&mut self, _instr: &Instruction) {}
}
