//! Labels and local slots: symbolic handles owned by one emission session.
//!
//! A handle minted by one assembler (or one disassembler run) is only valid
//! against that same session. Passing it to a different session is a checked
//! error, not undefined behavior, so ownership is carried in the handle.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::typedesc::TypeDesc;

static NEXT_SESSION: AtomicU32 = AtomicU32::new(1);

/// Identifies one emission session (one assembler instance or one
/// disassembler run). Minted from a process-wide counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u32);

impl SessionId {
    /// Mint a fresh session id.
    pub fn mint() -> Self {
        SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

/// A symbolic, not-yet-positioned branch target.
///
/// Becomes resolvable once the owning session records a matching mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    session: SessionId,
    index: u32,
}

impl Label {
    pub(crate) fn new(session: SessionId, index: u32) -> Self {
        Label { session, index }
    }

    /// The session that minted this label.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Ordinal of this label within its session.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// A symbolic, typed storage location scoped to one routine body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSlot {
    session: SessionId,
    index: u16,
    ty: TypeDesc,
    pinned: bool,
}

impl LocalSlot {
    pub(crate) fn new(session: SessionId, index: u16, ty: TypeDesc, pinned: bool) -> Self {
        LocalSlot {
            session,
            index,
            ty,
            pinned,
        }
    }

    /// The session that declared this local.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Slot index within the routine body.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Declared type of the slot.
    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    /// True if the slot pins its referent.
    pub fn pinned(&self) -> bool {
        self.pinned
    }
}

/// Mints labels and local slots on behalf of one session.
///
/// The assembler and the disassembler both hold one of these; it is the only
/// way to construct handles, which keeps ownership honest.
#[derive(Debug)]
pub struct HandleMint {
    session: SessionId,
    next_label: u32,
    next_local: u16,
}

impl HandleMint {
    /// Start a fresh session.
    pub fn new() -> Self {
        HandleMint {
            session: SessionId::mint(),
            next_label: 0,
            next_local: 0,
        }
    }

    /// The session this mint issues handles for.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Mint the next label.
    pub fn label(&mut self) -> Label {
        let label = Label::new(self.session, self.next_label);
        self.next_label += 1;
        label
    }

    /// Mint the next local slot.
    pub fn local(&mut self, ty: TypeDesc, pinned: bool) -> LocalSlot {
        let slot = LocalSlot::new(self.session, self.next_local, ty, pinned);
        self.next_local += 1;
        slot
    }

    /// Number of locals declared so far.
    pub fn local_count(&self) -> u16 {
        self.next_local
    }

    /// Number of labels defined so far.
    pub fn label_count(&self) -> u32 {
        self.next_label
    }
}

impl Default for HandleMint {
    fn default() -> Self {
        Self::new()
    }
}
