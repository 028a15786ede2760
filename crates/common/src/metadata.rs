//! Metadata tokens and the resolution oracle the disassembler consults.
//!
//! A token is a 4-byte tagged handle: the high byte names the table, the low
//! three bytes index into it. The core never interprets token payloads
//! itself; a [`MetadataOracle`] supplied by the caller turns tokens back into
//! descriptors.

use crate::error::MetadataError;
use crate::typedesc::{FieldRef, MethodRef, TypeDesc};

/// Token table tags and packing helpers.
pub mod token {
    /// Type references.
    pub const TYPE: u8 = 0x01;
    /// Field references.
    pub const FIELD: u8 = 0x04;
    /// Method and constructor references.
    pub const METHOD: u8 = 0x06;
    /// Standalone signatures.
    pub const SIGNATURE: u8 = 0x11;
    /// User strings.
    pub const STRING: u8 = 0x70;

    /// Pack a table tag and row index into a token.
    pub fn make(table: u8, index: u32) -> u32 {
        (u32::from(table) << 24) | (index & 0x00FF_FFFF)
    }

    /// The table tag of a token.
    pub fn table(tok: u32) -> u8 {
        (tok >> 24) as u8
    }

    /// The row index of a token.
    pub fn index(tok: u32) -> u32 {
        tok & 0x00FF_FFFF
    }
}

/// Generic type/method arguments in scope when resolving tokens inside a
/// generic routine body. Empty for non-generic bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericContext {
    pub type_args: Vec<TypeDesc>,
    pub method_args: Vec<TypeDesc>,
}

impl GenericContext {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Resolves metadata tokens back into descriptors.
///
/// Implemented by whatever owns the metadata tables; the disassembler takes
/// one by reference and treats every resolution failure as fatal.
pub trait MetadataOracle {
    fn resolve_type(&self, token: u32, ctx: &GenericContext) -> Result<TypeDesc, MetadataError>;

    fn resolve_field(&self, token: u32, ctx: &GenericContext) -> Result<FieldRef, MetadataError>;

    fn resolve_method(&self, token: u32, ctx: &GenericContext)
        -> Result<MethodRef, MetadataError>;

    fn resolve_string(&self, token: u32) -> Result<String, MetadataError>;

    fn resolve_signature(&self, token: u32) -> Result<Vec<u8>, MetadataError>;
}

/// An oracle that knows nothing. Decoding token-free bodies works; any
/// token operand fails resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetadata;

impl MetadataOracle for NullMetadata {
    fn resolve_type(&self, token: u32, _ctx: &GenericContext) -> Result<TypeDesc, MetadataError> {
        Err(MetadataError::UnknownToken { token })
    }

    fn resolve_field(&self, token: u32, _ctx: &GenericContext) -> Result<FieldRef, MetadataError> {
        Err(MetadataError::UnknownToken { token })
    }

    fn resolve_method(
        &self,
        token: u32,
        _ctx: &GenericContext,
    ) -> Result<MethodRef, MetadataError> {
        Err(MetadataError::UnknownToken { token })
    }

    fn resolve_string(&self, token: u32) -> Result<String, MetadataError> {
        Err(MetadataError::UnknownToken { token })
    }

    fn resolve_signature(&self, token: u32) -> Result<Vec<u8>, MetadataError> {
        Err(MetadataError::UnknownToken { token })
    }
}
