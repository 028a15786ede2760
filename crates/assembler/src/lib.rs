//! ilforge assembler: opcode selection, the fluent emission surface, the
//! byte-encoding backend, and stream replay.
//!
//! - [`select`] — pure compact-form selection (tiered locals/arguments,
//!   integer constants, short/long branches, element dispatch)
//! - [`Assembler`] — the recording emission surface over an [`EmitTarget`]
//! - [`BodyWriter`] / [`TokenTable`] — the in-repo byte-encoding target
//! - replay — `Assembler::append_stream` re-drives a captured stream
//!
//! # Usage
//!
//! ```
//! use ilforge_assembler::{Assembler, BodyWriter};
//! use ilforge_common::{EmitContext, TableOracle};
//!
//! let ctx = EmitContext::new(Box::new(TableOracle::new()));
//! let mut writer = BodyWriter::new();
//! let mut asm = Assembler::new(&mut writer, &ctx);
//! asm.load_i32(2).unwrap();
//! asm.load_i32(3).unwrap();
//! asm.emit(ilforge_common::Opcode::Add, ilforge_common::Operand::None)
//!     .unwrap();
//! asm.ret().unwrap();
//! drop(asm);
//!
//! let body = writer.finish().unwrap();
//! assert_eq!(body.bytes, vec![0x18, 0x19, 0x58, 0x2a]);
//! ```
//!
//! # Dependencies
//!
//! This crate uses `ilforge-common` for the instruction model and
//! `thiserror` for error types.

pub mod assembler;
pub mod encode;
pub mod error;
mod replay;
pub mod select;
pub mod target;

pub use assembler::Assembler;
pub use encode::{BodyWriter, EncodedBody, TokenTable};
pub use error::{EmitError, EncodeError};
pub use target::{EmitTarget, NullTarget};
