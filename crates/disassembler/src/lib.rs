//! ilforge disassembler: decodes an already-compiled routine body back into
//! the shared instruction model, with the same structural-equality and
//! rendering guarantees as the forward assembler's output.
//!
//! # Usage
//!
//! ```
//! use ilforge_common::NullMetadata;
//! use ilforge_disassembler::{disassemble, MethodInfo};
//!
//! let info = MethodInfo::body(vec![0x00, 0x2a]);
//! let stream = disassemble(&info, &NullMetadata).unwrap();
//! assert_eq!(stream.render(), "IL_0000: nop\nIL_0001: ret\n");
//! ```
//!
//! # Dependencies
//!
//! This crate uses `ilforge-common` for the instruction model and
//! `thiserror` for error types.

pub mod decode;
pub mod error;

pub use decode::{disassemble, MethodInfo};
pub use error::DisasmError;
