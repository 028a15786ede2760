use ilforge_common::{InstructionError, MetadataError};
use thiserror::Error;

/// Errors raised while decoding a routine body. Every failure is fatal;
/// partial or best-effort disassembly is never produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisasmError {
    #[error("routine has no body")]
    MissingBody,

    #[error("unrecognized opcode {byte:#04x} at offset {at:#06x}")]
    UnknownOpcode { at: u32, byte: u8 },

    #[error("unrecognized extended opcode 0xfe {byte:#04x} at offset {at:#06x}")]
    UnknownExtendedOpcode { at: u32, byte: u8 },

    #[error("body ends inside the instruction at offset {at:#06x}")]
    UnexpectedEnd { at: u32 },

    #[error("instruction at offset {at:#06x} names undeclared local {index}")]
    NoSuchLocal { at: u32, index: u16 },

    #[error("instruction at offset {at:#06x} names unknown argument {index}")]
    NoSuchArgument { at: u32, index: u16 },

    /// Signed so that targets computed before the start of the body report
    /// their actual value.
    #[error("branch target {offset:#06x} does not align with an instruction boundary")]
    MisalignedTarget { offset: i64 },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Instruction(#[from] InstructionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(DisasmError::MissingBody.to_string(), "routine has no body");
        assert_eq!(
            DisasmError::UnknownOpcode { at: 4, byte: 0x24 }.to_string(),
            "unrecognized opcode 0x24 at offset 0x0004"
        );
        assert_eq!(
            DisasmError::MisalignedTarget { offset: 3 }.to_string(),
            "branch target 0x0003 does not align with an instruction boundary"
        );
    }
}
