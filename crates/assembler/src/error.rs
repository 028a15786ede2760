use ilforge_common::InstructionError;
use thiserror::Error;

/// Errors raised by the emission surface. All of these are immediate,
/// caller-mistake failures; nothing here is retried or recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("label belongs to a different emission session")]
    ForeignLabel,

    #[error("local slot belongs to a different emission session")]
    ForeignLocal,

    #[error("no local declared at slot {index}")]
    NoSuchLocal { index: u16 },

    #[error("argument index {index} out of range 0..=32767")]
    ArgumentOutOfRange { index: i32 },

    #[error("switch table must name at least one target")]
    EmptySwitchTable,

    #[error("alignment must be 1, 2, or 4, got {value}")]
    BadAlignment { value: u8 },

    #[error("label L_{index} marked more than once")]
    LabelMarkedTwice { index: u32 },

    #[error("opcode '{op}' is not a branch")]
    NotABranch { op: &'static str },

    #[error("type '{ty}' is not throwable: it does not derive from '{base}'")]
    NotThrowable { ty: String, base: String },

    #[error("type '{ty}' has no parameterless constructor")]
    NoParameterlessCtor { ty: String },

    #[error("field '{field}' is static; use the static access form")]
    ExpectedInstanceField { field: String },

    #[error("field '{field}' is not static; use the instance access form")]
    ExpectedStaticField { field: String },

    #[error("no exception block is open")]
    NoOpenExceptionBlock,

    #[error("no lexical scope is open")]
    NoOpenScope,

    /// Replay found an instruction whose operand does not match any shape
    /// recognized for its operation.
    #[error("invalid instruction: operation '{op}' expects {expected}, found {found}")]
    InvalidInstruction {
        op: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Instruction(#[from] InstructionError),
}

/// Errors raised when finalizing an encoded routine body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("label L_{index} was never marked")]
    UnresolvedLabel { index: u32 },

    #[error("short branch at {at:#06x} cannot encode displacement {displacement}")]
    ShortBranchOutOfRange { at: u32, displacement: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            EmitError::NoSuchLocal { index: 5 }.to_string(),
            "no local declared at slot 5"
        );
        assert_eq!(
            EmitError::ArgumentOutOfRange { index: 32768 }.to_string(),
            "argument index 32768 out of range 0..=32767"
        );
        assert_eq!(
            EncodeError::UnresolvedLabel { index: 2 }.to_string(),
            "label L_2 was never marked"
        );
        assert_eq!(
            EncodeError::ShortBranchOutOfRange {
                at: 16,
                displacement: 300
            }
            .to_string(),
            "short branch at 0x0010 cannot encode displacement 300"
        );
    }

    #[test]
    fn instruction_error_is_transparent() {
        let inner = InstructionError::PositionRegression { last: 4, next: 0 };
        let outer: EmitError = inner.clone().into();
        assert_eq!(outer.to_string(), inner.to_string());
    }
}
