use thiserror::Error;

/// Errors raised while constructing or mutating instruction streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    /// The operand's runtime shape does not match what the operation declares.
    #[error("operation '{op}' expects {expected} operand, found {found}")]
    OperandMismatch {
        op: String,
        expected: String,
        found: &'static str,
    },

    /// Appending would move the stream position backwards.
    #[error("instruction position {next:#06x} precedes previous position {last:#06x}")]
    PositionRegression { last: u32, next: u32 },

    /// A patch addressed an instruction index outside the stream.
    #[error("patch index {index} out of bounds for stream of {len} instructions")]
    PatchOutOfBounds { index: usize, len: usize },
}

/// Errors raised by metadata token resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// No entry exists for the token.
    #[error("unknown metadata token {token:#010x}")]
    UnknownToken { token: u32 },

    /// The token exists but belongs to a different table than the opcode
    /// requires.
    #[error("metadata token {token:#010x} is not a {expected} token")]
    WrongTable { token: u32, expected: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_lowercase_and_specific() {
        let e = InstructionError::OperandMismatch {
            op: "ldstr".to_string(),
            expected: "string".to_string(),
            found: "int32",
        };
        assert_eq!(
            e.to_string(),
            "operation 'ldstr' expects string operand, found int32"
        );

        let e = InstructionError::PositionRegression { last: 16, next: 4 };
        assert_eq!(
            e.to_string(),
            "instruction position 0x0004 precedes previous position 0x0010"
        );

        let e = MetadataError::UnknownToken { token: 0x0600_0001 };
        assert_eq!(e.to_string(), "unknown metadata token 0x06000001");

        let e = MetadataError::WrongTable {
            token: 0x0100_0002,
            expected: "method",
        };
        assert_eq!(
            e.to_string(),
            "metadata token 0x01000002 is not a method token"
        );
    }
}
