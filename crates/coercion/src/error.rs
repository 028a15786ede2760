use ilforge_assembler::EmitError;
use thiserror::Error;

/// Why no coercion plan exists, or why applying one failed.
///
/// Planning failures are returned values, never panics; callers probe
/// feasibility through [`plan`](crate::plan) without committing side
/// effects. [`Emit`](CoerceError::Emit) only arises from the fail-fast
/// [`coerce`](crate::coerce) wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceError {
    #[error("unmanaged pointer type '{ty}' is not supported")]
    UnmanagedPointer { ty: String },

    #[error("a value was required but the source type is void")]
    ValueExpected,

    #[error("by-reference coercion from '{src}' to '{dst}' is not supported")]
    ByRefUnsupported { src: String, dst: String },

    #[error("no coercion exists from '{src}' to '{dst}'")]
    NoConversion { src: String, dst: String },

    #[error(transparent)]
    Emit(#[from] EmitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CoerceError::UnmanagedPointer {
                ty: "int32*".to_string()
            }
            .to_string(),
            "unmanaged pointer type 'int32*' is not supported"
        );
        assert_eq!(
            CoerceError::NoConversion {
                src: "string".to_string(),
                dst: "int32".to_string()
            }
            .to_string(),
            "no coercion exists from 'string' to 'int32'"
        );
    }
}
