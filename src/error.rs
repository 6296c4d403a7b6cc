// Error taxonomy for the codec core.
//
// All fallible entry points return `Result<T>` rather than a bare bool or
// an stderr-logged panic, per the rearchitecture away from the original
// driver's mixed conventions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FpvError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt container header")]
    CorruptHeader,

    #[error("corrupt frame index")]
    CorruptIndex,

    #[error("corrupt trailer")]
    CorruptTrailer,

    #[error("payload truncated")]
    TruncatedPayload,

    #[error("frame record truncated")]
    TruncatedRecord,

    #[error("entropy coder reached an impossible state")]
    EntropyError,

    #[error("frame index {index} out of bounds (0..{count})")]
    OutOfBounds { index: u64, count: u64 },

    #[error("operation invalid in current state: {0}")]
    StateError(&'static str),
}

pub type Result<T> = std::result::Result<T, FpvError>;
