//! Shared error type used across `tscript_core`.

use thiserror::Error;

/// Validation/invariant errors raised while building or checking a `Version`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("word concatenation does not reconstruct text")]
    TextMismatch,

    #[error("non-monotonic timing at word index {index}: start {start} < previous end {prev_end} - epsilon")]
    NonMonotonicTiming { index: usize, start: String, prev_end: String },

    #[error("end {end} < start {start} at word index {index}")]
    EndBeforeStart { index: usize, start: String, end: String },

    #[error("fake timing value at word index {index}: {value}")]
    FakeTiming { index: usize, value: String },

    #[error("probability {0} out of range [0,1]")]
    ProbabilityOutOfRange(f64),
}

pub type CoreResult<T> = Result<T, CoreError>;
