//! Error type surfaced when aligned timings fail validation (§4.5, §7).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlignError {
    #[error("fake timing value at word index {index}: {value}")]
    FakeTiming { index: usize, value: String },

    #[error("non-monotonic timing at word index {index}: start {start} < previous end {prev_end} - epsilon")]
    NonMonotonic { index: usize, start: String, prev_end: String },

    #[error("end {end} < start {start} at word index {index}")]
    EndBeforeStart { index: usize, start: String, end: String },
}

pub type AlignResult<T> = Result<T, AlignError>;
