//! Timing Aligner (C5): propagate per-word start/end times across text
//! edits, and validate the result against §4.5's monotonicity and
//! fake-timing rules.

pub mod aligner;
pub mod errors;

pub use aligner::{align, validate, words_with_matched_timing};
pub use errors::{AlignError, AlignResult};
