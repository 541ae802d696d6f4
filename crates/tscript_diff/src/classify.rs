//! Token-level LCS classification, shared by the Diff Engine's word-level
//! refinement and the Timing Aligner's keep/insert classification (§4.5
//! step 3).

use similar::{capture_diff_slices, Algorithm, DiffOp as SimilarOp};

/// Where a token of the `new` sequence came from, relative to `old`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    /// Matches `old[.0]`: a "keep" token (§4.5 step 3).
    Keep(usize),
    /// Not present in `old`: an "ins" token.
    Insert,
}

/// Classify every token of `new` against `old` via longest-common-subsequence.
/// Tokens of `old` with no counterpart in `new` ("del") simply have no
/// corresponding entry in the result, since the caller only builds output
/// from `new`.
pub fn classify_new_tokens<T: Eq + std::hash::Hash>(old: &[T], new: &[T]) -> Vec<TokenOrigin> {
    let mut origins = vec![TokenOrigin::Insert; new.len()];
    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        if let SimilarOp::Equal { old_index, new_index, len } = op {
            for i in 0..len {
                origins[new_index + i] = TokenOrigin::Keep(old_index + i);
            }
        }
    }
    origins
}
