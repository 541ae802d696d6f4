//! Diff Engine (C3): a deterministic, round-trip-invertible granular diff.
//!
//! Cascade, per §4.3: line anchoring → middle refinement (word-level on
//! replaced runs) → word-level tokenisation → character fallback. Every
//! stage is validated by round-tripping against the canonical inputs;
//! failure at any stage drops to the next coarser one.

use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use similar::{capture_diff_slices, Algorithm, DiffOp as SimilarOp};

use tscript_core::{canonicalize, reconstruct_new, reconstruct_old, DiffOp, EngineConfig, OpCode};

use crate::errors::{DiffError, DiffResult};

fn word_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+|[\p{L}\p{N}\p{M}]+|.").expect("static regex is valid"))
}

/// Tokenise by the regex alternation `whitespace-run | letter/digit/mark-run
/// | single-other-char` (§4.3 step 3).
fn tokenize_words(s: &str) -> Vec<&str> {
    word_token_re().find_iter(s).map(|m| m.as_str()).collect()
}

/// Split on `\n`, keeping the newline as part of the preceding line (§4.3
/// step 1).
fn tokenize_lines(s: &str) -> Vec<&str> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split_inclusive('\n').collect()
}

fn tokenize_chars(s: &str) -> Vec<&str> {
    s.char_indices().map(|(i, c)| &s[i..i + c.len_utf8()]).collect()
}

/// Merge adjacent ops of the same code and drop empty payloads (§4.3 output
/// normalisation).
fn coalesce(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut out: Vec<DiffOp> = Vec::with_capacity(ops.len());
    for op in ops {
        if op.payload.is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut() {
            if last.op == op.op {
                last.payload.push_str(&op.payload);
                continue;
            }
        }
        out.push(op);
    }
    out
}

/// Check that `ops` reconstructs exactly `a`/`b`, the validation gate each
/// cascade stage must pass before its result is accepted (§4.3).
fn round_trips(ops: &[DiffOp], a: &str, b: &str) -> DiffResult<()> {
    if reconstruct_old(ops) == a && reconstruct_new(ops) == b {
        Ok(())
    } else {
        Err(DiffError::ValidationFailed)
    }
}

/// Diff two token slices at one granularity, turning `similar`'s index-based
/// ops into payload-bearing `DiffOp`s.
fn diff_tokens(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let raw = capture_diff_slices(Algorithm::Myers, old, new);
    let mut ops = Vec::new();
    for op in raw {
        match op {
            SimilarOp::Equal { old_index, len, .. } => {
                ops.push(DiffOp::equal(old[old_index..old_index + len].concat()));
            }
            SimilarOp::Delete { old_index, old_len, .. } => {
                ops.push(DiffOp::delete(old[old_index..old_index + old_len].concat()));
            }
            SimilarOp::Insert { new_index, new_len, .. } => {
                ops.push(DiffOp::insert(new[new_index..new_index + new_len].concat()));
            }
            SimilarOp::Replace { old_index, old_len, new_index, new_len } => {
                ops.push(DiffOp::delete(old[old_index..old_index + old_len].concat()));
                ops.push(DiffOp::insert(new[new_index..new_index + new_len].concat()));
            }
        }
    }
    ops
}

/// Word-level refinement of a single replaced chunk (§4.3 step 3); falls
/// back to character Myers if word tokens fail to round-trip.
fn refine_replacement(old_chunk: &str, new_chunk: &str) -> Vec<DiffOp> {
    let old_words = tokenize_words(old_chunk);
    let new_words = tokenize_words(new_chunk);
    let ops = diff_tokens(&old_words, &new_words);
    if round_trips(&ops, old_chunk, new_chunk).is_ok() {
        return ops;
    }
    let old_chars = tokenize_chars(old_chunk);
    let new_chars = tokenize_chars(new_chunk);
    diff_tokens(&old_chars, &new_chars)
}

/// Line-level cascade with word-level refinement of replaced runs (§4.3
/// steps 1-3).
fn line_and_word_cascade(a: &str, b: &str, start: Instant, cfg: &EngineConfig) -> Vec<DiffOp> {
    let lines_a = tokenize_lines(a);
    let lines_b = tokenize_lines(b);
    let raw = capture_diff_slices(Algorithm::Myers, &lines_a, &lines_b);

    let mut ops = Vec::new();
    for op in raw {
        if start.elapsed() > cfg.diff_time_budget {
            // Soft time budget exhausted (§5): stop refining, emit the rest
            // of this chunk as raw delete/insert and let the caller fall
            // back to character Myers over the whole text if validation
            // ultimately fails.
            match op {
                SimilarOp::Equal { old_index, len, .. } => {
                    ops.push(DiffOp::equal(lines_a[old_index..old_index + len].concat()));
                }
                SimilarOp::Delete { old_index, old_len, .. } => {
                    ops.push(DiffOp::delete(lines_a[old_index..old_index + old_len].concat()));
                }
                SimilarOp::Insert { new_index, new_len, .. } => {
                    ops.push(DiffOp::insert(lines_b[new_index..new_index + new_len].concat()));
                }
                SimilarOp::Replace { old_index, old_len, new_index, new_len } => {
                    ops.push(DiffOp::delete(lines_a[old_index..old_index + old_len].concat()));
                    ops.push(DiffOp::insert(lines_b[new_index..new_index + new_len].concat()));
                }
            }
            continue;
        }
        match op {
            SimilarOp::Equal { old_index, len, .. } => {
                ops.push(DiffOp::equal(lines_a[old_index..old_index + len].concat()));
            }
            SimilarOp::Delete { old_index, old_len, .. } => {
                ops.push(DiffOp::delete(lines_a[old_index..old_index + old_len].concat()));
            }
            SimilarOp::Insert { new_index, new_len, .. } => {
                ops.push(DiffOp::insert(lines_b[new_index..new_index + new_len].concat()));
            }
            SimilarOp::Replace { old_index, old_len, new_index, new_len } => {
                let old_chunk = lines_a[old_index..old_index + old_len].concat();
                let new_chunk = lines_b[new_index..new_index + new_len].concat();
                ops.extend(refine_replacement(&old_chunk, &new_chunk));
            }
        }
    }
    ops
}

/// Last-resort encoding (§4.3 step 4c): a single delete of `a` and insert of
/// `b`. Always round-trips.
fn last_resort(a: &str, b: &str) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    if !a.is_empty() {
        ops.push(DiffOp::delete(a));
    }
    if !b.is_empty() {
        ops.push(DiffOp::insert(b));
    }
    ops
}

/// Produce a minimal, invertible edit script between `a` and `b`.
///
/// Both inputs are canonicalized first; the returned ops round-trip to
/// `canonicalize(a)` and `canonicalize(b)` under all circumstances, even if
/// every refinement stage fails.
pub fn diff(a: &str, b: &str, cfg: &EngineConfig) -> Vec<DiffOp> {
    let a = canonicalize(a);
    let b = canonicalize(b);
    if a == b {
        return coalesce(vec![DiffOp::equal(a)]);
    }

    let start = Instant::now();
    let ops = coalesce(line_and_word_cascade(&a, &b, start, cfg));
    if round_trips(&ops, &a, &b).is_ok() {
        return ops;
    }

    tracing::warn!("line/word cascade failed to round-trip, falling back to character Myers");
    let chars_a = tokenize_chars(&a);
    let chars_b = tokenize_chars(&b);
    let ops = coalesce(diff_tokens(&chars_a, &chars_b));
    if round_trips(&ops, &a, &b).is_ok() {
        return ops;
    }

    tracing::error!("character Myers failed to round-trip, using last-resort encoding");
    coalesce(last_resort(&a, &b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn appended_exclamation() {
        let ops = diff("hello world", "hello world!", &cfg());
        assert_eq!(reconstruct_old(&ops), "hello world");
        assert_eq!(reconstruct_new(&ops), "hello world!");
        assert_eq!(ops, vec![DiffOp::equal("hello world"), DiffOp::insert("!")]);
    }

    #[test]
    fn identical_inputs_yield_single_equal() {
        let ops = diff("same text", "same text", &cfg());
        assert_eq!(ops, vec![DiffOp::equal("same text")]);
    }

    #[test]
    fn word_level_replacement() {
        let ops = diff("alpha bravo charlie", "alpha BRAVO charlie", &cfg());
        assert_eq!(reconstruct_old(&ops), "alpha bravo charlie");
        assert_eq!(reconstruct_new(&ops), "alpha BRAVO charlie");
    }

    #[test]
    fn multiline_edit_round_trips() {
        let a = "line one\nline two\nline three\n";
        let b = "line one\nline TWO\nline three\nline four\n";
        let ops = diff(a, b, &cfg());
        assert_eq!(reconstruct_old(&ops), canonicalize(a));
        assert_eq!(reconstruct_new(&ops), canonicalize(b));
    }

    #[test]
    fn empty_to_nonempty() {
        let ops = diff("", "hello", &cfg());
        assert_eq!(reconstruct_old(&ops), "");
        assert_eq!(reconstruct_new(&ops), "hello");
    }

    #[test]
    fn determinism_across_repeated_invocations() {
        let a = "alpha bravo charlie delta echo";
        let b = "alpha BRAVO charlie delta foxtrot";
        let first = diff(a, b, &cfg());
        for _ in 0..25 {
            assert_eq!(diff(a, b, &cfg()), first);
        }
    }

    #[test]
    fn no_empty_payloads() {
        let ops = diff("abc", "abcd", &cfg());
        assert!(ops.iter().all(|o| !o.payload.is_empty()));
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip(a in ".{0,40}", b in ".{0,40}") {
            let cfg = EngineConfig::default();
            let ops = diff(&a, &b, &cfg);
            proptest::prop_assert_eq!(reconstruct_old(&ops), canonicalize(&a));
            proptest::prop_assert_eq!(reconstruct_new(&ops), canonicalize(&b));
        }

        #[test]
        fn prop_deterministic(a in ".{0,30}", b in ".{0,30}") {
            let cfg = EngineConfig::default();
            let first = diff(&a, &b, &cfg);
            let second = diff(&a, &b, &cfg);
            proptest::prop_assert_eq!(first, second);
        }
    }
}
