//! Timing Aligner (C5): propagate/derive per-word times across edits (§4.5).

use std::sync::OnceLock;

use regex::Regex;
use tscript_core::{is_fake_timing, EngineConfig, TimingBlock, TimingItem, Word};
use tscript_diff::{classify_new_tokens, TokenOrigin};

use crate::errors::{AlignError, AlignResult};

fn new_text_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n|[ \t]+|[\p{L}\p{N}\p{M}]+|.").expect("static regex is valid"))
}

/// Tokenise `new_text`, keeping whitespace and newlines as their own tokens
/// (§4.5 step 2).
fn tokenize(new_text: &str) -> Vec<&str> {
    new_text_token_re().find_iter(new_text).map(|m| m.as_str()).collect()
}

fn is_whitespace_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_whitespace()) && s != "\n"
}

/// Normalise baseline whitespace-run words into zero-length anchors,
/// interpolated within the original word's span (§4.5 step 1).
fn normalize_baseline(words: &[Word]) -> Vec<Word> {
    words
        .iter()
        .map(|w| {
            if is_whitespace_token(&w.word) {
                if let (Some(s), Some(e)) = (w.start, w.end) {
                    let mid = (s + e) / 2.0;
                    return Word { start: Some(mid), end: Some(mid), ..w.clone() };
                }
            }
            w.clone()
        })
        .collect()
}

struct Anchor {
    time: f64,
}

/// Fill insertion-run timings from the nearest keep anchors on each side
/// (§4.5 step 4), then monotonise (§4.5 step 5).
fn fill_and_monotonize(words: &mut [Word], cfg: &EngineConfig) {
    let mut i = 0;
    while i < words.len() {
        if words[i].start.is_some() || words[i].is_newline() {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < words.len() && words[i].start.is_none() && !words[i].is_newline() {
            i += 1;
        }
        let run_end = i; // exclusive

        let left = find_left_anchor(words, run_start);
        let right = find_right_anchor(words, run_end, cfg, left.time);
        fill_run(words, run_start, run_end, &left, &right, cfg);
    }

    monotonize(words, cfg);
}

fn find_left_anchor(words: &[Word], before: usize) -> Anchor {
    for idx in (0..before).rev() {
        if words[idx].is_newline() {
            break;
        }
        if let Some(end) = words[idx].end {
            return Anchor { time: end };
        }
    }
    Anchor { time: 0.0 }
}

fn find_right_anchor(words: &[Word], from: usize, cfg: &EngineConfig, fallback_from: f64) -> Anchor {
    for idx in from..words.len() {
        if words[idx].is_newline() {
            break;
        }
        if let Some(start) = words[idx].start {
            return Anchor { time: start };
        }
    }
    Anchor { time: fallback_from + cfg.min_word_duration_seconds }
}

fn fill_run(words: &mut [Word], start: usize, end: usize, left: &Anchor, right: &Anchor, cfg: &EngineConfig) {
    let word_positions: Vec<usize> =
        (start..end).filter(|&i| !is_whitespace_token(&words[i].word)).collect();

    if word_positions.is_empty() {
        // Whitespace-only insertion cluster: collapse to a single mid-window
        // anchor (§4.5 step 4).
        let mid = (left.time + right.time) / 2.0;
        for w in &mut words[start..end] {
            w.start = Some(mid);
            w.end = Some(mid);
        }
        return;
    }

    let window = (right.time - left.time).max(0.0);
    let n = word_positions.len() as f64;
    let slot = (window / n).max(cfg.min_word_duration_seconds);

    let mut cursor = left.time;
    for &idx in &word_positions {
        let w_start = cursor;
        let w_end = w_start + cfg.min_word_duration_seconds.max(slot - cfg.epsilon_seconds);
        words[idx].start = Some(w_start);
        words[idx].end = Some(w_end);
        cursor = w_end + cfg.epsilon_seconds;
    }
    // Non-word whitespace tokens inside a mixed run collapse to zero-width
    // anchors at their position (baseline normalisation, step 1, applied to
    // freshly-inserted runs too).
    for i in start..end {
        if is_whitespace_token(&words[i].word) && words[i].start.is_none() {
            let anchor = word_positions.iter().rev().find(|&&p| p < i).and_then(|&p| words[p].end);
            let t = anchor.unwrap_or(left.time);
            words[i].start = Some(t);
            words[i].end = Some(t);
        }
    }
}

fn monotonize(words: &mut [Word], cfg: &EngineConfig) {
    let mut prev_end: Option<f64> = None;
    for w in words.iter_mut() {
        if w.is_newline() {
            prev_end = None;
            continue;
        }
        if let Some(start) = w.start {
            let adjusted_start = match prev_end {
                Some(prev) if start < prev - cfg.epsilon_seconds => prev,
                _ => start,
            };
            let min_end = adjusted_start + cfg.min_word_duration_seconds;
            let adjusted_end = w.end.map(|e| e.max(min_end)).or(Some(min_end));
            w.start = Some(adjusted_start);
            w.end = adjusted_end;
            prev_end = w.end;
        }
    }
}

/// Validate the output timings (§4.5 Validation, §8 property 5).
pub fn validate(words: &[Word], cfg: &EngineConfig) -> AlignResult<()> {
    let mut prev_end: Option<f64> = None;
    for (idx, w) in words.iter().enumerate() {
        if let Some(s) = w.start {
            if is_fake_timing(s) {
                return Err(AlignError::FakeTiming { index: idx, value: s.to_string() });
            }
        }
        if let Some(e) = w.end {
            if is_fake_timing(e) {
                return Err(AlignError::FakeTiming { index: idx, value: e.to_string() });
            }
        }
        if let (Some(s), Some(e)) = (w.start, w.end) {
            if e < s {
                return Err(AlignError::EndBeforeStart { index: idx, start: s.to_string(), end: e.to_string() });
            }
        }
        if w.is_newline() {
            prev_end = None;
            continue;
        }
        if let (Some(prev), Some(s)) = (prev_end, w.start) {
            if s < prev - cfg.epsilon_seconds {
                return Err(AlignError::NonMonotonic { index: idx, start: s.to_string(), prev_end: prev.to_string() });
            }
        }
        if w.end.is_some() {
            prev_end = w.end;
        }
    }
    Ok(())
}

/// Classify `new_text`'s tokens against `baseline_words` and carry over
/// timing/probability wherever a token matches exactly; newly inserted
/// tokens get `null` timing (§4.7 step 4: "words_for_save"). This is the
/// non-interpolating half of [`align`], exposed separately because the Save
/// Coordinator needs it synchronously while the interpolated, monotonised
/// result is only needed by the background realignment step.
pub fn words_with_matched_timing(baseline_words: &[Word], new_text: &str) -> Vec<Word> {
    let baseline = normalize_baseline(baseline_words);
    let baseline_tokens: Vec<&str> = baseline.iter().map(|w| w.word.as_str()).collect();
    let new_tokens = tokenize(new_text);
    let origins = classify_new_tokens(&baseline_tokens, &new_tokens);

    new_tokens
        .iter()
        .zip(origins.iter())
        .map(|(tok, origin)| {
            if *tok == "\n" {
                return Word::new("\n");
            }
            match origin {
                TokenOrigin::Keep(idx) => Word {
                    word: (*tok).to_string(),
                    start: baseline[*idx].start,
                    end: baseline[*idx].end,
                    probability: baseline[*idx].probability,
                },
                TokenOrigin::Insert => Word::new(*tok),
            }
        })
        .collect()
}

/// Re-align `new_text` against `baseline_words`, producing a full word
/// sequence with propagated/derived timings and the `TimingBlock`s to
/// persist in the resulting `EditRecord` (§4.5).
pub fn align(baseline_words: &[Word], new_text: &str, cfg: &EngineConfig) -> (Vec<Word>, Vec<TimingBlock>) {
    let mut words = words_with_matched_timing(baseline_words, new_text);
    let before_fill = words.clone();

    fill_and_monotonize(&mut words, cfg);

    let blocks = build_timing_blocks(&before_fill, &words);
    (words, blocks)
}

/// Group changed words into per-segment `TimingBlock`s (§4.5 step 6).
/// `before` is the word sequence immediately after token classification,
/// i.e. before interpolation/monotonisation filled in new timings —
/// positionally aligned with `words`, so deltas compare like-for-like
/// regardless of how baseline indices shifted under insertions/deletions.
fn build_timing_blocks(before: &[Word], words: &[Word]) -> Vec<TimingBlock> {
    let mut blocks = Vec::new();
    let mut seg_start = 0usize;

    for i in 0..=words.len() {
        let at_boundary = i == words.len() || words[i].is_newline();
        if !at_boundary {
            continue;
        }
        if i > seg_start {
            let items: Vec<TimingItem> = (seg_start..i)
                .map(|idx| {
                    let new_w = &words[idx];
                    let old_w = before.get(idx);
                    TimingItem {
                        word: new_w.word.clone(),
                        old_start: old_w.and_then(|w| w.start),
                        new_start: new_w.start,
                        old_end: old_w.and_then(|w| w.end),
                        new_end: new_w.end,
                        delta_start: match (old_w.and_then(|w| w.start), new_w.start) {
                            (Some(o), Some(n)) => Some(n - o),
                            _ => None,
                        },
                        delta_end: match (old_w.and_then(|w| w.end), new_w.end) {
                            (Some(o), Some(n)) => Some(n - o),
                            _ => None,
                        },
                    }
                })
                .collect();
            let changed = items.iter().any(|it| it.delta_start.map(|d| d != 0.0).unwrap_or(true));
            if changed {
                blocks.push(TimingBlock { segment_start: seg_start, segment_end: i, items });
            }
        }
        seg_start = i + 1;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    fn w(word: &str, start: f64, end: f64) -> Word {
        Word::with_timing(word, start, end)
    }

    #[test]
    fn preserves_timing_for_unchanged_words() {
        let baseline = vec![w("hello", 0.0, 0.5), Word::new(" "), w("world", 0.5, 1.0)];
        let (words, _) = align(&baseline, "hello world", &cfg());
        assert_eq!(words[0].start, Some(0.0));
        assert_eq!(words[0].end, Some(0.5));
        assert_eq!(words[2].start, Some(0.5));
        assert_eq!(words[2].end, Some(1.0));
    }

    #[test]
    fn appended_word_gets_interpolated_timing() {
        let baseline = vec![w("hello", 0.0, 0.5)];
        let (words, _) = align(&baseline, "hello again", &cfg());
        assert!(validate(&words, &cfg()).is_ok());
        assert_eq!(words[0].start, Some(0.0));
        let inserted = &words[2];
        assert_eq!(inserted.word, "again");
        assert!(inserted.start.unwrap() >= words[0].end.unwrap());
    }

    #[test]
    fn rejects_fake_timing() {
        let words = vec![Word::with_timing("hi", 9999999990.1, 9999999990.2)];
        assert!(matches!(validate(&words, &cfg()), Err(AlignError::FakeTiming { .. })));
    }

    #[test]
    fn newline_resets_anchor_window() {
        let baseline = vec![w("first", 0.0, 0.5), Word::new("\n"), w("second", 1.0, 1.5)];
        let (words, _) = align(&baseline, "first\nsecond extra", &cfg());
        assert!(validate(&words, &cfg()).is_ok());
    }

    #[test]
    fn timing_blocks_only_cover_changed_segments() {
        let baseline = vec![w("hello", 0.0, 0.5), Word::new(" "), w("world", 0.5, 1.0)];
        let (_, blocks) = align(&baseline, "hello world", &cfg());
        assert!(blocks.is_empty());
    }
}
