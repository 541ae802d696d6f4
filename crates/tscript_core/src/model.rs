//! §3 Data model: Document, Version, Word, EditRecord, Confirmation.

use serde::{Deserialize, Serialize};

use crate::canon::canonicalize;
use crate::config::EngineConfig;
use crate::errors::{CoreError, CoreResult};

/// A single ASR word token, or `"\n"` acting as a segment separator, or a
/// whitespace run (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl Word {
    pub fn new(word: impl Into<String>) -> Self {
        Self { word: word.into(), start: None, end: None, probability: None }
    }

    pub fn with_timing(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self { word: word.into(), start: Some(start), end: Some(end), probability: None }
    }

    pub fn is_newline(&self) -> bool {
        self.word == "\n"
    }
}

/// A "fake" timing value is a start/end whose decimal representation begins
/// `999999999` (§3 invariant c, §4.5 validation).
pub fn is_fake_timing(value: f64) -> bool {
    // Format with enough precision that a deliberately-injected fake value
    // (e.g. 9999999990.1) is unambiguously recognizable by its leading digits.
    let formatted = format!("{value}");
    let digits_only: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
    digits_only.starts_with("999999999")
}

/// An immutable snapshot of a document's canonical text + aligned words at a
/// monotonic integer index (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version: u32,
    pub text: String,
    pub base_sha256: String,
    pub words: Vec<Word>,
    pub created_by: String,
    pub created_at: String,
}

impl Version {
    /// Check the per-version invariants of §3: (a) words reconstruct text,
    /// (b) monotonic timings, (c) no fake timing values.
    pub fn check_invariants(&self, cfg: &EngineConfig) -> CoreResult<()> {
        let concatenated: String = self.words.iter().map(|w| w.word.as_str()).collect();
        if canonicalize(&concatenated) != canonicalize(&self.text) {
            return Err(CoreError::TextMismatch);
        }

        let mut prev_end: Option<f64> = None;
        for (idx, w) in self.words.iter().enumerate() {
            if let Some(p) = w.probability {
                if !(0.0..=1.0).contains(&p) {
                    return Err(CoreError::ProbabilityOutOfRange(p));
                }
            }
            if let Some(start) = w.start {
                if is_fake_timing(start) {
                    return Err(CoreError::FakeTiming { index: idx, value: start.to_string() });
                }
            }
            if let Some(end) = w.end {
                if is_fake_timing(end) {
                    return Err(CoreError::FakeTiming { index: idx, value: end.to_string() });
                }
            }
            if let (Some(start), Some(end)) = (w.start, w.end) {
                if end < start {
                    return Err(CoreError::EndBeforeStart {
                        index: idx,
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
            }
            if w.is_newline() {
                prev_end = None;
                continue;
            }
            if let (Some(prev), Some(start)) = (prev_end, w.start) {
                if start < prev - cfg.epsilon_seconds {
                    return Err(CoreError::NonMonotonicTiming {
                        index: idx,
                        start: start.to_string(),
                        prev_end: prev.to_string(),
                    });
                }
            }
            if w.end.is_some() {
                prev_end = w.end;
            }
        }
        Ok(())
    }
}

/// Sign of a diff/edit operation: `-1` delete, `0` equal, `+1` insert (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    Delete = -1,
    Equal = 0,
    Insert = 1,
}

impl OpCode {
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

/// One operation of a diff script: `(op, payload)` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOp {
    pub op: OpCode,
    pub payload: String,
}

impl DiffOp {
    pub fn equal(payload: impl Into<String>) -> Self {
        Self { op: OpCode::Equal, payload: payload.into() }
    }
    pub fn delete(payload: impl Into<String>) -> Self {
        Self { op: OpCode::Delete, payload: payload.into() }
    }
    pub fn insert(payload: impl Into<String>) -> Self {
        Self { op: OpCode::Insert, payload: payload.into() }
    }
}

/// Reconstruct the "new" (child) text: concatenate payloads of ops whose
/// code is not `Delete`.
pub fn reconstruct_new(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|o| o.op != OpCode::Delete)
        .map(|o| o.payload.as_str())
        .collect()
}

/// Reconstruct the "old" (parent) text: concatenate payloads of ops whose
/// code is not `Insert`.
pub fn reconstruct_old(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|o| o.op != OpCode::Insert)
        .map(|o| o.payload.as_str())
        .collect()
}

/// Per-word timing delta recorded for one segment neighbourhood (§4.5 step 6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingItem {
    pub word: String,
    pub old_start: Option<f64>,
    pub new_start: Option<f64>,
    pub old_end: Option<f64>,
    pub new_end: Option<f64>,
    pub delta_start: Option<f64>,
    pub delta_end: Option<f64>,
}

/// A persisted description of per-word time changes for a segment
/// neighbourhood, produced by alignment (§4.5 step 6, glossary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingBlock {
    pub segment_start: usize,
    pub segment_end: usize,
    pub items: Vec<TimingItem>,
}

/// The diff (and optional timing deltas) that takes `parent` to `child` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub parent_version: u32,
    pub child_version: u32,
    pub text_ops: Vec<DiffOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_ops: Option<Vec<TimingBlock>>,
}

/// A reviewer-signed range anchored to a specific (version, text-hash) pair
/// (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub start_offset: u32,
    pub end_offset: u32,
    pub prefix: String,
    pub exact: String,
    pub suffix: String,
    pub base_sha256: String,
}

/// Lightweight version summary returned by `Store::history` (§4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub version: u32,
    pub base_sha256: String,
    pub created_by: String,
    pub created_at: String,
}

impl From<&Version> for VersionMeta {
    fn from(v: &Version) -> Self {
        Self {
            version: v.version,
            base_sha256: v.base_sha256.clone(),
            created_by: v.created_by.clone(),
            created_at: v.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_timing_detection() {
        assert!(is_fake_timing(9999999990.1));
        assert!(!is_fake_timing(1.25));
        assert!(!is_fake_timing(0.0));
    }

    #[test]
    fn reconstruct_round_trip() {
        let ops = vec![
            DiffOp::equal("hello "),
            DiffOp::delete("world"),
            DiffOp::insert("there"),
        ];
        assert_eq!(reconstruct_old(&ops), "hello world");
        assert_eq!(reconstruct_new(&ops), "hello there");
    }

    #[test]
    fn version_invariants_catch_text_mismatch() {
        let v = Version {
            version: 1,
            text: "hello".into(),
            base_sha256: String::new(),
            words: vec![Word::new("goodbye")],
            created_by: "tester".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert_eq!(v.check_invariants(&EngineConfig::default()), Err(CoreError::TextMismatch));
    }

    #[test]
    fn version_invariants_accept_well_formed() {
        let v = Version {
            version: 1,
            text: "hi bye".into(),
            base_sha256: String::new(),
            words: vec![
                Word::with_timing("hi", 0.0, 0.2),
                Word::new(" "),
                Word::with_timing("bye", 0.2, 0.5),
            ],
            created_by: "tester".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert!(v.check_invariants(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn version_invariants_catch_probability_out_of_range() {
        let v = Version {
            version: 1,
            text: "hi".into(),
            base_sha256: String::new(),
            words: vec![Word { word: "hi".into(), start: None, end: None, probability: Some(1.2) }],
            created_by: "tester".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert_eq!(v.check_invariants(&EngineConfig::default()), Err(CoreError::ProbabilityOutOfRange(1.2)));
    }

    #[test]
    fn version_invariants_catch_non_monotonic() {
        let v = Version {
            version: 1,
            text: "hi bye".into(),
            base_sha256: String::new(),
            words: vec![
                Word::with_timing("hi", 0.5, 0.6),
                Word::new(" "),
                Word::with_timing("bye", 0.0, 0.2),
            ],
            created_by: "tester".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert!(matches!(
            v.check_invariants(&EngineConfig::default()),
            Err(CoreError::NonMonotonicTiming { .. })
        ));
    }
}
