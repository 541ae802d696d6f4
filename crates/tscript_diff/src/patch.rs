//! Patch Composer (C4): diff scripts to positional edits, overlap
//! detection, and application (§4.4). Positions are character indices, to
//! match `Confirmation.start_offset/end_offset`.

use tscript_core::{DiffOp, OpCode};

/// A positional edit: replace `base[start..end)` (character indices) with
/// `ins`. `start == end` for a pure insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub ins: String,
}

impl Edit {
    pub fn is_pure_insertion(&self) -> bool {
        self.start == self.end
    }
}

/// Walk `ops` left-to-right tracking a character cursor in `base`, turning
/// the diff script into a list of positional edits (§4.4).
pub fn to_edits(ops: &[DiffOp]) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut pos = 0usize;
    let mut pending: Option<Edit> = None;

    let flush = |pending: &mut Option<Edit>, edits: &mut Vec<Edit>| {
        if let Some(e) = pending.take() {
            edits.push(e);
        }
    };

    for op in ops {
        let len = op.payload.chars().count();
        match op.op {
            OpCode::Equal => {
                flush(&mut pending, &mut edits);
                pos += len;
            }
            OpCode::Delete => {
                let e = pending.get_or_insert_with(|| Edit { start: pos, end: pos, ins: String::new() });
                e.end += len;
                pos += len;
            }
            OpCode::Insert => {
                let e = pending.get_or_insert_with(|| Edit { start: pos, end: pos, ins: String::new() });
                e.ins.push_str(&op.payload);
            }
        }
    }
    flush(&mut pending, &mut edits);
    edits
}

/// Whether two edits, derived from the same `base`, touch overlapping
/// character ranges (§4.4).
pub fn overlaps(e1: &Edit, e2: &Edit) -> bool {
    match (e1.is_pure_insertion(), e2.is_pure_insertion()) {
        (true, true) => e1.start == e2.start,
        (true, false) => e1.start >= e2.start && e1.start < e2.end,
        (false, true) => e2.start >= e1.start && e2.start < e1.end,
        (false, false) => e1.start < e2.end && e2.start < e1.end,
    }
}

/// Apply `edits` to `base`, sorted by `start` descending (ties: larger `end`
/// first) so earlier positions stay valid while later ones are spliced in
/// (§4.4).
pub fn apply(base: &str, edits: &[Edit]) -> String {
    let mut chars: Vec<char> = base.chars().collect();
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    for edit in sorted {
        let ins_chars: Vec<char> = edit.ins.chars().collect();
        chars.splice(edit.start..edit.end, ins_chars);
    }
    chars.into_iter().collect()
}
