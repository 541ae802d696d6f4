//! Auto-merge: compose two non-overlapping edit streams against a common
//! ancestor (§1 item 3, §8 property 8).

use tscript_core::DiffOp;

use crate::patch::{apply, overlaps, to_edits};

/// Result of attempting to auto-merge two edit streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(String),
    /// The two edit streams touch overlapping ranges of `base` (S4).
    Unmergeable,
}

/// Compose `ops_latest` and `ops_mine`, both diffed against the same `base`,
/// into a single merged text. Returns `Unmergeable` if any edit from one
/// stream overlaps any edit from the other.
pub fn merge(base: &str, ops_latest: &[DiffOp], ops_mine: &[DiffOp]) -> MergeOutcome {
    let edits_latest = to_edits(ops_latest);
    let edits_mine = to_edits(ops_mine);

    for a in &edits_latest {
        for b in &edits_mine {
            if overlaps(a, b) {
                return MergeOutcome::Unmergeable;
            }
        }
    }

    let mut combined = edits_latest;
    combined.extend(edits_mine);
    MergeOutcome::Merged(apply(base, &combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscript_core::EngineConfig;

    fn diff(a: &str, b: &str) -> Vec<DiffOp> {
        crate::engine::diff(a, b, &EngineConfig::default())
    }

    #[test]
    fn composes_non_overlapping_edits() {
        // S3: client edits "bravo"→"BRAVO"; latest appends " delta".
        let base = "alpha bravo charlie";
        let mine = diff(base, "alpha BRAVO charlie");
        let latest = diff(base, "alpha bravo charlie delta");
        let outcome = merge(base, &latest, &mine);
        assert_eq!(outcome, MergeOutcome::Merged("alpha BRAVO charlie delta".into()));
    }

    #[test]
    fn rejects_overlapping_edits() {
        // S4: both streams rewrite "bravo".
        let base = "alpha bravo charlie";
        let mine = diff(base, "alpha BRAVO charlie");
        let latest = diff(base, "alpha beta charlie");
        assert_eq!(merge(base, &latest, &mine), MergeOutcome::Unmergeable);
    }

    #[test]
    fn merge_is_order_independent_for_disjoint_edits() {
        let base = "one two three four";
        let mine = diff(base, "ONE two three four");
        let latest = diff(base, "one two three FOUR");
        let forward = merge(base, &latest, &mine);
        let backward = merge(base, &mine, &latest);
        assert_eq!(forward, backward);
        assert_eq!(forward, MergeOutcome::Merged("ONE two three FOUR".into()));
    }
}
