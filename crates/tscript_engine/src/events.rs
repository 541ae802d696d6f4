//! Typed event bus (§9 redesign: "loose coupling via subscribe/notify →
//! explicit event bus"). Observers call `Engine::subscribe` and match on
//! variants instead of probing a string-tagged payload.

use tscript_align::AlignError;
use tscript_core::Word;

/// Why background alignment did or didn't produce usable timings (§6/§7
/// error taxonomy: `InvalidTiming`/`FakeTiming` are distinct surfaced codes,
/// not a bare success/failure flag).
#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentOutcome {
    Accepted,
    Rejected(AlignError),
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new version was durably committed.
    VersionChanged { doc: String, version: u32, base_sha256: String },
    /// Background alignment produced a fresh word sequence for display.
    TokensUpdated { doc: String, version: u32, words: Vec<Word> },
    /// Confirmations for `(doc, version)` were replaced.
    ConfirmationsChanged { doc: String, version: u32 },
    /// Background alignment completed, successfully or not (§4.7 step 6,
    /// §7 propagation policy).
    AlignmentFinished { doc: String, version: u32, outcome: AlignmentOutcome },
}
