//! Centralized numeric/config constants (§4 across components).
//!
//! One struct owns every tunable, so tests can override them (e.g. a
//! near-zero diff time budget) without threading magic numbers everywhere.

use std::time::Duration;

/// Tolerance used when comparing adjacent word timings (§3 invariant b, §4.5).
pub const EPSILON_SECONDS: f64 = 1e-3;

/// Minimum duration assigned to a word token during alignment (§4.5 step 4).
pub const MIN_WORD_DURATION_SECONDS: f64 = 0.02;

/// Confirmation context length on each side of `exact` (§4.8).
pub const CONFIRMATION_CONTEXT_CHARS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// §3/§4.5 timing tolerance.
    pub epsilon_seconds: f64,
    /// §4.5 minimum word duration.
    pub min_word_duration_seconds: f64,
    /// §4.8 prefix/suffix context length.
    pub confirmation_context_chars: usize,
    /// §5 soft time budget for the diff engine before falling back to a
    /// coarser strategy.
    pub diff_time_budget: Duration,
    /// §4.6 retry policy: max attempts for transient store errors.
    pub store_max_attempts: u32,
    /// §4.6 retry policy: total wall-clock budget across all attempts.
    pub store_retry_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon_seconds: EPSILON_SECONDS,
            min_word_duration_seconds: MIN_WORD_DURATION_SECONDS,
            confirmation_context_chars: CONFIRMATION_CONTEXT_CHARS,
            diff_time_budget: Duration::from_millis(800),
            store_max_attempts: 6,
            store_retry_budget: Duration::from_millis(1200),
        }
    }
}
