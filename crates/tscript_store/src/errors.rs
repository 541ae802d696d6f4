//! Error and outcome types for the Version Store (§4.6, §7 error taxonomy).

use thiserror::Error;
use tscript_core::VersionMeta;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("backend rejected the write after exhausting retries: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of `VersionStore::insert` (§4.6 contract).
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted { version: u32, base_sha256: String },
    /// `parent_version`/`expected_base_sha256` did not match the document's
    /// current latest version (§4.6 step 2, surfaced as `Conflict(409)`).
    Conflict { latest: Option<VersionMeta> },
}
