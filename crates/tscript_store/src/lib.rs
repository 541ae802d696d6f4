//! Version Store (C6): persists versions, edit records, and timing deltas,
//! and enforces the per-document hash chain and conflict check (§4.6).

pub mod errors;
pub mod retry;
pub mod store;

pub use errors::{InsertOutcome, StoreError, StoreResult};
pub use retry::with_retry;
pub use store::{InMemoryStore, VersionStore};
