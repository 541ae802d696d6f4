//! Error type for diff validation failures.
//!
//! Every public `diff` call always returns a value — the cascade's last
//! resort (§4.3 step 4c) never fails — so this type is only used internally
//! between cascade stages.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("reconstructed text does not round-trip to the expected input")]
    ValidationFailed,
}

pub type DiffResult<T> = Result<T, DiffError>;
