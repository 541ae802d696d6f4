//! Top-level error type for the engine facade (§7 error taxonomy).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] tscript_store::StoreError),

    #[error(transparent)]
    Core(#[from] tscript_core::CoreError),

    #[error(transparent)]
    Align(#[from] tscript_align::AlignError),

    #[error("confirmation hash does not match the current version; save first")]
    HashMismatch,

    #[error("document actor channel closed unexpectedly")]
    ChannelClosed,
}

pub type EngineResult<T> = Result<T, EngineError>;
