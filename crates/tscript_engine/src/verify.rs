//! Chain Verifier (C9): replay `v1` through all `EditRecord`s and check the
//! final hash against `latest.base_sha256` (§4.9).

use tscript_core::{canonicalize, reconstruct_new, reconstruct_old, sha256_hex};
use tscript_store::VersionStore;

use crate::errors::EngineResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Reserved for malformed persisted ops; unreachable via this crate's
    /// strongly-typed `EditRecord`, kept so other store backends that
    /// deserialize ops from an untyped source have somewhere to report it.
    BadOps { at: u32 },
    OpsDontMatchParent { at: u32 },
    Mismatch { got: String, expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok { hash: String },
    NoVersion,
    Err(VerifyFailure),
}

/// `verify(doc)` of §4.9.
pub async fn verify<S: VersionStore + ?Sized>(store: &S, doc: &str) -> EngineResult<VerifyOutcome> {
    let Some(latest) = store.latest(doc).await? else {
        return Ok(VerifyOutcome::NoVersion);
    };
    let Some(v1) = store.get(doc, 1).await? else {
        return Ok(VerifyOutcome::NoVersion);
    };

    let mut text = canonicalize(&v1.text);
    let mut edits = store.edits(doc).await?;
    edits.sort_by_key(|e| e.child_version);

    for edit in &edits {
        if reconstruct_old(&edit.text_ops) != text {
            return Ok(VerifyOutcome::Err(VerifyFailure::OpsDontMatchParent { at: edit.child_version }));
        }
        text = reconstruct_new(&edit.text_ops);
    }

    let hash = sha256_hex(text.as_bytes());
    if hash == latest.base_sha256 {
        Ok(VerifyOutcome::Ok { hash })
    } else {
        Ok(VerifyOutcome::Err(VerifyFailure::Mismatch { got: hash, expected: latest.base_sha256 }))
    }
}
