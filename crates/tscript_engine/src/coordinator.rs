//! Save Coordinator (C7): `Idle → Pending → Saving → {Idle | Conflict |
//! Aligning} → Idle` per document (§4.7).

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tscript_core::{canonicalize, sha256_hex, DiffOp, EngineConfig, VersionMeta, Word};
use tscript_store::{with_retry, InsertOutcome, VersionStore};

use crate::errors::EngineResult;
use crate::events::{AlignmentOutcome, EngineEvent};
use crate::verify::{self, VerifyOutcome};

/// Inputs to one `save` call (§4.7 operation signature).
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub editor_text: String,
    /// `0` means "no known parent" (first save of a document).
    pub client_version: u32,
    pub client_base_hash: Option<String>,
    pub caret_segment: usize,
    pub created_by: String,
    pub created_at: String,
}

/// Result of `save` (§6 egress contract).
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    NoChange,
    Ok { version: u32, base_sha256: String, chain_verified: bool },
    Conflict { parent: Option<VersionMeta>, latest: Option<VersionMeta>, d1: Vec<DiffOp>, d2: Vec<DiffOp> },
}

pub(crate) struct Envelope {
    pub request: SaveRequest,
    pub reply: oneshot::Sender<EngineResult<SaveOutcome>>,
}

/// One actor task per document; serialises `Saving` while letting
/// background alignment run without blocking the next save (§4.7
/// back-pressure, §5 concurrency model).
pub(crate) async fn run_doc_actor<S: VersionStore + Send + Sync + 'static>(
    doc: String,
    store: Arc<S>,
    cfg: EngineConfig,
    events: broadcast::Sender<EngineEvent>,
    mut rx: mpsc::Receiver<Envelope>,
) {
    while let Some(Envelope { request, reply }) = rx.recv().await {
        let outcome = process_save(&doc, &store, &cfg, &events, request).await;
        let _ = reply.send(outcome);
    }
}

async fn process_save<S: VersionStore + Send + Sync + 'static>(
    doc: &str,
    store: &Arc<S>,
    cfg: &EngineConfig,
    events: &broadcast::Sender<EngineEvent>,
    req: SaveRequest,
) -> EngineResult<SaveOutcome> {
    let text = canonicalize(&req.editor_text);

    // Step 2: no-op short-circuit.
    if req.client_version > 0 {
        if let Some(base_hash) = &req.client_base_hash {
            if *base_hash == sha256_hex(text.as_bytes()) {
                return Ok(SaveOutcome::NoChange);
            }
        }
    }

    let parent_record = if req.client_version > 0 {
        with_retry(cfg, || store.get(doc, req.client_version)).await?
    } else {
        None
    };
    let parent_text = parent_record.as_ref().map(|v| v.text.clone()).unwrap_or_default();
    let parent_meta = parent_record.as_ref().map(VersionMeta::from);

    // Step 3: early conflict probe.
    if req.client_version > 0 {
        let latest = with_retry(cfg, || store.latest(doc)).await?;
        let latest_version_num = latest.as_ref().map(|v| v.version).unwrap_or(0);
        if latest_version_num != req.client_version {
            let d1 = tscript_diff::diff(&parent_text, latest.as_ref().map(|v| v.text.as_str()).unwrap_or(""), cfg);
            let d2 = tscript_diff::diff(&parent_text, &text, cfg);
            return Ok(SaveOutcome::Conflict {
                parent: parent_meta,
                latest: latest.as_ref().map(VersionMeta::from),
                d1,
                d2,
            });
        }
    }

    // Step 4: build words_for_save, carrying over matched timings.
    let baseline_words: Vec<Word> = parent_record.as_ref().map(|v| v.words.clone()).unwrap_or_default();
    let words_for_save = tscript_align::words_with_matched_timing(&baseline_words, &text);

    // Step 5: insert.
    let parent_opt = if req.client_version > 0 { Some(req.client_version) } else { None };
    let insert_result = with_retry(cfg, || {
        store.insert(
            doc,
            parent_opt,
            req.client_base_hash.clone(),
            text.clone(),
            words_for_save.clone(),
            None,
            req.created_by.clone(),
            req.created_at.clone(),
        )
    })
    .await?;

    let (child, base_sha256) = match insert_result {
        InsertOutcome::Conflict { latest: latest_meta } => {
            let latest_full = match &latest_meta {
                Some(meta) => with_retry(cfg, || store.get(doc, meta.version)).await?,
                None => None,
            };
            let d1 = tscript_diff::diff(&parent_text, latest_full.as_ref().map(|v| v.text.as_str()).unwrap_or(""), cfg);
            let d2 = tscript_diff::diff(&parent_text, &text, cfg);
            return Ok(SaveOutcome::Conflict { parent: parent_meta, latest: latest_meta, d1, d2 });
        }
        InsertOutcome::Inserted { version, base_sha256 } => (version, base_sha256),
    };

    let _ = events.send(EngineEvent::VersionChanged {
        doc: doc.to_string(),
        version: child,
        base_sha256: base_sha256.clone(),
    });

    // Step 6: background alignment, re-enterable — does not block the next save.
    spawn_alignment(doc.to_string(), cfg.clone(), events.clone(), baseline_words, text, child);

    // Step 7: chain verification, reported to the caller.
    let verify_outcome = verify::verify(store.as_ref(), doc).await?;
    let chain_verified = matches!(verify_outcome, VerifyOutcome::Ok { .. });

    Ok(SaveOutcome::Ok { version: child, base_sha256, chain_verified })
}

fn spawn_alignment(
    doc: String,
    cfg: EngineConfig,
    events: broadcast::Sender<EngineEvent>,
    baseline_words: Vec<Word>,
    text: String,
    version: u32,
) {
    tokio::spawn(async move {
        let (words, _blocks) = tscript_align::align(&baseline_words, &text, &cfg);
        match tscript_align::validate(&words, &cfg) {
            Ok(()) => {
                let _ = events.send(EngineEvent::TokensUpdated { doc: doc.clone(), version, words });
                let _ =
                    events.send(EngineEvent::AlignmentFinished { doc, version, outcome: AlignmentOutcome::Accepted });
            }
            Err(err) => {
                // §7: discard the incoming aligned words, keep the
                // previously stored ones; the save itself already committed.
                tracing::warn!(%err, doc, version, "alignment validation failed");
                let _ = events.send(EngineEvent::AlignmentFinished {
                    doc,
                    version,
                    outcome: AlignmentOutcome::Rejected(err),
                });
            }
        }
    });
}
