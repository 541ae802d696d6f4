//! `Engine`: the facade the editor collaborator calls (§6).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tscript_core::{Confirmation, EngineConfig, Word};
use tscript_store::VersionStore;

use crate::confirmations::ConfirmationManager;
use crate::coordinator::{run_doc_actor, Envelope, SaveOutcome, SaveRequest};
use crate::errors::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::verify::{self, VerifyOutcome};

const EVENT_BUS_CAPACITY: usize = 256;
const DOC_MAILBOX_CAPACITY: usize = 32;

/// Result of `load` (§6 ingress contract). `baseline_words` and
/// `current_words` start out identical; the editor mutates its local copy of
/// `current_words` as the transcript plays/edits, while `baseline_words`
/// stays the anchor the next `save` diffs against.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub version: u32,
    pub base_sha256: String,
    pub baseline_words: Vec<Word>,
    pub current_words: Vec<Word>,
    /// Opaque handle to the underlying audio asset, if the store tracks one.
    /// This engine's `VersionStore` carries no audio metadata, so it is
    /// always `None`.
    pub audio_handle: Option<String>,
}

/// Facade over the Save Coordinator, Confirmation Manager, and Chain
/// Verifier. One `Engine` instance serves every document backed by `S`.
pub struct Engine<S: VersionStore + Send + Sync + 'static> {
    store: Arc<S>,
    cfg: EngineConfig,
    events: broadcast::Sender<EngineEvent>,
    confirmations: ConfirmationManager,
    actors: Mutex<HashMap<String, mpsc::Sender<Envelope>>>,
}

impl<S: VersionStore + Send + Sync + 'static> Engine<S> {
    pub fn new(store: S, cfg: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            store: Arc::new(store),
            cfg,
            events,
            confirmations: ConfirmationManager::new(),
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// Observers register for `EngineEvent` variants (§9 redesign: typed
    /// event bus).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Start (if not already running) the per-document actor that
    /// serialises saves for `doc`.
    pub async fn open(&self, doc: &str) {
        let mut actors = self.actors.lock().await;
        if actors.contains_key(doc) {
            return;
        }
        let (tx, rx) = mpsc::channel(DOC_MAILBOX_CAPACITY);
        tokio::spawn(run_doc_actor(doc.to_string(), self.store.clone(), self.cfg, self.events.clone(), rx));
        actors.insert(doc.to_string(), tx);
    }

    /// `save` of §6: submits the request to the document's actor and awaits
    /// its reply. Implicitly opens the document if this is the first call.
    pub async fn save(&self, doc: &str, request: SaveRequest) -> EngineResult<SaveOutcome> {
        self.open(doc).await;
        let tx = {
            let actors = self.actors.lock().await;
            actors.get(doc).cloned().expect("actor was just opened")
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Envelope { request, reply: reply_tx }).await.map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// `load(doc)` of §6: the latest committed version's text-agnostic
    /// payload an editor needs to open a document. Returns `None` if `doc`
    /// has no versions yet.
    pub async fn load(&self, doc: &str) -> EngineResult<Option<LoadedDocument>> {
        let latest = self.store.latest(doc).await?;
        Ok(latest.map(|v| LoadedDocument {
            version: v.version,
            base_sha256: v.base_sha256,
            baseline_words: v.words.clone(),
            current_words: v.words,
            audio_handle: None,
        }))
    }

    /// `verify(doc)` of §4.9.
    pub async fn verify(&self, doc: &str) -> EngineResult<VerifyOutcome> {
        verify::verify(self.store.as_ref(), doc).await
    }

    /// `save_confirmations` of §4.8.
    pub async fn save_confirmations(
        &self,
        doc: &str,
        version: u32,
        current_hash: &str,
        ranges: &[(u32, u32)],
        full_text: &str,
    ) -> EngineResult<Vec<Confirmation>> {
        let stored = self.store.get(doc, version).await?;
        let version_hash = stored.map(|v| v.base_sha256).unwrap_or_default();
        let confirmations = self
            .confirmations
            .save(doc, version, &version_hash, current_hash, ranges, full_text, self.cfg.confirmation_context_chars)
            .await?;
        let _ = self.events.send(EngineEvent::ConfirmationsChanged { doc: doc.to_string(), version });
        Ok(confirmations)
    }

    /// `get_confirmations` of §4.8.
    pub async fn get_confirmations(&self, doc: &str, version: u32) -> Vec<Confirmation> {
        self.confirmations.get(doc, version).await
    }

    pub fn store(&self) -> &S {
        self.store.as_ref()
    }
}
