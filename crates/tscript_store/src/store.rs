//! Version Store (C6): interface and in-memory reference backend (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use tscript_core::{canonicalize, sha256_hex, EditRecord, TimingBlock, Version, VersionMeta, Word};

use crate::errors::{InsertOutcome, StoreError, StoreResult};

/// The per-document persistence interface used by the Save Coordinator,
/// Confirmation Manager, and Chain Verifier (§4.6).
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn latest(&self, doc: &str) -> StoreResult<Option<Version>>;
    async fn get(&self, doc: &str, version: u32) -> StoreResult<Option<Version>>;
    async fn words(
        &self,
        doc: &str,
        version: u32,
        segment: Option<usize>,
        count: Option<usize>,
    ) -> StoreResult<Vec<Word>>;
    async fn history(&self, doc: &str) -> StoreResult<Vec<VersionMeta>>;
    async fn edits(&self, doc: &str) -> StoreResult<Vec<EditRecord>>;

    /// Append a new version, enforcing the compare-and-swap conflict check
    /// against `parent_version`/`expected_base_sha256` (§4.6 contract).
    #[allow(clippy::too_many_arguments)]
    async fn insert(
        &self,
        doc: &str,
        parent_version: Option<u32>,
        expected_base_sha256: Option<String>,
        text: String,
        words: Vec<Word>,
        timing_ops: Option<Vec<TimingBlock>>,
        created_by: String,
        created_at: String,
    ) -> StoreResult<InsertOutcome>;
}

/// Group a version's words into newline-delimited segments, keeping the
/// trailing `"\n"` with the segment it closes (glossary: Segment).
fn split_segments(words: &[Word]) -> Vec<Vec<Word>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for w in words {
        let is_newline = w.is_newline();
        current.push(w.clone());
        if is_newline {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[derive(Default)]
struct DocState {
    versions: Vec<Version>,
    edits: Vec<EditRecord>,
}

/// Reference backend: an in-process, per-document-locked store. Suitable
/// for tests and for embedding the engine without a durable object store.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Arc<Mutex<DocState>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn doc_lock(&self, doc: &str) -> Arc<Mutex<DocState>> {
        if let Some(lock) = self.docs.read().await.get(doc) {
            return lock.clone();
        }
        let mut guard = self.docs.write().await;
        guard.entry(doc.to_string()).or_default().clone()
    }
}

#[async_trait]
impl VersionStore for InMemoryStore {
    async fn latest(&self, doc: &str) -> StoreResult<Option<Version>> {
        let lock = self.doc_lock(doc).await;
        let state = lock.lock().await;
        Ok(state.versions.last().cloned())
    }

    async fn get(&self, doc: &str, version: u32) -> StoreResult<Option<Version>> {
        let lock = self.doc_lock(doc).await;
        let state = lock.lock().await;
        Ok(state.versions.iter().find(|v| v.version == version).cloned())
    }

    async fn words(
        &self,
        doc: &str,
        version: u32,
        segment: Option<usize>,
        count: Option<usize>,
    ) -> StoreResult<Vec<Word>> {
        let Some(v) = self.get(doc, version).await? else {
            return Ok(Vec::new());
        };
        let Some(start_segment) = segment else {
            return Ok(v.words);
        };
        let segments = split_segments(&v.words);
        let take = count.unwrap_or(1);
        Ok(segments.into_iter().skip(start_segment).take(take).flatten().collect())
    }

    async fn history(&self, doc: &str) -> StoreResult<Vec<VersionMeta>> {
        let lock = self.doc_lock(doc).await;
        let state = lock.lock().await;
        Ok(state.versions.iter().map(VersionMeta::from).collect())
    }

    async fn edits(&self, doc: &str) -> StoreResult<Vec<EditRecord>> {
        let lock = self.doc_lock(doc).await;
        let mut state = lock.lock().await;
        state.edits.sort_by_key(|e| e.child_version);
        Ok(state.edits.clone())
    }

    async fn insert(
        &self,
        doc: &str,
        parent_version: Option<u32>,
        expected_base_sha256: Option<String>,
        text: String,
        words: Vec<Word>,
        timing_ops: Option<Vec<TimingBlock>>,
        created_by: String,
        created_at: String,
    ) -> StoreResult<InsertOutcome> {
        let lock = self.doc_lock(doc).await;
        let mut state = lock.lock().await;

        let latest = state.versions.last().cloned();
        if let Some(parent) = parent_version {
            let version_mismatch = latest.as_ref().map(|v| v.version) != Some(parent);
            let hash_mismatch = match (&expected_base_sha256, &latest) {
                (Some(expected), Some(latest)) => expected != &latest.base_sha256,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if version_mismatch || hash_mismatch {
                return Ok(InsertOutcome::Conflict { latest: latest.as_ref().map(VersionMeta::from) });
            }
        }

        let canonical_text = canonicalize(&text);
        let base_sha256 = sha256_hex(canonical_text.as_bytes());
        let child = latest.as_ref().map(|v| v.version).unwrap_or(0) + 1;

        let version = Version {
            version: child,
            text: canonical_text,
            base_sha256: base_sha256.clone(),
            words,
            created_by,
            created_at,
        };
        version
            .check_invariants(&tscript_core::EngineConfig::default())
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let text_ops = tscript_diff::diff(
            latest.as_ref().map(|v| v.text.as_str()).unwrap_or(""),
            &version.text,
            &tscript_core::EngineConfig::default(),
        );
        let edit = EditRecord { parent_version: child.saturating_sub(1), child_version: child, text_ops, timing_ops };

        state.versions.push(version);
        state.edits.push(edit);

        Ok(InsertOutcome::Inserted { version: child, base_sha256 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscript_core::Word;

    fn words(text: &str) -> Vec<Word> {
        vec![Word::new(text)]
    }

    #[tokio::test]
    async fn first_insert_has_no_parent_requirement() {
        let store = InMemoryStore::new();
        let outcome = store
            .insert("doc1", None, None, "hello".into(), words("hello"), None, "alice".into(), "t0".into())
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted { version: 1, base_sha256: tscript_core::sha256_of_canonical("hello") });
    }

    #[tokio::test]
    async fn version_numbers_are_sequential() {
        let store = InMemoryStore::new();
        store.insert("doc1", None, None, "a".into(), words("a"), None, "alice".into(), "t0".into()).await.unwrap();
        let outcome = store
            .insert("doc1", Some(1), Some(tscript_core::sha256_of_canonical("a")), "ab".into(), words("ab"), None, "alice".into(), "t1".into())
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted { version: 2, base_sha256: tscript_core::sha256_of_canonical("ab") });
    }

    #[tokio::test]
    async fn stale_parent_is_rejected_with_conflict() {
        let store = InMemoryStore::new();
        store.insert("doc1", None, None, "a".into(), words("a"), None, "alice".into(), "t0".into()).await.unwrap();
        store
            .insert("doc1", Some(1), Some(tscript_core::sha256_of_canonical("a")), "ab".into(), words("ab"), None, "alice".into(), "t1".into())
            .await
            .unwrap();

        let outcome = store
            .insert("doc1", Some(1), Some(tscript_core::sha256_of_canonical("a")), "ac".into(), words("ac"), None, "bob".into(), "t2".into())
            .await
            .unwrap();
        match outcome {
            InsertOutcome::Conflict { latest: Some(meta) } => assert_eq!(meta.version, 2),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn history_orders_ascending() {
        let store = InMemoryStore::new();
        store.insert("doc1", None, None, "a".into(), words("a"), None, "alice".into(), "t0".into()).await.unwrap();
        store
            .insert("doc1", Some(1), Some(tscript_core::sha256_of_canonical("a")), "ab".into(), words("ab"), None, "alice".into(), "t1".into())
            .await
            .unwrap();
        let history = store.history("doc1").await.unwrap();
        assert_eq!(history.iter().map(|m| m.version).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn concurrent_inserts_against_same_parent_exactly_one_succeeds() {
        let store = Arc::new(InMemoryStore::new());
        store.insert("doc1", None, None, "base".into(), words("base"), None, "alice".into(), "t0".into()).await.unwrap();
        let base_hash = tscript_core::sha256_of_canonical("base");

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let base_hash = base_hash.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(
                        "doc1",
                        Some(1),
                        Some(base_hash),
                        format!("base-{i}"),
                        words(&format!("base-{i}")),
                        None,
                        "writer".into(),
                        "t".into(),
                    )
                    .await
                    .unwrap()
            }));
        }
        let mut results = Vec::with_capacity(handles.len());
        for h in handles {
            results.push(h.await.unwrap());
        }
        let successes = results.iter().filter(|o| matches!(o, InsertOutcome::Inserted { .. })).count();
        assert_eq!(successes, 1);
        let history = store.history("doc1").await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
