//! Confirmation Manager (C8): anchor reviewer ranges to a specific
//! `(version, hash, prefix/exact/suffix)` (§4.8).

use std::collections::HashMap;

use tokio::sync::Mutex;
use tscript_core::Confirmation;

use crate::errors::{EngineError, EngineResult};

fn build_confirmations(
    text: &str,
    base_sha256: &str,
    ranges: &[(u32, u32)],
    context_chars: usize,
) -> Vec<Confirmation> {
    let chars: Vec<char> = text.chars().collect();
    ranges
        .iter()
        .map(|&(s, e)| {
            let s = s as usize;
            let e = e as usize;
            let prefix_start = s.saturating_sub(context_chars);
            let suffix_end = (e + context_chars).min(chars.len());
            Confirmation {
                start_offset: s as u32,
                end_offset: e as u32,
                prefix: chars[prefix_start..s].iter().collect(),
                exact: chars[s..e].iter().collect(),
                suffix: chars[e..suffix_end].iter().collect(),
                base_sha256: base_sha256.to_string(),
            }
        })
        .collect()
}

/// Holds the current confirmation set per `(doc, version)`. Confirmations
/// are replaced en bloc on each save (§3 Lifecycle).
#[derive(Default)]
pub struct ConfirmationManager {
    table: Mutex<HashMap<(String, u32), Vec<Confirmation>>>,
}

impl ConfirmationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `save_confirmations` of §4.8. `current_hash` is the hash the caller
    /// asserts the current version has; it must equal `version_hash` or the
    /// client must save first (§4.8 step 3).
    pub async fn save(
        &self,
        doc: &str,
        version: u32,
        version_hash: &str,
        current_hash: &str,
        ranges: &[(u32, u32)],
        full_text: &str,
        context_chars: usize,
    ) -> EngineResult<Vec<Confirmation>> {
        if current_hash != version_hash {
            return Err(EngineError::HashMismatch);
        }
        let confirmations = build_confirmations(full_text, version_hash, ranges, context_chars);
        let mut table = self.table.lock().await;
        table.insert((doc.to_string(), version), confirmations.clone());
        Ok(confirmations)
    }

    /// `get_confirmations` of §4.8.
    pub async fn get(&self, doc: &str, version: u32) -> Vec<Confirmation> {
        let table = self.table.lock().await;
        table.get(&(doc.to_string(), version)).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_prefix_exact_suffix() {
        let mgr = ConfirmationManager::new();
        let text = "the quick brown fox jumps";
        let confs = mgr.save("doc1", 1, "hash1", "hash1", &[(4, 9)], text, 3).await.unwrap();
        assert_eq!(confs.len(), 1);
        assert_eq!(confs[0].exact, "quick");
        assert_eq!(confs[0].prefix, "he ");
        assert_eq!(confs[0].suffix, " br");
    }

    #[tokio::test]
    async fn rejects_stale_hash() {
        let mgr = ConfirmationManager::new();
        let err = mgr.save("doc1", 1, "hash1", "stale", &[(0, 3)], "abcdef", 3).await;
        assert!(matches!(err, Err(EngineError::HashMismatch)));
    }

    #[tokio::test]
    async fn replaces_confirmations_en_bloc() {
        let mgr = ConfirmationManager::new();
        mgr.save("doc1", 1, "hash1", "hash1", &[(0, 1)], "abcdef", 2).await.unwrap();
        mgr.save("doc1", 1, "hash1", "hash1", &[(2, 3)], "abcdef", 2).await.unwrap();
        let confs = mgr.get("doc1", 1).await;
        assert_eq!(confs.len(), 1);
        assert_eq!(confs[0].exact, "c");
    }
}
