//! Bounded retry combinator for transient store errors (§4.6, §9 redesign:
//! "ad-hoc retries → bounded retry combinator").

use std::future::Future;
use std::time::{Duration, Instant};

use tscript_core::EngineConfig;

use crate::errors::StoreError;

/// Retry `op` with exponential backoff while it returns a retriable error,
/// up to `cfg.store_max_attempts` attempts and `cfg.store_retry_budget`
/// total wall-clock time.
pub async fn with_retry<F, Fut, T>(cfg: &EngineConfig, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    let mut backoff = Duration::from_millis(10);

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable() && attempt < cfg.store_max_attempts => {
                let elapsed = start.elapsed();
                if elapsed >= cfg.store_retry_budget {
                    return Err(err);
                }
                tracing::warn!(attempt, %err, "transient store error, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(cfg.store_retry_budget.saturating_sub(elapsed));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let cfg = EngineConfig::default();
        let calls = AtomicU32::new(0);
        let result = with_retry(&cfg, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Transient("lock busy".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let mut cfg = EngineConfig::default();
        cfg.store_max_attempts = 3;
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = with_retry(&cfg, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Transient("still busy".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retriable_error_returns_immediately() {
        let cfg = EngineConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = with_retry(&cfg, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Internal("bad write".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
