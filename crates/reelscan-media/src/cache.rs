//! In-process memoization of analysis results.
//!
//! Results are keyed by media identity plus configuration fingerprint. A
//! per-key `OnceCell` guarantees at most one analysis runs for a key at a
//! time; concurrent callers wait for it and share the result. Failed
//! analyses leave the key empty so the next caller retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use reelscan_models::{AnalysisCacheKey, AnalysisResult};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::coordinator::AnalysisCoordinator;
use crate::error::MediaResult;
use crate::metrics;
use crate::providers::MediaSource;

type Slot = Arc<OnceCell<Arc<AnalysisResult>>>;

/// Memoization layer in front of [`AnalysisCoordinator::analyze`].
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<AnalysisCacheKey, Slot>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze `media` with `coordinator`, reusing a cached result when the
    /// media id and configuration match.
    pub async fn analyze(
        &self,
        media_id: &str,
        coordinator: &AnalysisCoordinator,
        media: &MediaSource,
    ) -> MediaResult<Arc<AnalysisResult>> {
        let key = AnalysisCacheKey::new(media_id, coordinator.config());
        self.get_or_analyze(key, || coordinator.analyze(media))
            .await
    }

    /// Return the cached result for `key`, or run `analyze` to produce it.
    pub async fn get_or_analyze<F, Fut>(
        &self,
        key: AnalysisCacheKey,
        analyze: F,
    ) -> MediaResult<Arc<AnalysisResult>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MediaResult<AnalysisResult>>,
    {
        let slot = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let hit = slot.initialized();
        metrics::record_cache_lookup(hit);
        debug!(%key, hit, "Analysis cache lookup");

        let outcome = slot
            .get_or_try_init(|| async { analyze().await.map(Arc::new) })
            .await
            .cloned();

        if outcome.is_err() {
            self.discard_if_empty(&key, &slot).await;
        }

        outcome
    }

    /// Cached result for `key`, if an analysis already completed.
    pub async fn get(&self, key: &AnalysisCacheKey) -> Option<Arc<AnalysisResult>> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Drop the entry for `key`. Returns whether a result was cached.
    pub async fn invalidate(&self, key: &AnalysisCacheKey) -> bool {
        let mut entries = self.entries.lock().await;
        entries.remove(key).is_some_and(|slot| slot.initialized())
    }

    /// Drop every entry for `media_id`, whatever its configuration.
    pub async fn invalidate_media(&self, media_id: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| key.media_id != media_id);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of completed results held.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn discard_if_empty(&self, key: &AnalysisCacheKey, slot: &Slot) {
        let mut entries = self.entries.lock().await;
        let stale = entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if stale {
            entries.remove(key);
        }
    }
}
