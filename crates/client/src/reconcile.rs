//! Page cache reconciliation.
//!
//! `PageCacheReconciler` is the top of the pipeline: it fetches fresh
//! snapshots from the content origin, drives image mirroring, and owns the
//! cached entry lifecycle. The rewriter and mirror below it never touch the
//! cache store.
//!
//! Failure semantics: an origin fetch failure and a final persist failure are
//! fatal to the call; a cache read failure degrades to "absent"; per-image
//! mirror failures are absorbed inside the rewriter.

use crate::cloudinary::AssetHost;
use crate::notion::ContentOrigin;
use crate::rewrite::ImageRewriter;
use pagemirror_core::{CacheStore, Error, Snapshot};

/// Read-through page cache with refresh-and-mirror semantics.
pub struct PageCacheReconciler<O, S, H>
where
    O: ContentOrigin,
    S: CacheStore,
    H: AssetHost,
{
    origin: O,
    store: S,
    rewriter: ImageRewriter<H>,
}

impl<O, S, H> PageCacheReconciler<O, S, H>
where
    O: ContentOrigin,
    S: CacheStore,
    H: AssetHost,
{
    pub fn new(origin: O, store: S, rewriter: ImageRewriter<H>) -> Self {
        Self { origin, store, rewriter }
    }

    /// Serve a page from the cache, populating it on a miss.
    ///
    /// A cached page is returned as stored: no refetch, no re-mirroring.
    pub async fn get(&self, page_id: &str) -> Result<Snapshot, Error> {
        if let Some(snapshot) = self.load_cached(page_id).await {
            tracing::info!(page_id, "serving page from cache");
            return Ok(snapshot);
        }

        tracing::info!(page_id, "page not cached, populating");
        self.put(page_id).await
    }

    /// Fetch a fresh snapshot, mirror its images, store it, and return it.
    ///
    /// The first-block version comparison against any cached copy is logged
    /// but does not short-circuit: the fresh snapshot is always re-mirrored
    /// and re-stored, so mirroring re-runs idempotently even for unchanged
    /// pages.
    pub async fn put(&self, page_id: &str) -> Result<Snapshot, Error> {
        let mut fresh = self.origin.fetch_snapshot(page_id).await?;

        if let Some(cached) = self.load_cached(page_id).await {
            let cached_version = cached.first_block_version();
            let fresh_version = fresh.first_block_version();
            tracing::info!(
                page_id,
                cached_version,
                fresh_version,
                versions_match = cached_version == fresh_version,
                "compared cached snapshot against fresh fetch"
            );
        }

        let outcomes = self.rewriter.rewrite_images(&mut fresh).await;
        let mirrored = outcomes.iter().filter(|o| o.mirrored_url.is_some()).count();
        tracing::info!(page_id, images = outcomes.len(), mirrored, "image mirroring complete");

        let serialized = serde_json::to_string(&fresh)?;
        self.store.put(page_id, &serialized).await?;
        tracing::debug!(page_id, bytes = serialized.len(), "stored rewritten snapshot");

        Ok(fresh)
    }

    /// Cache reads degrade to "absent": a store failure or an entry that no
    /// longer parses must never block a refresh.
    async fn load_cached(&self, page_id: &str) -> Option<Snapshot> {
        let value = match self.store.get(page_id).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(page_id, error = %e, "cache read failed, treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(page_id, error = %e, "cached entry failed to parse, treating as absent");
                None
            }
        }
    }
}
