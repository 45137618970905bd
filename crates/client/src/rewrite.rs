//! Snapshot image discovery and rewrite.
//!
//! Snapshots expose images in one of two mutually exclusive representations:
//!
//! - **Signed-URL representation** (checked first): a non-empty `signed_urls`
//!   table. The mirrored URL replaces the table value.
//! - **Block representation** (only when `signed_urls` is empty): blocks
//!   tagged `type == "image"`. The source URL is synthesized from the site's
//!   image proxy, and the mirrored URL replaces both `format.display_source`
//!   and `properties.source`.
//!
//! All images in a batch are mirrored concurrently; snapshot fields are only
//! touched after the whole batch resolves, so no partially rewritten snapshot
//! is ever observed. One image's failure never aborts its siblings.

use crate::cloudinary::AssetHost;
use crate::mirror::AssetMirror;
use futures_util::future::join_all;
use pagemirror_core::Snapshot;
use pagemirror_core::snapshot::BlockProperties;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// encodeURIComponent-compatible escape set: everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Static cache-busting query parameter appended to synthesized image URLs.
const CACHE_BUST: &str = "cache=v2";

/// Per-image result of one rewrite batch.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    pub block_id: String,
    /// `None` means the mirror produced no usable URL and the image was left
    /// un-rewritten.
    pub mirrored_url: Option<String>,
}

/// One mirror job: (block ID, source URL, block version).
type MirrorJob = (String, String, u64);

/// Rewrites a snapshot's image references to mirrored URLs, in place.
#[derive(Debug, Clone)]
pub struct ImageRewriter<H: AssetHost> {
    mirror: AssetMirror<H>,
    site_base_url: String,
}

impl<H: AssetHost> ImageRewriter<H> {
    pub fn new(mirror: AssetMirror<H>, site_base_url: impl Into<String>) -> Self {
        Self { mirror, site_base_url: site_base_url.into() }
    }

    /// Mirror every image the snapshot references and rewrite its image
    /// fields in place. Returns the per-image outcomes.
    pub async fn rewrite_images(&self, snapshot: &mut Snapshot) -> Vec<ImageOutcome> {
        if !snapshot.signed_urls.is_empty() {
            self.rewrite_signed_urls(snapshot).await
        } else {
            self.rewrite_image_blocks(snapshot).await
        }
    }

    async fn rewrite_signed_urls(&self, snapshot: &mut Snapshot) -> Vec<ImageOutcome> {
        let jobs: Vec<MirrorJob> = snapshot
            .signed_urls
            .iter()
            .filter_map(|(block_id, url)| match snapshot.block_version(block_id) {
                Some(version) => Some((block_id.clone(), url.clone(), version)),
                None => {
                    tracing::warn!(%block_id, "signed URL has no matching block, skipping");
                    None
                }
            })
            .collect();

        tracing::debug!(count = jobs.len(), "mirroring signed-URL images");
        let outcomes = self.mirror_batch(jobs).await;

        for outcome in &outcomes {
            if let Some(url) = &outcome.mirrored_url {
                snapshot.signed_urls.insert(outcome.block_id.clone(), url.clone());
            }
        }

        outcomes
    }

    async fn rewrite_image_blocks(&self, snapshot: &mut Snapshot) -> Vec<ImageOutcome> {
        let jobs: Vec<MirrorJob> = snapshot
            .block
            .values()
            .filter(|envelope| envelope.value.is_image())
            .filter_map(|envelope| {
                let block = &envelope.value;
                let Some(display_source) = block.display_source() else {
                    tracing::warn!(block_id = %block.id, "image block has no display source, skipping");
                    return None;
                };
                let source_url =
                    self.proxy_image_url(display_source, block.parent_table.as_deref().unwrap_or("block"), &block.id);
                Some((block.id.clone(), source_url, block.version))
            })
            .collect();

        tracing::debug!(count = jobs.len(), "mirroring block-representation images");
        let outcomes = self.mirror_batch(jobs).await;

        for outcome in &outcomes {
            let Some(url) = &outcome.mirrored_url else {
                tracing::debug!(block_id = %outcome.block_id, "no mirrored URL, leaving image block untouched");
                continue;
            };
            let Some(envelope) = snapshot.block.get_mut(&outcome.block_id) else {
                tracing::warn!(block_id = %outcome.block_id, "image block missing at rewrite time, skipping");
                continue;
            };

            // The mirrored URL lands in both places renderers read it from.
            let block = &mut envelope.value;
            if let Some(format) = block.format.as_mut() {
                format.display_source = Some(url.clone());
            }
            let source = Some(vec![vec![url.clone()]]);
            match block.properties.as_mut() {
                Some(properties) => properties.source = source,
                None => block.properties = Some(BlockProperties { source, rest: serde_json::Map::new() }),
            }
        }

        outcomes
    }

    /// Fan out one mirror call per job and wait for the whole batch. Failures
    /// are isolated per image; the barrier is what keeps partially rewritten
    /// snapshots from ever being observed.
    async fn mirror_batch(&self, jobs: Vec<MirrorJob>) -> Vec<ImageOutcome> {
        let mirror = &self.mirror;
        join_all(jobs.into_iter().map(|(block_id, source_url, version)| async move {
            let asset = mirror.ensure_mirrored(&block_id, &source_url, &version.to_string()).await;
            ImageOutcome { block_id, mirrored_url: asset.and_then(|a| a.url) }
        }))
        .await
    }

    /// Synthesize the site's image proxy URL for a block-representation image.
    fn proxy_image_url(&self, display_source: &str, parent_table: &str, block_id: &str) -> String {
        format!(
            "{}/image/{}?table={parent_table}&id={block_id}&{CACHE_BUST}",
            self.site_base_url,
            utf8_percent_encode(display_source, COMPONENT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudinary::{CloudinaryError, MirroredAsset};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Asset host fake: every lookup misses, uploads succeed unless the
    /// identity is in `fail`, and every call is recorded.
    #[derive(Default)]
    struct ScriptedHost {
        fail: HashSet<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedHost {
        fn failing(identities: &[&str]) -> Self {
            Self { fail: identities.iter().map(|s| s.to_string()).collect(), ..Default::default() }
        }

        fn mirrored_identities(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
        }
    }

    #[async_trait]
    impl AssetHost for &ScriptedHost {
        async fn lookup(&self, _identity: &str) -> Result<Option<MirroredAsset>, CloudinaryError> {
            Ok(None)
        }

        async fn upload(
            &self, identity: &str, source_url: &str, _version: &str,
        ) -> Result<MirroredAsset, CloudinaryError> {
            self.calls
                .lock()
                .unwrap()
                .push((identity.to_string(), source_url.to_string()));
            if self.fail.contains(identity) {
                return Err(CloudinaryError::Timeout);
            }
            Ok(MirroredAsset {
                public_id: Some(identity.to_string()),
                url: Some(format!("http://cdn.example/demo/{identity}.png")),
                secure_url: None,
                context: None,
                error: None,
                rest: serde_json::Map::new(),
            })
        }
    }

    fn rewriter(host: &ScriptedHost) -> ImageRewriter<&ScriptedHost> {
        ImageRewriter::new(AssetMirror::new(host), "https://notes.example")
    }

    fn signed_snapshot() -> Snapshot {
        serde_json::from_str(
            r#"{
                "block": {
                    "img-1": { "value": { "id": "img-1", "type": "image", "version": 3 } },
                    "img-2": { "value": { "id": "img-2", "type": "image", "version": 7 } }
                },
                "signed_urls": {
                    "img-1": "https://origin.example/signed/a.png",
                    "img-2": "https://origin.example/signed/b.png"
                }
            }"#,
        )
        .unwrap()
    }

    fn block_snapshot() -> Snapshot {
        serde_json::from_str(
            r#"{
                "block": {
                    "img-1": {
                        "value": {
                            "id": "img-1",
                            "type": "image",
                            "version": 3,
                            "parent_table": "block",
                            "format": { "display_source": "https://files.example/raw image.png" },
                            "properties": { "source": [["https://files.example/raw image.png"]] }
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_signed_urls_rewritten() {
        let host = ScriptedHost::default();
        let mut snapshot = signed_snapshot();

        let outcomes = rewriter(&host).rewrite_images(&mut snapshot).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(snapshot.signed_urls["img-1"], "http://cdn.example/demo/img-1.png");
        assert_eq!(snapshot.signed_urls["img-2"], "http://cdn.example/demo/img-2.png");
    }

    #[tokio::test]
    async fn test_signed_urls_take_precedence_over_image_blocks() {
        let host = ScriptedHost::default();
        let mut snapshot: Snapshot = serde_json::from_str(
            r#"{
                "block": {
                    "img-1": { "value": { "id": "img-1", "type": "image", "version": 3 } },
                    "img-9": {
                        "value": {
                            "id": "img-9",
                            "type": "image",
                            "version": 5,
                            "format": { "display_source": "https://files.example/other.png" }
                        }
                    }
                },
                "signed_urls": { "img-1": "https://origin.example/signed/a.png" }
            }"#,
        )
        .unwrap();

        rewriter(&host).rewrite_images(&mut snapshot).await;

        // img-9 is never scanned while signed_urls is non-empty.
        assert_eq!(host.mirrored_identities(), vec!["img-1".to_string()]);
        assert_eq!(
            snapshot.block["img-9"].value.display_source(),
            Some("https://files.example/other.png")
        );
    }

    #[tokio::test]
    async fn test_block_representation_rewrites_both_fields() {
        let host = ScriptedHost::default();
        let mut snapshot = block_snapshot();

        rewriter(&host).rewrite_images(&mut snapshot).await;

        let block = &snapshot.block["img-1"].value;
        assert_eq!(block.display_source(), Some("http://cdn.example/demo/img-1.png"));
        assert_eq!(
            block.properties.as_ref().unwrap().source,
            Some(vec![vec!["http://cdn.example/demo/img-1.png".to_string()]])
        );
    }

    #[tokio::test]
    async fn test_block_representation_synthesizes_proxy_source() {
        let host = ScriptedHost::default();
        let mut snapshot = block_snapshot();

        rewriter(&host).rewrite_images(&mut snapshot).await;

        let calls = host.calls.lock().unwrap();
        assert_eq!(
            calls[0].1,
            "https://notes.example/image/https%3A%2F%2Ffiles.example%2Fraw%20image.png?table=block&id=img-1&cache=v2"
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_siblings() {
        let host = ScriptedHost::failing(&["img-1"]);
        let mut snapshot = signed_snapshot();

        let outcomes = rewriter(&host).rewrite_images(&mut snapshot).await;

        let failed = outcomes.iter().find(|o| o.block_id == "img-1").unwrap();
        assert!(failed.mirrored_url.is_none());

        // The failed image keeps its signed URL; the sibling is rewritten.
        assert_eq!(snapshot.signed_urls["img-1"], "https://origin.example/signed/a.png");
        assert_eq!(snapshot.signed_urls["img-2"], "http://cdn.example/demo/img-2.png");
    }

    #[tokio::test]
    async fn test_signed_url_without_block_is_skipped() {
        let host = ScriptedHost::default();
        let mut snapshot: Snapshot = serde_json::from_str(
            r#"{
                "block": {
                    "img-1": { "value": { "id": "img-1", "type": "image", "version": 3 } }
                },
                "signed_urls": {
                    "img-1": "https://origin.example/signed/a.png",
                    "ghost": "https://origin.example/signed/ghost.png"
                }
            }"#,
        )
        .unwrap();

        let outcomes = rewriter(&host).rewrite_images(&mut snapshot).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(snapshot.signed_urls["img-1"], "http://cdn.example/demo/img-1.png");
        assert_eq!(snapshot.signed_urls["ghost"], "https://origin.example/signed/ghost.png");
    }

    #[tokio::test]
    async fn test_image_block_without_display_source_is_skipped() {
        let host = ScriptedHost::default();
        let mut snapshot: Snapshot = serde_json::from_str(
            r#"{
                "block": {
                    "img-1": { "value": { "id": "img-1", "type": "image", "version": 3 } }
                }
            }"#,
        )
        .unwrap();

        let outcomes = rewriter(&host).rewrite_images(&mut snapshot).await;

        assert!(outcomes.is_empty());
        assert!(host.mirrored_identities().is_empty());
    }
}
