//! Idempotent asset mirroring.
//!
//! `ensure_mirrored` is the only entry point: look the identity up at the
//! asset host, reuse the stored record when its version tag matches, and
//! upload (with overwrite) otherwise. Calling it twice with the same
//! (identity, version) performs at most one upload.

use crate::cloudinary::{AssetHost, MirroredAsset};

/// Mirrors assets to the host, keyed by identity + version tag.
#[derive(Debug, Clone)]
pub struct AssetMirror<H: AssetHost> {
    host: H,
}

impl<H: AssetHost> AssetMirror<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// Make sure the asset at `identity` is mirrored at `version`.
    ///
    /// Returns `None` when the upload failed at the transport level; returns
    /// a record without a `url` when the host rejected it. Callers must treat
    /// both as "skip rewriting", never as a fatal error. A failed lookup is
    /// treated as "absent" and falls through to the upload.
    pub async fn ensure_mirrored(&self, identity: &str, source_url: &str, version: &str) -> Option<MirroredAsset> {
        let existing = match self.host.lookup(identity).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(identity, error = %e, "asset lookup failed, treating as absent");
                None
            }
        };

        if let Some(asset) = existing {
            // Version tags are compared as strings; the host stores whatever
            // the uploader put in `context=version=<v>`.
            if asset.version_tag() == Some(version) {
                tracing::debug!(identity, version, "version tags match, reusing mirrored asset");
                return Some(asset);
            }
            tracing::debug!(
                identity,
                version,
                stored = asset.version_tag().unwrap_or("<none>"),
                "version tag mismatch, re-uploading"
            );
        }

        match self.host.upload(identity, source_url, version).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                tracing::warn!(identity, error = %e, "asset upload failed, image will not be rewritten");
                None
            }
        }
    }
}
