//! Client code for pagemirror.
//!
//! This crate provides the Notion origin client, the Cloudinary asset-host
//! client with upload request signing, and the mirror/rewrite/reconcile
//! pipeline shared by the server and CLI.

pub mod cloudinary;
pub mod mirror;
pub mod notion;
pub mod reconcile;
pub mod rewrite;

pub use cloudinary::{
    AssetHost, CloudinaryConfig, CloudinaryError, CloudinaryHost, MirroredAsset, SignatureAlgorithm, sign_request,
};
pub use mirror::AssetMirror;
pub use notion::{ContentOrigin, NotionClient, NotionConfig, NotionError};
pub use reconcile::PageCacheReconciler;
pub use rewrite::{ImageOutcome, ImageRewriter};
