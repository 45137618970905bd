//! pagemirror server entry point.
//!
//! Boots the HTTP server: loads configuration, opens the page cache
//! database, wires the Notion and Cloudinary clients into the reconciler,
//! and serves the cache routes. Logging goes to stderr as JSON.

use anyhow::Result;
use pagemirror_client::{
    AssetMirror, CloudinaryConfig, CloudinaryHost, ImageRewriter, NotionClient, NotionConfig, PageCacheReconciler,
    SignatureAlgorithm,
};
use pagemirror_core::{AppConfig, CacheDb};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        listen_addr = %config.listen_addr,
        "starting pagemirror server"
    );

    // Credentials and the signature algorithm are resolved up front so a
    // misconfigured server fails at boot, not on the first upload.
    let keys = config.require_cloudinary()?;
    let algorithm = SignatureAlgorithm::parse(&config.signature_algorithm)?;

    let host = CloudinaryHost::new(CloudinaryConfig {
        cloud_name: keys.cloud_name.to_string(),
        api_key: keys.api_key.to_string(),
        api_secret: keys.api_secret.to_string(),
        algorithm,
        timeout: config.timeout(),
        user_agent: config.user_agent.clone(),
        ..Default::default()
    })?;

    let notion = NotionClient::new(NotionConfig {
        api_base: config.notion_api_base.clone(),
        token: config.notion_token.clone(),
        timeout: config.timeout(),
        user_agent: config.user_agent.clone(),
    })?;

    let db = CacheDb::open(&config.db_path).await?;

    let rewriter = ImageRewriter::new(AssetMirror::new(host), config.site_base_url.clone());
    let reconciler = PageCacheReconciler::new(notion, db, rewriter);

    let app = routes::router(Arc::new(reconciler));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
