//! Command-line driver for the page cache.
//!
//! Exposes the reconciler's two operations for scripting and smoke tests:
//! `get` serves from the cache (populating on a miss), `put` forces a
//! refresh-and-mirror-and-store. The record map is printed to stdout as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pagemirror_client::{
    AssetMirror, CloudinaryConfig, CloudinaryHost, ImageRewriter, NotionClient, NotionConfig, PageCacheReconciler,
    SignatureAlgorithm,
};
use pagemirror_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagemirror-cli", version, about = "Mirror Notion pages into the local cache")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Serve a page from the cache, populating it on a miss
    Get {
        /// Page ID, dashed or bare UUID form
        page_id: String,
        /// Pretty-print the record map
        #[arg(long)]
        pretty: bool,
    },
    /// Force refresh-and-mirror-and-store for a page
    Put {
        /// Page ID, dashed or bare UUID form
        page_id: String,
        /// Pretty-print the record map
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

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

    let (snapshot, pretty) = match cli.cmd {
        Cmd::Get { page_id, pretty } => (reconciler.get(&page_id).await?, pretty),
        Cmd::Put { page_id, pretty } => (reconciler.put(&page_id).await?, pretty),
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{rendered}");

    Ok(())
}
