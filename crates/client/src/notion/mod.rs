//! Notion content-origin client.
//!
//! Fetches page record maps through the unofficial v3 API:
//!
//! - `POST /api/v3/loadPageChunk` returns the record map for a page.
//! - `POST /api/v3/getSignedFileUrls` resolves short-lived signed URLs for
//!   Notion-hosted image attachments; the result is attached to the snapshot
//!   as its `signed_urls` table. Resolution failure is tolerated (the
//!   block-representation fallback still works without it).
//!
//! Page IDs are accepted with or without dashes and normalized to the dashed
//! UUID form the API expects.

pub mod error;

pub use error::NotionError;

use async_trait::async_trait;
use pagemirror_core::{Error, Snapshot};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Default Notion API base URL.
const DEFAULT_API_BASE: &str = "https://www.notion.so";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "pagemirror/0.1";

/// Block chunk size per loadPageChunk call.
const CHUNK_LIMIT: u32 = 100;

/// Hosts whose attachment URLs need signing before they can be fetched.
const ATTACHMENT_HOSTS: [&str; 2] = ["secure.notion-static.com", "prod-files-secure"];

/// Notion client configuration.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// API base URL (default: https://www.notion.so).
    pub api_base: String,
    /// `token_v2` cookie for private pages. Optional.
    pub token: Option<String>,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Abstract content-origin contract the reconciler is written against.
#[async_trait]
pub trait ContentOrigin: Send + Sync {
    /// Fetch a fresh snapshot for a page.
    async fn fetch_snapshot(&self, page_id: &str) -> Result<Snapshot, Error>;
}

/// Notion origin client.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
}

#[derive(Debug, Deserialize)]
struct LoadPageChunkResponse {
    #[serde(rename = "recordMap")]
    record_map: Snapshot,
}

#[derive(Debug, Deserialize)]
struct SignedFileUrlsResponse {
    #[serde(rename = "signedUrls", default)]
    signed_urls: Vec<String>,
}

impl NotionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: NotionConfig) -> Result<Self, NotionError> {
        url::Url::parse(&config.api_base).map_err(|e| NotionError::InvalidBaseUrl(format!("{}: {e}", config.api_base)))?;

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, config })
    }

    /// Fetch the record map for a page and resolve signed URLs for its
    /// Notion-hosted image attachments.
    pub async fn fetch_page(&self, page_id: &str) -> Result<Snapshot, NotionError> {
        let page_id = normalize_page_id(page_id)?;

        tracing::debug!(%page_id, "loading page chunk from origin");
        let mut snapshot = self.load_page_chunk(&page_id).await?;
        self.attach_signed_urls(&mut snapshot).await;

        Ok(snapshot)
    }

    async fn load_page_chunk(&self, page_id: &str) -> Result<Snapshot, NotionError> {
        let response = self
            .api_post("loadPageChunk", load_page_chunk_body(page_id))
            .await?;
        let chunk: LoadPageChunkResponse = serde_json::from_slice(&response).map_err(|e| NotionError::Parse(e.to_string()))?;
        Ok(chunk.record_map)
    }

    /// Resolve signed URLs for Notion-hosted image attachments and attach
    /// them as the snapshot's `signed_urls` table. Failures are tolerated:
    /// the table is simply left empty.
    async fn attach_signed_urls(&self, snapshot: &mut Snapshot) {
        let attachments: Vec<(String, String)> = snapshot
            .block
            .values()
            .filter(|envelope| envelope.value.is_image())
            .filter_map(|envelope| {
                let block = &envelope.value;
                let source = block.source_url().or_else(|| block.display_source())?;
                is_notion_hosted(source).then(|| (block.id.clone(), source.to_string()))
            })
            .collect();

        if attachments.is_empty() {
            return;
        }

        let urls: Vec<serde_json::Value> = attachments
            .iter()
            .map(|(id, url)| json!({ "url": url, "permissionRecord": { "table": "block", "id": id } }))
            .collect();

        let signed = async {
            let response = self.api_post("getSignedFileUrls", json!({ "urls": urls })).await?;
            serde_json::from_slice::<SignedFileUrlsResponse>(&response).map_err(|e| NotionError::Parse(e.to_string()))
        }
        .await;

        match signed {
            Ok(response) => {
                for ((block_id, _), signed_url) in attachments.into_iter().zip(response.signed_urls) {
                    snapshot.signed_urls.insert(block_id, signed_url);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "signed URL resolution failed, leaving signed_urls empty");
            }
        }
    }

    async fn api_post(&self, endpoint: &str, body: serde_json::Value) -> Result<Vec<u8>, NotionError> {
        let url = format!("{}/api/v3/{endpoint}", self.config.api_base);

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.header(reqwest::header::COOKIE, format!("token_v2={token}"));
        }

        let response = request.send().await.map_err(NotionError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotionError::HttpError { status: status.as_u16() });
        }

        Ok(response.bytes().await.map_err(NotionError::from)?.to_vec())
    }
}

/// Request body for a loadPageChunk call.
fn load_page_chunk_body(page_id: &str) -> serde_json::Value {
    json!({
        "pageId": page_id,
        "limit": CHUNK_LIMIT,
        "chunkNumber": 0,
        "cursor": { "stack": [] },
        "verticalColumns": false,
    })
}

/// Whether an attachment URL is Notion-hosted and therefore needs signing.
fn is_notion_hosted(url: &str) -> bool {
    url.starts_with("attachment:") || ATTACHMENT_HOSTS.iter().any(|host| url.contains(host))
}

/// Normalize a page ID to dashed UUID form (8-4-4-4-12).
///
/// Accepts both `8b943a5d8a654e37afadd0f61f06036c` and the dashed form.
pub fn normalize_page_id(raw: &str) -> Result<String, NotionError> {
    let bare: String = raw.chars().filter(|c| *c != '-').collect();
    if bare.len() != 32 || !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(NotionError::InvalidPageId(raw.to_string()));
    }

    let bare = bare.to_ascii_lowercase();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &bare[0..8],
        &bare[8..12],
        &bare[12..16],
        &bare[16..20],
        &bare[20..32]
    ))
}

#[async_trait]
impl ContentOrigin for NotionClient {
    async fn fetch_snapshot(&self, page_id: &str) -> Result<Snapshot, Error> {
        self.fetch_page(page_id).await.map_err(|e| match e {
            NotionError::InvalidPageId(raw) => Error::InvalidPageId(raw),
            other => Error::OriginUnavailable(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_page_id() {
        let id = normalize_page_id("8b943a5d8a654e37afadd0f61f06036c").unwrap();
        assert_eq!(id, "8b943a5d-8a65-4e37-afad-d0f61f06036c");
    }

    #[test]
    fn test_normalize_dashed_page_id() {
        let id = normalize_page_id("8B943A5D-8A65-4E37-AFAD-D0F61F06036C").unwrap();
        assert_eq!(id, "8b943a5d-8a65-4e37-afad-d0f61f06036c");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(normalize_page_id("not-a-uuid"), Err(NotionError::InvalidPageId(_))));
        assert!(matches!(normalize_page_id(""), Err(NotionError::InvalidPageId(_))));
    }

    #[test]
    fn test_is_notion_hosted() {
        assert!(is_notion_hosted(
            "https://s3.us-west-2.amazonaws.com/secure.notion-static.com/abc/cover.png"
        ));
        assert!(is_notion_hosted("attachment:1234:cover.png"));
        assert!(!is_notion_hosted("https://images.example.com/cover.png"));
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let result = NotionClient::new(NotionConfig { api_base: "not a url".into(), ..Default::default() });
        assert!(matches!(result, Err(NotionError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_load_page_chunk_body_shape() {
        let body = load_page_chunk_body("8b943a5d-8a65-4e37-afad-d0f61f06036c");
        assert_eq!(body["pageId"], "8b943a5d-8a65-4e37-afad-d0f61f06036c");
        assert_eq!(body["limit"], 100);
        assert_eq!(body["chunkNumber"], 0);
        assert_eq!(body["cursor"]["stack"], json!([]));
        assert_eq!(body["verticalColumns"], false);
    }
}
