//! Cloudinary asset-host client.
//!
//! Provides resource lookup and signed uploads against the Cloudinary upload
//! API, plus the `AssetHost` seam the mirror is written against.
//!
//! ### Specification
//!
//! - **Lookup**: `GET {base}/v1_1/{cloud_name}/resources/image/upload/{public_id}`
//!   with basic auth. A 404 / error-body response means "absent", not a failure.
//! - **Upload**: multipart `POST {base}/v1_1/{cloud_name}/image/upload` with the
//!   source URL as `file`, `overwrite=true`, a `context=version=<v>` tag, and a
//!   signature computed per [`sign`]. The signed parameter set and the posted
//!   form are built from the same list, so they cannot drift apart.

pub mod error;
pub mod sign;

pub use error::CloudinaryError;
pub use sign::{ParamValue, RESERVED_KEYS, SignatureAlgorithm, SigningParams, sign_request};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Default Cloudinary API base URL.
const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";

/// Cloudinary API version path segment.
const API_VERSION: &str = "v1_1";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "pagemirror/0.1";

/// Cloudinary client configuration.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    /// Cloud name (first path segment of every API call).
    pub cloud_name: String,
    /// API key.
    pub api_key: String,
    /// API secret, mixed into every upload signature.
    pub api_secret: String,
    /// Digest algorithm for upload signatures.
    pub algorithm: SignatureAlgorithm,
    /// Base URL (default: https://api.cloudinary.com).
    pub base_url: String,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string.
    pub user_agent: String,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            algorithm: SignatureAlgorithm::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// The record the asset host holds per asset identity.
///
/// Returned by both lookup and upload. Fields the mirroring pipeline never
/// reads are carried in `rest` so the record stays faithful to the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirroredAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,

    /// Delivery URL. Absent means "do not rewrite with this record".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AssetContext>,

    /// Error shape the host uses for "not found" and rejected uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl MirroredAsset {
    /// The caller-supplied version tag stored with the asset, if any.
    pub fn version_tag(&self) -> Option<&str> {
        self.context.as_ref()?.custom.get("version").map(String::as_str)
    }
}

/// Contextual metadata stored with an asset (`context=version=<v>` at upload).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetContext {
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

/// Error body returned by the asset host API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

/// Abstract asset-host contract the mirror is written against.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Query for an existing asset. `Ok(None)` means the host reported
    /// "not found" (an error shape on the wire, not a transport failure).
    async fn lookup(&self, identity: &str) -> Result<Option<MirroredAsset>, CloudinaryError>;

    /// Upload `source_url` as file content under `identity`, overwriting any
    /// existing asset and tagging it with `version`. A host-side rejection
    /// comes back as a record carrying `error` and no `url`.
    async fn upload(&self, identity: &str, source_url: &str, version: &str) -> Result<MirroredAsset, CloudinaryError>;
}

/// Cloudinary asset-host client.
#[derive(Debug, Clone)]
pub struct CloudinaryHost {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryHost {
    /// Create a new client with the given configuration.
    pub fn new(config: CloudinaryConfig) -> Result<Self, CloudinaryError> {
        for (field, value) in [
            ("cloud_name", &config.cloud_name),
            ("api_key", &config.api_key),
            ("api_secret", &config.api_secret),
        ] {
            if value.is_empty() {
                return Err(CloudinaryError::MissingCredentials(field.to_string()));
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()?;

        Ok(Self { http, config })
    }

    fn resource_url(&self, public_id: &str) -> String {
        format!(
            "{}/{API_VERSION}/{}/resources/image/upload/{public_id}",
            self.config.base_url, self.config.cloud_name
        )
    }

    fn upload_url(&self) -> String {
        format!("{}/{API_VERSION}/{}/image/upload", self.config.base_url, self.config.cloud_name)
    }

    /// Admin API calls authenticate with basic auth over key:secret.
    fn basic_auth(&self) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:{}", self.config.api_key, self.config.api_secret)))
    }

    fn parse_asset(bytes: &[u8]) -> Result<MirroredAsset, CloudinaryError> {
        serde_json::from_slice(bytes).map_err(|e| CloudinaryError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AssetHost for CloudinaryHost {
    async fn lookup(&self, identity: &str) -> Result<Option<MirroredAsset>, CloudinaryError> {
        let url = self.resource_url(identity);
        tracing::debug!(identity, "looking up mirrored asset");

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.basic_auth())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(CloudinaryError::from)?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(CloudinaryError::AuthError);
        }

        let bytes = response.bytes().await.map_err(CloudinaryError::from)?;
        let asset = Self::parse_asset(&bytes)?;

        if let Some(error) = &asset.error {
            tracing::debug!(identity, message = %error.message, "asset not found at host");
            return Ok(None);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(CloudinaryError::HttpError { status: status.as_u16() });
        }

        Ok(Some(asset))
    }

    async fn upload(&self, identity: &str, source_url: &str, version: &str) -> Result<MirroredAsset, CloudinaryError> {
        let url = self.upload_url();
        let timestamp = chrono::Utc::now().timestamp();

        // One parameter list feeds both the signature and the posted form.
        let mut params: SigningParams = vec![
            ("file".to_string(), source_url.into()),
            ("api_key".to_string(), self.config.api_key.clone().into()),
            ("timestamp".to_string(), timestamp.into()),
            ("public_id".to_string(), identity.into()),
            ("overwrite".to_string(), "true".into()),
            ("context".to_string(), format!("version={version}").into()),
        ];
        let signature = sign_request(&params, &self.config.api_secret, self.config.algorithm);
        params.push(("signature".to_string(), signature.into()));

        let mut form = multipart::Form::new();
        for (key, value) in &params {
            form = form.text(key.clone(), value.string_form());
        }

        tracing::debug!(identity, version, "uploading asset to host");

        let response = self.http.post(&url).multipart(form).send().await.map_err(CloudinaryError::from)?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(CloudinaryError::AuthError);
        }

        let bytes = response.bytes().await.map_err(CloudinaryError::from)?;
        let asset = Self::parse_asset(&bytes)?;

        if let Some(error) = &asset.error {
            // Host-side rejection: hand the record back and let the caller
            // treat "no url" as "skip rewriting".
            tracing::warn!(identity, message = %error.message, "asset host rejected upload");
        } else if status.is_client_error() || status.is_server_error() {
            return Err(CloudinaryError::HttpError { status: status.as_u16() });
        }

        Ok(asset)
    }
}
