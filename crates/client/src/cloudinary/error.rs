//! Asset-host client error types.
//!
//! These never escalate past a single image: the mirror absorbs them and the
//! affected image is simply left un-rewritten.

use std::sync::Arc;

/// Errors from the Cloudinary asset-host client.
#[derive(Debug, thiserror::Error)]
pub enum CloudinaryError {
    /// Cloud name, API key, or API secret missing.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Authentication failed (invalid key/secret pair).
    #[error("authentication failed: invalid API credentials")]
    AuthError,

    /// HTTP error response without a parseable error body.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CloudinaryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { CloudinaryError::Timeout } else { CloudinaryError::Network(Arc::new(err)) }
    }
}
