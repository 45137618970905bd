//! Notion API client error types.

use std::sync::Arc;

/// Errors from the Notion origin client.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    /// Page ID is not a UUID in any accepted form.
    #[error("invalid page id: {0}")]
    InvalidPageId(String),

    /// Configured API base URL does not parse.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// HTTP error response.
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

impl From<reqwest::Error> for NotionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { NotionError::Timeout } else { NotionError::Network(Arc::new(err)) }
    }
}
