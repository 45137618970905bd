//! HTTP error mapping for the pagemirror server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pagemirror_core::Error;
use serde_json::json;

/// Wrapper mapping core errors onto HTTP responses.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidPageId(_) => StatusCode::BAD_REQUEST,
            Error::OriginUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::UnsupportedAlgorithm(_)
            | Error::Database(_)
            | Error::CacheUnavailable(_)
            | Error::MigrationFailed(_)
            | Error::SnapshotParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.0.to_string();
        tracing::warn!(status = status.as_u16(), %message, "request failed");

        (status, Json(json!({ "error": message }))).into_response()
    }
}
