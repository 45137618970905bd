//! Unified error types for pagemirror.
//!
//! Failures that affect a whole page (origin fetch, final cache persist)
//! surface through this enum; per-image mirroring failures are absorbed
//! inside the rewrite path and never reach it.

use tokio_rusqlite::rusqlite;

/// Unified error types for the pagemirror service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Content origin fetch or parse failed.
    #[error("ORIGIN_UNAVAILABLE: {0}")]
    OriginUnavailable(String),

    /// Signer configured with an unrecognized digest algorithm.
    #[error("UNSUPPORTED_ALGORITHM: signature algorithm {0} is not supported (supported: SHA-1, SHA-256)")]
    UnsupportedAlgorithm(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Cache store unreachable or failed outside a database call. Used by
    /// non-SQLite `CacheStore` implementations.
    #[error("CACHE_ERROR: {0}")]
    CacheUnavailable(String),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A record map could not be serialized or deserialized.
    #[error("SNAPSHOT_PARSE: {0}")]
    SnapshotParse(String),

    /// Page ID is empty or not a UUID in any accepted form.
    #[error("INVALID_PAGE_ID: {0}")]
    InvalidPageId(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SnapshotParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::OriginUnavailable("connection refused".to_string());
        assert!(err.to_string().contains("ORIGIN_UNAVAILABLE"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_unsupported_algorithm_names_supported_set() {
        let err = Error::UnsupportedAlgorithm("MD5".to_string());
        assert!(err.to_string().contains("MD5"));
        assert!(err.to_string().contains("SHA-256"));
    }

    #[test]
    fn test_serde_error_maps_to_snapshot_parse() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: Error = bad.unwrap_err().into();
        assert!(matches!(err, Error::SnapshotParse(_)));
    }
}
