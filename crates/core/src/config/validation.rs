//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// Credentials are deliberately not checked here; they are resolved at
    /// startup via `require_cloudinary`, and the signature algorithm string is
    /// parsed when the asset-host client is built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `notion_api_base` or `site_base_url` is empty or has a trailing slash
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !matches!(self.signature_algorithm.as_str(), "SHA-1" | "SHA-256") {
            tracing::warn!(
                algorithm = %self.signature_algorithm,
                "unrecognized signature algorithm; the asset-host client will reject it at startup"
            );
        }

        for (field, value) in [("notion_api_base", &self.notion_api_base), ("site_base_url", &self.site_base_url)] {
            if value.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
            if value.ends_with('/') {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not have a trailing slash".into(),
                });
            }
        }

        Ok(())
    }
}
