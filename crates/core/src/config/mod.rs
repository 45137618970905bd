//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGEMIRROR_*)
//! 2. TOML config file (if PAGEMIRROR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Asset-host credentials, resolved together at startup.
#[derive(Debug, Clone, Copy)]
pub struct CloudinaryKeys<'a> {
    pub cloud_name: &'a str,
    pub api_key: &'a str,
    pub api_secret: &'a str,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAGEMIRROR_*)
/// 2. TOML config file (if PAGEMIRROR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Notion API base URL.
    ///
    /// Set via PAGEMIRROR_NOTION_API_BASE environment variable.
    #[serde(default = "default_notion_api_base")]
    pub notion_api_base: String,

    /// Public Notion site base URL, used to synthesize image proxy URLs for
    /// block-representation images.
    ///
    /// Set via PAGEMIRROR_SITE_BASE_URL environment variable.
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,

    /// Notion `token_v2` cookie for private pages.
    ///
    /// Set via PAGEMIRROR_NOTION_TOKEN environment variable. Optional;
    /// public pages need no auth.
    #[serde(default)]
    pub notion_token: Option<String>,

    /// Cloudinary cloud name.
    ///
    /// Set via PAGEMIRROR_CLOUDINARY_CLOUD_NAME environment variable.
    #[serde(default)]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary API key.
    ///
    /// Set via PAGEMIRROR_CLOUDINARY_API_KEY environment variable.
    #[serde(default)]
    pub cloudinary_api_key: Option<String>,

    /// Cloudinary API secret.
    ///
    /// Set via PAGEMIRROR_CLOUDINARY_API_SECRET environment variable.
    #[serde(default)]
    pub cloudinary_api_secret: Option<String>,

    /// Digest algorithm for upload request signatures ("SHA-1" or "SHA-256").
    ///
    /// Set via PAGEMIRROR_SIGNATURE_ALGORITHM environment variable.
    #[serde(default = "default_signature_algorithm")]
    pub signature_algorithm: String,

    /// Path to SQLite page cache database.
    ///
    /// Set via PAGEMIRROR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PAGEMIRROR_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PAGEMIRROR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Server listen address.
    ///
    /// Set via PAGEMIRROR_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_notion_api_base() -> String {
    "https://www.notion.so".into()
}

fn default_site_base_url() -> String {
    "https://www.notion.so".into()
}

fn default_signature_algorithm() -> String {
    "SHA-1".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pagemirror-cache.sqlite")
}

fn default_user_agent() -> String {
    "pagemirror/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notion_api_base: default_notion_api_base(),
            site_base_url: default_site_base_url(),
            notion_token: None,
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            signature_algorithm: default_signature_algorithm(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGEMIRROR_`
    /// 2. TOML file from `PAGEMIRROR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGEMIRROR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAGEMIRROR_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that all three Cloudinary credentials are set (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent credential.
    pub fn require_cloudinary(&self) -> Result<CloudinaryKeys<'_>, ConfigError> {
        let cloud_name = self.cloudinary_cloud_name.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "cloudinary_cloud_name".into(),
            hint: "Set PAGEMIRROR_CLOUDINARY_CLOUD_NAME environment variable".into(),
        })?;
        let api_key = self.cloudinary_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "cloudinary_api_key".into(),
            hint: "Set PAGEMIRROR_CLOUDINARY_API_KEY environment variable".into(),
        })?;
        let api_secret = self.cloudinary_api_secret.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "cloudinary_api_secret".into(),
            hint: "Set PAGEMIRROR_CLOUDINARY_API_SECRET environment variable".into(),
        })?;

        Ok(CloudinaryKeys { cloud_name, api_key, api_secret })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.notion_api_base, "https://www.notion.so");
        assert_eq!(config.site_base_url, "https://www.notion.so");
        assert_eq!(config.signature_algorithm, "SHA-1");
        assert_eq!(config.db_path, PathBuf::from("./pagemirror-cache.sqlite"));
        assert_eq!(config.user_agent, "pagemirror/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.listen_addr, "127.0.0.1:8787");
        assert!(config.notion_token.is_none());
        assert!(config.cloudinary_cloud_name.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_require_cloudinary_missing() {
        let config = AppConfig::default();
        let result = config.require_cloudinary();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_cloudinary_partial() {
        let config = AppConfig {
            cloudinary_cloud_name: Some("demo".into()),
            cloudinary_api_key: Some("key".into()),
            ..Default::default()
        };
        let result = config.require_cloudinary();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "cloudinary_api_secret"));
    }

    #[test]
    fn test_require_cloudinary_present() {
        let config = AppConfig {
            cloudinary_cloud_name: Some("demo".into()),
            cloudinary_api_key: Some("key".into()),
            cloudinary_api_secret: Some("secret".into()),
            ..Default::default()
        };
        let keys = config.require_cloudinary().unwrap();
        assert_eq!(keys.cloud_name, "demo");
        assert_eq!(keys.api_key, "key");
        assert_eq!(keys.api_secret, "secret");
    }
}
