//! Client configuration.

use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Backend address used when `REDCRAWL_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost/api";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout. Does not apply to the live stream.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let base_url = lookup("REDCRAWL_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = Self::timeout_from_lookup(&lookup);
        Self::new(&base_url).map(|config| config.with_timeout(timeout))
    }

    /// Request timeout from `REDCRAWL_HTTP_TIMEOUT_SECS`. The base URL is not read.
    pub fn timeout_from_env() -> Duration {
        Self::timeout_from_lookup(|key| std::env::var(key).ok())
    }

    fn timeout_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Duration {
        let secs = lookup("REDCRAWL_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Create a configuration for an explicit base URL.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed = url::Url::parse(trimmed).map_err(|e| {
            ClientError::Configuration(format!("Invalid API URL '{}': {}", base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "Unsupported API URL scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            base_url: trimmed.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL for an API path such as `/sources/`.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
