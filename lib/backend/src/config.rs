//! Hosted backend connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the hosted backend lives and how to talk to it.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL (e.g., "https://abc.supabase.co").
    url: String,
    /// Public API key sent as `apikey` on every request.
    anon_key: String,
    /// Per-request timeout in seconds.
    /// Default: 10
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl BackendConfig {
    /// Creates a configuration with the default timeout.
    #[must_use]
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_drops_trailing_slash() {
        let config = BackendConfig::new("https://gym.example.co/", "anon");
        assert_eq!(config.url(), "https://gym.example.co");
    }

    #[test]
    fn timeout_defaults_when_omitted() {
        let config: BackendConfig = serde_json::from_value(serde_json::json!({
            "url": "https://gym.example.co",
            "anon_key": "anon",
        }))
        .expect("deserialize");
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }
}
