//! Console configuration.
//!
//! Loaded via the `config` crate from `GYMDESK__*` environment variables,
//! with `__` separating nested keys (e.g. `GYMDESK__BACKEND__URL`).
//!
//! See [`BackendConfig`](gymdesk_backend::BackendConfig) for the hosted
//! backend settings.

use gymdesk_access::RetryPolicy;
use gymdesk_backend::BackendConfig;
use serde::Deserialize;
use std::time::Duration;

/// Console configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ConsoleConfig {
    /// Hosted backend. Required unless `offline` is set.
    #[serde(default)]
    pub backend: Option<BackendConfig>,

    /// Run against in-memory stores instead of the hosted backend.
    #[serde(default)]
    pub offline: bool,

    /// Access resolution settings.
    #[serde(default)]
    pub access: AccessConfig,

    /// Mail relay for student broadcasts.
    #[serde(default)]
    pub mail: Option<MailConfig>,

    /// Seed principal for offline runs.
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Access resolution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Resolutions attempted by the `retry` command.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between retry attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Re-resolve when the session changes outside the console.
    #[serde(default = "default_follow_session_changes")]
    pub follow_session_changes: bool,
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_follow_session_changes() -> bool {
    true
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            follow_session_changes: default_follow_session_changes(),
        }
    }
}

impl AccessConfig {
    /// Returns the retry policy for the `retry` command.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

/// HTTP mail relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Relay endpoint receiving one JSON mail per request.
    pub relay_url: String,

    /// Bearer token for the relay.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_mail_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_mail_timeout_seconds() -> u64 {
    30
}

/// Administrator seeded into offline runs so there is someone to sign in as.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_email")]
    pub admin_email: String,

    #[serde(default = "default_seed_password")]
    pub admin_password: String,
}

fn default_seed_email() -> String {
    "admin@gymdesk.local".to_string()
}

fn default_seed_password() -> String {
    "gymdesk".to_string()
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            admin_email: default_seed_email(),
            admin_password: default_seed_password(),
        }
    }
}

impl ConsoleConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is malformed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("GYMDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
