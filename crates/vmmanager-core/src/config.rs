//! Configuration structures for VMmanager clients.
//!
//! This module provides the configuration consumed by the client: where the API
//! lives, how to authenticate, and how long to wait on deferred tasks.

use crate::client::{
    BackoffPolicy, HttpConfig, PollPolicy, DEFAULT_BACKOFF_UNIT_MS, DEFAULT_FETCH_ATTEMPTS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TASK_TIMEOUT_SECS,
};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default path of the token endpoint, relative to the API origin.
pub const DEFAULT_AUTH_PATH: &str = "/auth/v4/public/token";

/// Configuration for a VMmanager client instance.
///
/// Immutable once the client is built; credentials can still be supplied later
/// through an explicit login.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    /// API base URL (e.g., `https://vm.example.com/vm/v3`)
    #[validate(url)]
    pub api_url: String,

    /// Login used by [`ClientConfig::has_credentials`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password paired with `username`
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Pre-issued API token; takes precedence over username/password
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,

    /// Token endpoint path, resolved against the origin of `api_url`
    #[serde(default = "default_auth_path")]
    pub auth_path: String,

    /// Budget for waiting on a deferred task, in seconds
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Interval between task status checks, in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Attempts for retrying read requests
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Linear backoff unit between read attempts, in milliseconds
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Fail a wait as soon as the task reports a non-success status
    #[serde(default)]
    pub fail_on_terminal_status: bool,
}

fn default_auth_path() -> String {
    DEFAULT_AUTH_PATH.to_string()
}

const fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_fetch_attempts() -> u32 {
    DEFAULT_FETCH_ATTEMPTS
}

const fn default_backoff_unit_ms() -> u64 {
    DEFAULT_BACKOFF_UNIT_MS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_tls_verify() -> bool {
    true
}

impl ClientConfig {
    /// Create a new client configuration with required parameters.
    ///
    /// # Arguments
    ///
    /// * `api_url` - The base URL for the VM API (e.g., "https://vm.example.com/vm/v3")
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(api_url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            api_url: api_url.into(),
            ..Self::default()
        };

        config.validate().map_err(|e| {
            Error::ConfigError(format!("Invalid configuration: {e}"))
        })?;

        Ok(config)
    }

    /// Set username and password for an explicit login.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set a pre-issued API token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the token endpoint path.
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.auth_path = path.into();
        self
    }

    /// Set the task wait budget in seconds.
    #[must_use]
    pub const fn with_task_timeout(mut self, seconds: u64) -> Self {
        self.task_timeout_secs = seconds;
        self
    }

    /// Set the task poll interval in seconds.
    #[must_use]
    pub const fn with_poll_interval(mut self, seconds: u64) -> Self {
        self.poll_interval_secs = seconds;
        self
    }

    /// Set the number of read attempts.
    #[must_use]
    pub const fn with_fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = attempts;
        self
    }

    /// Set the backoff unit in milliseconds.
    #[must_use]
    pub const fn with_backoff_unit_ms(mut self, millis: u64) -> Self {
        self.backoff_unit_ms = millis;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Fail waits immediately on non-success task statuses.
    #[must_use]
    pub const fn with_fail_on_terminal_status(mut self, enabled: bool) -> Self {
        self.fail_on_terminal_status = enabled;
        self
    }

    /// True when both username and password are present.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Get the task wait budget as a Duration.
    #[must_use]
    pub const fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Backoff policy for retrying read requests.
    #[must_use]
    pub const fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new()
            .with_max_attempts(self.fetch_attempts)
            .with_unit(Duration::from_millis(self.backoff_unit_ms))
    }

    /// Poll policy for deferred tasks.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new()
            .with_interval(Duration::from_secs(self.poll_interval_secs))
            .with_timeout(self.task_timeout())
            .with_fail_on_terminal_status(self.fail_on_terminal_status)
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub const fn http_config(&self) -> HttpConfig {
        HttpConfig::new()
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_tls_verify(self.tls_verify)
    }

    /// Parse and validate the API URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_api_url(&self) -> Result<Url, Error> {
        Url::parse(&self.api_url)
            .map_err(|e| Error::ConfigError(format!("Invalid API URL: {e}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            api_token: None,
            auth_path: default_auth_path(),
            task_timeout_secs: default_task_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            fetch_attempts: default_fetch_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            tls_verify: default_tls_verify(),
            fail_on_terminal_status: false,
        }
    }
}
