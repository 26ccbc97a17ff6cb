//! Client configuration.
//!
//! Settings come from an optional TOML file, overridden by `UB_`-prefixed
//! environment variables:
//!
//! ```toml
//! base_url = "https://api.example.test"
//! api_key = "ub_live_..."
//! timeout_ms = 30000
//! retry = true
//! max_attempts = 3
//! ```
//!
//! `UB_API_KEY=ub_test_... UB_MAX_ATTEMPTS=5` would override the matching keys.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::error::OperationError;
use crate::executor::policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT};
use crate::executor::RetryPolicy;
use crate::transport::validate_api_key;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "UB";

/// Errors that can occur when loading client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A required setting was not provided by any source.
    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    /// The base URL is not an http(s) URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The API key is missing or malformed.
    #[error("invalid API key: {0}")]
    InvalidApiKey(OperationError),
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Connection and retry settings for a [`crate::client::Client`].
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// Service base URL.
    #[serde(default)]
    pub base_url: String,
    /// API key, `ub_live_...` or `ub_test_...`.
    #[serde(default)]
    pub api_key: String,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Connection setup timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whether failed requests are retried.
    #[serde(default = "default_true")]
    pub retry: bool,
    /// Maximum attempts per request when retrying.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &crate::transport::http::redact_api_key(&self.api_key),
            )
            .field("timeout_ms", &self.timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("retry", &self.retry)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a configuration with default timeouts and retries.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Loads configuration from an optional file plus the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `path` is given but does not exist
    /// - a source cannot be parsed
    /// - `base_url` or `api_key` is missing, or the key is malformed
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`ClientConfig::load`], reading overrides from `env` instead of the
    /// process environment when it is given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the required settings are present and well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("base_url"));
        }
        let base_url = self.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        validate_api_key(&self.api_key).map_err(ConfigError::InvalidApiKey)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// The default executor policy for requests made with this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_timeout(self.timeout())
            .with_retry(self.retry)
            .with_max_attempts(self.max_attempts)
    }
}
