//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SLICEKIT_API_URL` - Base URL of the persistence service (e.g. `http://localhost:8080`)
//!
//! ## Optional
//! - `SLICEKIT_API_TOKEN` - Bearer token sent with every request
//! - `SLICEKIT_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `SLICEKIT_CONCURRENCY` - `fenced` or `last-resolved-wins` (default: fenced)
//! - `SLICEKIT_APP_NAME` - Prefix of the service's `X-<app>-error` alert headers (default: slicekitApp)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::slice::ConcurrencyPolicy;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_APP_NAME: &str = "slicekitApp";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// REST client configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Service root; entity resources live under `<api_url>/api/`
    pub api_url: Url,
    /// Bearer token for authenticated services
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How slices treat results of overlapping calls
    pub concurrency: ConcurrencyPolicy,
    /// Alert header prefix used by the service
    pub app_name: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .field("app_name", &self.app_name)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration for `api_url` with every other setting at its default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: ConcurrencyPolicy::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `SLICEKIT_API_URL` is missing or any variable is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("SLICEKIT_API_URL")?;
        let api_url = parse_url("SLICEKIT_API_URL", &raw)?;
        Self::from_env_with_api_url(api_url)
    }

    /// Load configuration from environment variables, taking the service URL
    /// from the caller instead of `SLICEKIT_API_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any optional variable is invalid.
    pub fn from_env_with_api_url(api_url: Url) -> Result<Self, ConfigError> {
        let timeout_secs = get_optional_env("SLICEKIT_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    ConfigError::InvalidEnvVar(
                        "SLICEKIT_TIMEOUT_SECS".to_string(),
                        format!("not a number of seconds: {raw}"),
                    )
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let concurrency = get_optional_env("SLICEKIT_CONCURRENCY")
            .map(|raw| {
                raw.parse::<ConcurrencyPolicy>()
                    .map_err(|e| ConfigError::InvalidEnvVar("SLICEKIT_CONCURRENCY".to_string(), e))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            api_url,
            api_token: get_optional_env("SLICEKIT_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(timeout_secs),
            concurrency,
            app_name: get_env_or_default("SLICEKIT_APP_NAME", DEFAULT_APP_NAME),
        })
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.api_token = Some(token);
        self
    }

    /// Set the concurrency policy.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: ConcurrencyPolicy) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse a service URL.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the URL does not parse or is not http(s).
pub fn parse_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(url)
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}
