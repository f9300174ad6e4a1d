//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `ZIPCART_API_BASE_URL` - Explicit API root; overrides origin resolution
//! - `ZIPCART_PUBLIC_ORIGIN` - Origin the client is served from
//!   (default: `http://localhost:3000`)
//! - `ZIPCART_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! When no explicit base URL is given, the API root is derived from the
//! public origin: a loopback origin points at the local development backend,
//! anything else uses the `/api/v1` path on the same origin.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// API path prefix on a production origin.
const API_PATH: &str = "/api/v1";
/// Bootstrap config path; deliberately outside the versioned prefix.
const CONFIG_PATH: &str = "/api/config/";
/// Local development backend root.
const LOCAL_API_ROOT: &str = "http://127.0.0.1:8000";

/// Hostnames treated as local development.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid URL in {0}: {1}")]
    InvalidUrl(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root for all versioned API calls, without trailing slash.
    pub api_base_url: String,
    /// Absolute URL of the unauthenticated config bootstrap endpoint.
    pub bootstrap_url: String,
    /// Timeout applied to every network call, including token refresh and
    /// serviceability resolution.
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let origin = get_env_or_default("ZIPCART_PUBLIC_ORIGIN", "http://localhost:3000");
        let origin = Url::parse(&origin).map_err(|e| {
            ConfigError::InvalidUrl("ZIPCART_PUBLIC_ORIGIN".to_string(), e.to_string())
        })?;

        let api_base_url = match get_optional_env("ZIPCART_API_BASE_URL") {
            Some(explicit) => explicit.trim_end_matches('/').to_string(),
            None => resolve_api_root(&origin),
        };
        let bootstrap_url = resolve_bootstrap_url(&origin);

        let timeout_secs = get_env_or_default("ZIPCART_REQUEST_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ZIPCART_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_base_url,
            bootstrap_url,
            request_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Configuration for tests: in-process base URL, short timeout.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            api_base_url: format!("http://test.local{API_PATH}"),
            bootstrap_url: format!("http://test.local{CONFIG_PATH}"),
            request_timeout: Duration::from_secs(2),
            sentry_dsn: None,
        }
    }
}

/// Resolve the API root for an origin.
///
/// Loopback origins talk to the local development backend; everything else
/// uses the versioned path on the same origin.
fn resolve_api_root(origin: &Url) -> String {
    if is_loopback(origin) {
        format!("{LOCAL_API_ROOT}{API_PATH}")
    } else {
        format!("{}{API_PATH}", origin_root(origin))
    }
}

fn resolve_bootstrap_url(origin: &Url) -> String {
    if is_loopback(origin) {
        format!("{LOCAL_API_ROOT}{CONFIG_PATH}")
    } else {
        format!("{}{CONFIG_PATH}", origin_root(origin))
    }
}

fn is_loopback(origin: &Url) -> bool {
    origin
        .host_str()
        .is_some_and(|host| LOOPBACK_HOSTS.contains(&host))
}

fn origin_root(origin: &Url) -> String {
    let mut root = origin.to_string();
    while root.ends_with('/') {
        root.pop();
    }
    root
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_origin_uses_local_backend() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(resolve_api_root(&origin), "http://127.0.0.1:8000/api/v1");
        assert_eq!(
            resolve_bootstrap_url(&origin),
            "http://127.0.0.1:8000/api/config/"
        );
    }

    #[test]
    fn test_loopback_ip_origin_uses_local_backend() {
        let origin = Url::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(resolve_api_root(&origin), "http://127.0.0.1:8000/api/v1");
    }

    #[test]
    fn test_public_origin_uses_versioned_path() {
        let origin = Url::parse("https://shop.zipcart.dev").unwrap();
        assert_eq!(resolve_api_root(&origin), "https://shop.zipcart.dev/api/v1");
        assert_eq!(
            resolve_bootstrap_url(&origin),
            "https://shop.zipcart.dev/api/config/"
        );
    }

    #[test]
    fn test_for_tests_has_short_timeout() {
        let config = ClientConfig::for_tests();
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert!(config.api_base_url.ends_with("/api/v1"));
    }
}
