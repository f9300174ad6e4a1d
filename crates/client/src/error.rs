//! Unified error handling with Sentry integration.
//!
//! Every error the pipeline surfaces to a caller is first routed through
//! [`report_error`], which captures it to Sentry and logs it. Callers receive
//! a single [`ApiError`] shape regardless of which backend produced the
//! failure.

use thiserror::Error;

/// Errors surfaced by the API client and the services built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Session is no longer valid and could not be recovered; the user must
    /// sign in again.
    #[error("Session expired, please sign in again")]
    AuthExpired,

    /// The token refresh call itself failed; persisted state has been cleared
    /// and the re-authentication hook invoked.
    #[error("Authentication refresh failed")]
    AuthRefreshFailed,

    /// Structured field errors from the backend, surfaced verbatim.
    #[error("{0}")]
    Validation(String),

    /// Serviceability lookup failed or the location is not serviceable.
    /// Cart and order actions are blocked until a new resolution succeeds.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Cross-warehouse cart conflict; recoverable via a user-confirmed
    /// destructive retry.
    #[error("{0}")]
    Conflict(String),

    /// The user declined a confirmation prompt.
    #[error("Cancelled by user")]
    Cancelled,

    /// A cart or order action was attempted with no resolved warehouse.
    /// Raised locally, before any network call.
    #[error("Please select a delivery location first")]
    LocationRequired,

    /// The backend is in maintenance mode; initialization must halt.
    #[error("Service is under maintenance")]
    Maintenance,

    /// Transport-level failure (connection, TLS, timeout).
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// Non-2xx response that is not one of the recognized kinds above.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by the HTTP transport layer.
///
/// Kept separate from [`ApiError`] so test transports can synthesize network
/// failures without a live `reqwest` error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Connection-level failure (used by test transports).
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Capture an error to Sentry and log it before it is raised to the caller.
///
/// Auth and validation failures are expected in normal operation and are only
/// logged; everything else is captured.
pub fn report_error(error: &ApiError, endpoint: &str) {
    match error {
        ApiError::Validation(_)
        | ApiError::Conflict(_)
        | ApiError::Cancelled
        | ApiError::LocationRequired => {
            tracing::debug!(error = %error, endpoint, "request rejected");
        }
        ApiError::AuthExpired | ApiError::AuthRefreshFailed => {
            tracing::warn!(error = %error, endpoint, "authentication failure");
        }
        _ => {
            let event_id = sentry::capture_error(error);
            tracing::error!(
                error = %error,
                endpoint,
                sentry_event_id = %event_id,
                "request error"
            );
        }
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    });
}
