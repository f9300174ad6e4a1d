//! Config bootstrap.
//!
//! Fetches the unauthenticated runtime configuration (feature keys,
//! maintenance flag) before anything else initializes. Maintenance mode
//! halts initialization: callers receive [`ApiError::Maintenance`] and are
//! expected to replace the UI with a static notice.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::api::transport::{HttpRequest, Transport};
use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError, report_error};

/// Runtime configuration delivered by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppBootstrap {
    /// External service keys (map provider, analytics).
    #[serde(default)]
    pub keys: BootstrapKeys,
    /// When set, the backend is down for maintenance.
    #[serde(default)]
    pub maintenance_mode: bool,
}

/// External-service keys from the bootstrap payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapKeys {
    /// Geocoding / map provider key, absent until configured server-side.
    #[serde(rename = "google_maps")]
    pub map_service_key: Option<String>,
}

/// Loads the bootstrap config.
///
/// Goes straight to the transport: the bootstrap endpoint is outside the
/// versioned API root and never carries credentials.
pub struct BootstrapService {
    transport: Arc<dyn Transport>,
    bootstrap_url: String,
    timeout: std::time::Duration,
}

impl BootstrapService {
    #[must_use]
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            bootstrap_url: config.bootstrap_url.clone(),
            timeout: config.request_timeout,
        }
    }

    /// Fetch the runtime configuration.
    ///
    /// # Errors
    ///
    /// `ApiError::Maintenance` when the backend signals maintenance mode -
    /// initialization must halt. Network and parse failures propagate.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<AppBootstrap, ApiError> {
        let result = self.fetch().await;
        if let Err(error) = &result {
            report_error(error, &self.bootstrap_url);
        }
        result
    }

    async fn fetch(&self) -> Result<AppBootstrap, ApiError> {
        let request = HttpRequest {
            method: Method::GET,
            url: self.bootstrap_url.clone(),
            headers: vec![],
            body: None,
        };

        let response = match tokio::time::timeout(self.timeout, self.transport.send(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return Err(ApiError::Network(error)),
            Err(_) => return Err(ApiError::Network(TransportError::Timeout(self.timeout))),
        };

        if !response.is_success() {
            return Err(ApiError::Api {
                status: response.status,
                message: "Config fetch failed".to_string(),
            });
        }

        let bootstrap: AppBootstrap = serde_json::from_str(&response.body)?;

        if bootstrap.maintenance_mode {
            return Err(ApiError::Maintenance);
        }

        info!("app config loaded");
        Ok(bootstrap)
    }
}
