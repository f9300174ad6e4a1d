//! HTTP transport seam.
//!
//! The pipeline depends on the object-safe [`Transport`] trait rather than a
//! concrete HTTP client, so tests can script backend behavior without a
//! server. [`ReqwestTransport`] is the production implementation.

use async_trait::async_trait;
use reqwest::Method;

use crate::error::TransportError;

/// A single outgoing HTTP request, fully assembled by the pipeline.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

/// Raw response: status plus body text.
///
/// The body is read as text first so empty and non-JSON bodies can be
/// normalized by the pipeline instead of failing in the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport capability for issuing HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for connection-level failures. Non-2xx
    /// statuses are *not* errors at this layer.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Default, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // Text first: empty 204 bodies and non-JSON error pages must not
        // fail here, normalization happens in the pipeline.
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
