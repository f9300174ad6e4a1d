//! Authenticated request pipeline.
//!
//! # Architecture
//!
//! - Single [`ApiClient`] instance owns the refresh flag and waiter queue;
//!   clones share it through an inner `Arc`
//! - Bearer credentials and contexts live behind the injected
//!   [`KeyValueStore`](crate::storage::KeyValueStore)
//! - HTTP goes through the [`Transport`] seam so tests run without a server
//!
//! # Token refresh
//!
//! A 401 on a first attempt triggers a credential refresh. At most one
//! refresh call is in flight at any time: callers that hit a 401 while one is
//! underway are suspended on a oneshot continuation and resumed in arrival
//! order once it resolves. Each original call is retried at most once; a
//! second 401 after a successful refresh is a terminal
//! [`ApiError::AuthExpired`]. A failed refresh clears all persisted state,
//! invokes the re-authentication hook, and fails every suspended caller with
//! [`ApiError::AuthRefreshFailed`].
//!
//! # Example
//!
//! ```rust,ignore
//! use zipcart_client::api::{ApiClient, transport::ReqwestTransport};
//!
//! let client = ApiClient::new(&config, Arc::new(ReqwestTransport::new()), store);
//! let cart: serde_json::Value = client.get("/orders/cart/").await?;
//! ```

pub mod transport;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError, report_error};
use crate::storage::{KeyValueStore, keys};
use transport::{HttpRequest, HttpResponse, Transport};

/// Credential refresh endpoint. Called without a bearer header.
const REFRESH_ENDPOINT: &str = "/auth/refresh/";

/// Fallback message when an error payload matches none of the known shapes.
const GENERIC_ERROR: &str = "An unexpected error occurred";

/// Hook invoked when the session cannot be recovered and the user must be
/// sent back to the authentication entry point.
pub trait ReauthHook: Send + Sync {
    fn on_reauth_required(&self);
}

/// Client for the ZipCart REST API.
///
/// Cheap to clone; clones share the refresh state, storage, and transport.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn KeyValueStore>,
    base_url: String,
    timeout: Duration,
    refresh: Mutex<RefreshState>,
    reauth: Option<Arc<dyn ReauthHook>>,
}

/// Refresh coordination: the in-flight flag plus suspended callers.
///
/// Waiters are resumed in insertion order. The flag is cleared before any
/// waiter is resumed so their replays short-circuit to "no refresh needed".
/// Behind a sync mutex; never held across an await.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<bool>>,
}

impl ApiClientInner {
    fn refresh_state(&self) -> MutexGuard<'_, RefreshState> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by the task performing the refresh. If that task is dropped at its
/// await point, the flag and the queued waiters must not be stranded: the
/// guard clears the flag and fails every waiter so the next 401 starts a
/// fresh refresh.
struct RefreshOwner<'a> {
    inner: &'a ApiClientInner,
    resolved: bool,
}

impl Drop for RefreshOwner<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        let waiters = {
            let mut refresh = self.inner.refresh_state();
            refresh.in_flight = false;
            std::mem::take(&mut refresh.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(false);
        }
    }
}

/// Token pair returned by the refresh endpoint. Some backends rotate the
/// refresh token too; absent means the stored one stays valid.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    refresh: Option<String>,
}

impl ApiClient {
    /// Create a new API client.
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport,
                store,
                base_url: config.api_base_url.clone(),
                timeout: config.request_timeout,
                refresh: Mutex::new(RefreshState::default()),
                reauth: None,
            }),
        }
    }

    /// Create a client with a re-authentication hook.
    #[must_use]
    pub fn with_reauth_hook(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        reauth: Arc<dyn ReauthHook>,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport,
                store,
                base_url: config.api_base_url.clone(),
                timeout: config.request_timeout,
                refresh: Mutex::new(RefreshState::default()),
                reauth: Some(reauth),
            }),
        }
    }

    /// Shared storage handle, for services layered on top of the client.
    #[must_use]
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.inner.store)
    }

    /// Issue a request and normalize the response.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for transport failures, authentication
    /// failures that could not be recovered by a refresh, and non-2xx
    /// responses. Every error is reported to the error-tracking hook before
    /// being returned.
    #[instrument(skip(self, body), fields(method = %method))]
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let result = self.dispatch(endpoint, &method, body).await;
        if let Err(error) = &result {
            report_error(error, endpoint);
        }
        result
    }

    /// Issue a request and deserialize the normalized response.
    ///
    /// # Errors
    ///
    /// As [`Self::request`], plus `ApiError::Parse` if the body does not
    /// match `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let value = self.request(endpoint, method, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// GET a resource.
    ///
    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, Method::GET, None).await
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(endpoint, Method::POST, Some(body)).await
    }

    /// PUT a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(endpoint, Method::PUT, Some(body)).await
    }

    /// PATCH a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn patch(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(endpoint, Method::PATCH, Some(body)).await
    }

    /// DELETE a resource.
    ///
    /// # Errors
    ///
    /// See [`Self::request`].
    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, Method::DELETE, None).await
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        method: &Method,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let response = self.execute(endpoint, method, body.as_ref()).await?;

        if response.status != 401 {
            return normalize(response);
        }

        // Authorization failure on a first attempt: recover via refresh.
        // If one is already in flight this suspends until it resolves.
        self.refresh_session().await?;

        debug!("replaying request after credential refresh");
        let retried = self.execute(endpoint, method, body.as_ref()).await?;

        if retried.status == 401 {
            // Second failure after a fresh credential is terminal, the call
            // is never re-queued.
            return Err(ApiError::AuthExpired);
        }

        normalize(retried)
    }

    /// Build and send one HTTP call under the configured timeout.
    async fn execute(
        &self,
        endpoint: &str,
        method: &Method,
        body: Option<&Value>,
    ) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest {
            method: method.clone(),
            url: self.url_for(endpoint),
            headers: self.headers_for(method),
            body: body.cloned(),
        };
        self.send_with_timeout(request).await
    }

    async fn send_with_timeout(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let timeout = self.inner.timeout;
        match tokio::time::timeout(timeout, self.inner.transport.send(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => Err(ApiError::Network(error)),
            Err(_) => Err(ApiError::Network(TransportError::Timeout(timeout))),
        }
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.inner.base_url)
        } else {
            format!("{}/{endpoint}", self.inner.base_url)
        }
    }

    fn headers_for(&self, method: &Method) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];

        if let Some(token) = self.inner.store.get(keys::ACCESS_TOKEN) {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        // Fresh idempotency token per mutating call so the server can dedupe
        // retried submissions.
        if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
            headers.push(("Idempotency-Key".to_string(), Uuid::new_v4().to_string()));
        }

        headers
    }

    /// Refresh the session, or wait on the refresh already in flight.
    async fn refresh_session(&self) -> Result<(), ApiError> {
        let waiter = {
            let mut refresh = self.inner.refresh_state();
            if refresh.in_flight {
                let (tx, rx) = oneshot::channel();
                refresh.waiters.push(tx);
                Some(rx)
            } else {
                refresh.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("suspended behind in-flight credential refresh");
            return match rx.await {
                Ok(true) => Ok(()),
                // A dropped sender means the refreshing task died; treat it
                // the same as a failed refresh rather than hanging.
                Ok(false) | Err(_) => Err(ApiError::AuthRefreshFailed),
            };
        }

        let mut owner = RefreshOwner {
            inner: &self.inner,
            resolved: false,
        };

        let outcome = self.perform_refresh().await;
        let succeeded = outcome.is_ok();

        // The flag must drop before anyone is resumed so their replays see
        // "no refresh in progress".
        let waiters = {
            let mut refresh = self.inner.refresh_state();
            refresh.in_flight = false;
            std::mem::take(&mut refresh.waiters)
        };
        owner.resolved = true;

        if !succeeded {
            self.logout();
        }

        for waiter in waiters {
            let _ = waiter.send(succeeded);
        }

        outcome
    }

    /// The single refresh call. No bearer header; presents the stored
    /// refresh credential.
    async fn perform_refresh(&self) -> Result<(), ApiError> {
        let Some(refresh_token) = self.inner.store.get(keys::REFRESH_TOKEN) else {
            warn!("credential refresh impossible: no refresh token stored");
            return Err(ApiError::AuthRefreshFailed);
        };

        let request = HttpRequest {
            method: Method::POST,
            url: self.url_for(REFRESH_ENDPOINT),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(json!({ "refresh": refresh_token })),
        };

        let response = self.send_with_timeout(request).await.map_err(|error| {
            warn!(%error, "credential refresh transport failure");
            ApiError::AuthRefreshFailed
        })?;

        if !response.is_success() {
            warn!(status = response.status, "credential refresh rejected");
            return Err(ApiError::AuthRefreshFailed);
        }

        let tokens: RefreshResponse = serde_json::from_str(&response.body).map_err(|error| {
            warn!(%error, "credential refresh returned unreadable body");
            ApiError::AuthRefreshFailed
        })?;

        self.inner.store.set(keys::ACCESS_TOKEN, tokens.access);
        if let Some(rotated) = tokens.refresh {
            self.inner.store.set(keys::REFRESH_TOKEN, rotated);
        }

        debug!("credentials refreshed");
        Ok(())
    }

    /// Hard logout: wipe persisted state and hand control to the
    /// re-authentication hook. A failed refresh must never leave a stale
    /// access token behind.
    fn logout(&self) {
        self.inner.store.clear();
        if let Some(hook) = &self.inner.reauth {
            hook.on_reauth_required();
        }
    }
}

// =============================================================================
// Response normalization
// =============================================================================

/// Convert a raw response into a success value or a classified error.
fn normalize(response: HttpResponse) -> Result<Value, ApiError> {
    let data = parse_body(&response.body);

    if response.is_success() {
        // Empty 204-style bodies resolve as an empty success value so
        // callers never see null.
        return Ok(data.unwrap_or_else(|| json!({})));
    }

    let message = extract_error_message(data.as_ref());
    Err(classify_error(response.status, data.as_ref(), message))
}

/// Parse a body leniently: empty becomes `None`, non-JSON is kept as raw
/// text so error pages still produce a message.
fn parse_body(body: &str) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(body.to_string())),
    }
}

/// Extract a user-facing message from an error payload.
///
/// Priority order: top-level `detail`, top-level `error` (stringified when
/// structured), first entry of `non_field_errors`, first field name plus its
/// first listed error, generic fallback.
fn extract_error_message(data: Option<&Value>) -> String {
    let Some(data) = data else {
        return GENERIC_ERROR.to_string();
    };

    if let Some(detail) = data.get("detail") {
        return value_to_message(detail);
    }

    if let Some(error) = data.get("error") {
        return value_to_message(error);
    }

    if let Some(first) = data
        .get("non_field_errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        return value_to_message(first);
    }

    // Field errors, e.g. { "pincode": ["This field is required."] }
    if let Some((field, errors)) = data.as_object().and_then(|object| object.iter().next()) {
        let first = match errors {
            Value::Array(list) => list.first().map(value_to_message).unwrap_or_default(),
            other => value_to_message(other),
        };
        return format!("{field}: {first}");
    }

    GENERIC_ERROR.to_string()
}

fn value_to_message(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Map a non-2xx response onto the error kinds callers recover from.
fn classify_error(status: u16, data: Option<&Value>, message: String) -> ApiError {
    let code = data
        .and_then(|d| d.get("code"))
        .and_then(Value::as_str);

    if status == 409 || code == Some("warehouse_conflict") || message.contains("different store") {
        return ApiError::Conflict(message);
    }

    if is_validation_payload(data) {
        return ApiError::Validation(message);
    }

    ApiError::Api { status, message }
}

/// Structured field errors: an object of field -> error-list entries with
/// none of the global error keys.
fn is_validation_payload(data: Option<&Value>) -> bool {
    let Some(object) = data.and_then(Value::as_object) else {
        return false;
    };
    if object.contains_key("detail") || object.contains_key("error") || object.contains_key("code")
    {
        return false;
    }
    object.contains_key("non_field_errors") || object.values().any(Value::is_array)
}
