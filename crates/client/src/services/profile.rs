//! Customer profile reads and updates.
//!
//! The profile blob is mirrored into storage so the UI can render a name
//! immediately on the next launch, before any network round trip.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::storage::{KeyValueStore, keys, set_record};

/// The signed-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Editable profile fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Client for the customer profile endpoint.
pub struct ProfileService {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
}

impl ProfileService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let store = api.store();
        Self { api, store }
    }

    /// Fetch the signed-in customer and mirror the blob into storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<Profile, ApiError> {
        let profile: Profile = self
            .api
            .request_as("/auth/customer/me/", reqwest::Method::GET, None)
            .await?;
        set_record(self.store.as_ref(), keys::USER, &profile);
        Ok(profile)
    }

    /// Apply a partial update and mirror the result into storage.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for rejected fields; other pipeline errors
    /// propagate.
    #[instrument(skip(self, update))]
    pub async fn update(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        let body = serde_json::to_value(update)?;
        let profile: Profile = self
            .api
            .request_as("/auth/customer/me/", reqwest::Method::PATCH, Some(body))
            .await?;
        set_record(self.store.as_ref(), keys::USER, &profile);
        Ok(profile)
    }
}
