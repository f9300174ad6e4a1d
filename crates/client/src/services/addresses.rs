//! Saved-address CRUD.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use zipcart_core::AddressId;

use crate::api::ApiClient;
use crate::error::ApiError;

/// A customer's saved address.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedAddress {
    pub id: AddressId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: String,
    pub label: String,
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Payload for creating or updating an address.
#[derive(Debug, Clone, Serialize)]
pub struct AddressInput {
    pub latitude: f64,
    pub longitude: f64,
    /// Full geocoded address text.
    pub google_address_text: String,
    pub house_no: String,
    pub apartment_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    /// "Home", "Work", "Other".
    pub label: String,
}

/// List endpoints may paginate or return a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressListResponse {
    Paginated { results: Vec<SavedAddress> },
    Bare(Vec<SavedAddress>),
}

/// Client for the address-book endpoints.
pub struct AddressService {
    api: ApiClient,
}

impl AddressService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// All saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn list(&self) -> Result<Vec<SavedAddress>, ApiError> {
        let response: AddressListResponse = self
            .api
            .request_as("/auth/customer/addresses/", reqwest::Method::GET, None)
            .await?;
        Ok(match response {
            AddressListResponse::Paginated { results } => results,
            AddressListResponse::Bare(addresses) => addresses,
        })
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// `ApiError::Validation` for rejected fields; other pipeline errors
    /// propagate.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &AddressInput) -> Result<SavedAddress, ApiError> {
        let body = serde_json::to_value(input)?;
        self.api
            .request_as("/auth/customer/addresses/", reqwest::Method::POST, Some(body))
            .await
    }

    /// Update an existing address.
    ///
    /// # Errors
    ///
    /// See [`Self::create`].
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update(
        &self,
        id: &AddressId,
        input: &AddressInput,
    ) -> Result<SavedAddress, ApiError> {
        let body = serde_json::to_value(input)?;
        self.api
            .request_as(
                &format!("/auth/customer/addresses/{id}/"),
                reqwest::Method::PUT,
                Some(body),
            )
            .await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete(&self, id: &AddressId) -> Result<Value, ApiError> {
        self.api
            .delete(&format!("/auth/customer/addresses/{id}/"))
            .await
    }
}
