//! Location context records.
//!
//! Two independent persisted records drive all location-aware behavior:
//!
//! - [`ServiceContext`] - where the user is *browsing* from. Set whenever the
//!   map pin moves or a saved address is selected. Drives catalog pricing and
//!   availability. Never implies a confirmed delivery target.
//! - [`DeliveryContext`] - where an order will be *shipped*. Exists only once
//!   the user has explicitly selected a saved address for checkout.
//!
//! Invariant: whenever a `DeliveryContext` is set, the stored `ServiceContext`
//! mirrors its coordinates so catalog pricing matches the checkout location.
//! A free map-pin move clears the `DeliveryContext` - a stale delivery target
//! must never survive a location change.

use serde::{Deserialize, Serialize};

use crate::types::coords::Coordinates;
use crate::types::id::AddressId;

/// The browsing location: map pin or mirrored saved-address coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceContext {
    /// Pin coordinates.
    #[serde(flatten)]
    pub coords: Coordinates,
    /// City resolved from geocoding.
    pub city: String,
    /// Neighborhood / area label for display.
    pub area_name: String,
    /// Full formatted address from the geocoder.
    pub formatted_address: String,
}

/// A confirmed delivery target: a specific saved address chosen for checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryContext {
    /// Saved address being delivered to.
    pub address_id: AddressId,
    /// Address coordinates.
    #[serde(flatten)]
    pub coords: Coordinates,
    /// City of the address.
    pub city: String,
    /// Human label ("Home", "Work", ...).
    pub label: String,
    /// Area label for display next to the label.
    pub area_name: String,
    /// Full address text.
    pub full_address: String,
}

impl DeliveryContext {
    /// Derive the mirrored [`ServiceContext`] for this delivery target.
    ///
    /// Catalog pricing must follow the checkout location, so selecting a
    /// delivery address always rewrites the browsing context too.
    #[must_use]
    pub fn to_service_context(&self) -> ServiceContext {
        ServiceContext {
            coords: self.coords,
            city: self.city.clone(),
            area_name: self.area_name.clone(),
            formatted_address: self.full_address.clone(),
        }
    }
}
