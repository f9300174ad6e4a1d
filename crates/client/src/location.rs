//! Location context management.
//!
//! Owns the two persisted location records and the derived warehouse
//! resolution:
//!
//! - `ServiceContext` - where the user is browsing from (map pin)
//! - `DeliveryContext` - the saved address an order will ship to
//!
//! State machine: `NoContext -> ServiceOnly -> ServiceAndDelivery`, where
//! `ServiceAndDelivery -> ServiceOnly` is reachable only through a fresh
//! map-pin action. There is no address-deselect action.
//!
//! Presentation layers register a [`LocationObserver`] instead of listening
//! on an ambient event bus; notifications carry no payload and consumers
//! re-read storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::{debug, instrument, warn};

use zipcart_core::{Coordinates, DeliveryContext, ServiceContext, WarehouseId};

use crate::api::ApiClient;
use crate::error::{ApiError, report_error};
use crate::storage::{self, KeyValueStore, keys};

/// Serviceability lookup endpoint.
const FIND_SERVICEABLE_ENDPOINT: &str = "/warehouse/find-serviceable/";

/// Placeholder shown when no context is stored.
const DEFAULT_LOCATION_LABEL: &str = "Select Location";

/// Where a service-context update originated.
///
/// A free map-pin action invalidates any confirmed delivery target; a
/// mirror write performed while selecting a saved address must not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOrigin {
    /// The user dragged or dropped the pin in browsing mode.
    MapPin,
    /// The context mirrors a saved address being selected for delivery.
    SavedAddress,
}

/// Observable context state, derived from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationState {
    NoContext,
    ServiceOnly,
    ServiceAndDelivery,
}

/// Notified (without payload) whenever either context changes.
pub trait LocationObserver: Send + Sync {
    fn on_location_changed(&self);
}

/// Outcome of a serviceability resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseResolution {
    /// A warehouse can serve the coordinates; its id is now the stored
    /// precondition token for cart and order calls.
    Serviceable(WarehouseId),
    /// A newer resolution started while this one was in flight; the response
    /// was discarded and stored state is untouched.
    Superseded,
}

/// Manages the service/delivery contexts and the derived warehouse id.
pub struct LocationManager {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    observers: RwLock<Vec<Arc<dyn LocationObserver>>>,
    /// Ticket counter closing the in-flight resolution race: only the most
    /// recently issued ticket may touch stored state.
    resolution_seq: AtomicU64,
}

impl LocationManager {
    /// Create a manager sharing the client's storage.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let store = api.store();
        Self {
            api,
            store,
            observers: RwLock::new(Vec::new()),
            resolution_seq: AtomicU64::new(0),
        }
    }

    /// Register an observer for context changes.
    pub fn subscribe(&self, observer: Arc<dyn LocationObserver>) {
        self.observers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(observer);
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Set the browsing location.
    ///
    /// A [`ServiceOrigin::MapPin`] origin clears any confirmed delivery
    /// target: the user must never order to a location they are no longer
    /// viewing. Triggers a warehouse resolution for the new coordinates.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ServiceUnavailable` when the coordinates are not
    /// serviceable, or the underlying call failure. The context itself is
    /// persisted regardless.
    #[instrument(skip(self, context), fields(origin = ?origin))]
    pub async fn set_service_context(
        &self,
        context: ServiceContext,
        origin: ServiceOrigin,
    ) -> Result<WarehouseResolution, ApiError> {
        let coords = context.coords;
        let city = context.city.clone();

        storage::set_record(self.store.as_ref(), keys::SERVICE_CONTEXT, &context);
        if origin == ServiceOrigin::MapPin {
            self.store.remove(keys::DELIVERY_CONTEXT);
        }
        self.notify_location_changed();

        self.resolve_warehouse(coords, &city).await
    }

    /// Select a saved address as the delivery target.
    ///
    /// The service context is rewritten to mirror the delivery coordinates
    /// so catalog pricing matches the checkout location. Triggers a
    /// warehouse resolution.
    ///
    /// # Errors
    ///
    /// As [`Self::set_service_context`].
    #[instrument(skip(self, context), fields(address_id = %context.address_id))]
    pub async fn set_delivery_context(
        &self,
        context: DeliveryContext,
    ) -> Result<WarehouseResolution, ApiError> {
        let coords = context.coords;
        let city = context.city.clone();
        let mirrored = context.to_service_context();

        storage::set_record(self.store.as_ref(), keys::DELIVERY_CONTEXT, &context);
        storage::set_record(self.store.as_ref(), keys::SERVICE_CONTEXT, &mirrored);
        self.notify_location_changed();

        self.resolve_warehouse(coords, &city).await
    }

    /// Resolve which warehouse (if any) serves the coordinates.
    ///
    /// Rapid repeated invocations race on the network; a response belonging
    /// to a superseded request is discarded rather than being allowed to
    /// overwrite the newer result.
    ///
    /// # Errors
    ///
    /// `ApiError::ServiceUnavailable` when no warehouse serves the
    /// coordinates; the stored warehouse id is cleared and cart/order
    /// actions stay blocked until a resolution succeeds. Call failures clear
    /// the stored id too.
    pub async fn resolve_warehouse(
        &self,
        coords: Coordinates,
        city: &str,
    ) -> Result<WarehouseResolution, ApiError> {
        let ticket = self.resolution_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self
            .api
            .post(
                FIND_SERVICEABLE_ENDPOINT,
                json!({
                    "latitude": coords.lat,
                    "longitude": coords.lng,
                    "city": city,
                }),
            )
            .await;

        if self.resolution_seq.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding superseded warehouse resolution");
            return Ok(WarehouseResolution::Superseded);
        }

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "warehouse resolution failed");
                self.store.remove(keys::WAREHOUSE_ID);
                return Err(error);
            }
        };

        let serviceable = response
            .get("serviceable")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let warehouse_id = response
            .get("warehouse")
            .and_then(|warehouse| warehouse.get("id"))
            .and_then(|id| match id {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        match (serviceable, warehouse_id) {
            (true, Some(id)) => {
                debug!(warehouse_id = %id, "location serviceable");
                self.store.set(keys::WAREHOUSE_ID, id.clone());
                Ok(WarehouseResolution::Serviceable(WarehouseId::new(id)))
            }
            _ => {
                self.store.remove(keys::WAREHOUSE_ID);
                let error = ApiError::ServiceUnavailable(
                    "Sorry, we do not deliver to this location yet.".to_string(),
                );
                report_error(&error, FIND_SERVICEABLE_ENDPOINT);
                Err(error)
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Stored browsing context, if any.
    #[must_use]
    pub fn service_context(&self) -> Option<ServiceContext> {
        storage::get_record(self.store.as_ref(), keys::SERVICE_CONTEXT)
    }

    /// Stored delivery context, if any.
    #[must_use]
    pub fn delivery_context(&self) -> Option<DeliveryContext> {
        storage::get_record(self.store.as_ref(), keys::DELIVERY_CONTEXT)
    }

    /// Current context state.
    #[must_use]
    pub fn state(&self) -> LocationState {
        match (
            self.delivery_context().is_some(),
            self.service_context().is_some(),
        ) {
            (true, _) => LocationState::ServiceAndDelivery,
            (false, true) => LocationState::ServiceOnly,
            (false, false) => LocationState::NoContext,
        }
    }

    /// Warehouse resolved for the current coordinates, if any. Precondition
    /// token for cart mutations and order placement.
    #[must_use]
    pub fn current_warehouse(&self) -> Option<WarehouseId> {
        self.store.get(keys::WAREHOUSE_ID).map(WarehouseId::new)
    }

    /// Display label for the current location.
    ///
    /// The delivery context takes precedence, the service context is the
    /// fallback, otherwise the default placeholder.
    #[must_use]
    pub fn current_label(&self) -> String {
        if let Some(delivery) = self.delivery_context() {
            let area = if delivery.area_name.is_empty() {
                delivery.city
            } else {
                delivery.area_name
            };
            return format!("{} \u{2022} {}", delivery.label, area);
        }

        if let Some(service) = self.service_context() {
            if service.city.is_empty() {
                return service.area_name;
            }
            return format!("{}, {}", service.area_name, service.city);
        }

        DEFAULT_LOCATION_LABEL.to_string()
    }

    fn notify_location_changed(&self) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_location_changed();
        }
    }
}
