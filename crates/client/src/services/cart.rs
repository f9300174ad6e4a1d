//! Cart operations.
//!
//! Item mutations are gated locally on a resolved warehouse: without one the
//! call fails fast with a user-facing message and no network traffic. A
//! cross-warehouse conflict from the backend is recoverable through a
//! user-confirmed destructive retry, modeled as a bounded state machine
//! (`Initial -> ConflictPendingConfirmation -> Retried`) rather than
//! recursion: the forced retry happens exactly once.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use zipcart_core::SkuCode;

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::storage::{KeyValueStore, keys};

/// Confirmation capability for destructive retries. The presentation layer
/// implements this with its dialog of choice.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// Ask the user to confirm; `true` proceeds.
    async fn confirm(&self, message: &str) -> bool;
}

/// Notified with the new item count after a successful cart sync.
pub trait CartObserver: Send + Sync {
    fn on_cart_updated(&self, count: usize);
}

/// Cart as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// One cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub sku: SkuCode,
    pub quantity: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Add/update attempt progression. The conflict branch is taken at most
/// once; a conflict on the retried attempt surfaces to the caller.
#[derive(Debug)]
enum AddAttempt {
    Initial,
    ConflictPendingConfirmation,
    Retried,
}

/// Client for the cart endpoints.
pub struct CartService {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    prompt: Arc<dyn ConfirmPrompt>,
    observers: RwLock<Vec<Arc<dyn CartObserver>>>,
}

impl CartService {
    #[must_use]
    pub fn new(api: ApiClient, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        let store = api.store();
        Self {
            api,
            store,
            prompt,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer for item-count changes.
    pub fn subscribe(&self, observer: Arc<dyn CartObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Read the current cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_cart(&self) -> Result<Cart, ApiError> {
        self.api
            .request_as("/orders/cart/", reqwest::Method::GET, None)
            .await
    }

    /// Add an item (or set its quantity).
    ///
    /// Fails fast with [`ApiError::LocationRequired`] when no warehouse is
    /// resolved - this guard is local, no network call is made. On a
    /// cross-warehouse conflict the user is asked to confirm clearing the
    /// existing cart; confirmation retries the same add once with the
    /// force-clear flag, decline fails with [`ApiError::Cancelled`].
    ///
    /// # Errors
    ///
    /// `LocationRequired`, `Conflict` (conflict persisting after the forced
    /// retry), `Cancelled`, or any pipeline error.
    #[instrument(skip(self), fields(sku = %sku, quantity))]
    pub async fn add_item(&self, sku: &SkuCode, quantity: u32) -> Result<Cart, ApiError> {
        let Some(warehouse_id) = self.store.get(keys::WAREHOUSE_ID) else {
            return Err(ApiError::LocationRequired);
        };

        let mut attempt = AddAttempt::Initial;

        loop {
            let force_clear = matches!(attempt, AddAttempt::Retried);
            let result = self
                .api
                .post(
                    "/orders/cart/add/",
                    json!({
                        "sku": sku,
                        "quantity": quantity,
                        "warehouse_id": warehouse_id,
                        "force_clear": force_clear,
                    }),
                )
                .await;

            match result {
                Ok(value) => {
                    let cart: Cart = serde_json::from_value(value)?;
                    self.sync_count().await;
                    return Ok(cart);
                }
                Err(ApiError::Conflict(message))
                    if matches!(attempt, AddAttempt::Initial) =>
                {
                    attempt = AddAttempt::ConflictPendingConfirmation;
                    debug!(state = ?attempt, "cart conflict, awaiting confirmation");
                    if self.prompt.confirm(&message).await {
                        attempt = AddAttempt::Retried;
                    } else {
                        return Err(ApiError::Cancelled);
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Set an item's quantity.
    ///
    /// # Errors
    ///
    /// See [`Self::add_item`].
    pub async fn update_item(&self, sku: &SkuCode, quantity: u32) -> Result<Cart, ApiError> {
        self.add_item(sku, quantity).await
    }

    /// Remove an item (quantity zero).
    ///
    /// # Errors
    ///
    /// See [`Self::add_item`].
    pub async fn remove_item(&self, sku: &SkuCode) -> Result<Cart, ApiError> {
        self.add_item(sku, 0).await
    }

    /// Best-effort background sync of the item count.
    ///
    /// Never fails the caller: a signed-out session broadcasts zero, a
    /// failed read logs and leaves the previous count alone.
    pub async fn sync_count(&self) {
        if self.store.get(keys::ACCESS_TOKEN).is_none() {
            self.notify_cart_updated(0);
            return;
        }

        match self.get_cart().await {
            Ok(cart) => self.notify_cart_updated(cart.items.len()),
            Err(error) => warn!(%error, "cart count sync failed"),
        }
    }

    fn notify_cart_updated(&self, count: usize) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_cart_updated(count);
        }
    }
}
