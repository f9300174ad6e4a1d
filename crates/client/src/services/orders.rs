//! Order placement, history, and payment verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use zipcart_core::{AddressId, OrderId, WarehouseId};

use crate::api::ApiClient;
use crate::error::{ApiError, add_breadcrumb};
use crate::storage::{KeyValueStore, keys};

/// Payment method selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    CashOnDelivery,
    Razorpay,
}

impl PaymentMethod {
    const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cod",
            Self::Razorpay => "razorpay",
        }
    }
}

/// Backend response to order creation. For gateway payments the gateway
/// order fields drive the payment sheet; for cash on delivery they are
/// absent.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// One order in the customer's history.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: String,
    pub final_amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrderListResponse {
    Paginated { results: Vec<Order> },
    Bare(Vec<Order>),
}

/// Gateway callback fields passed back for server-side verification.
#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub payment_id: String,
    pub gateway_order_id: String,
    pub signature: String,
}

/// Client for the order and payment endpoints.
pub struct OrderService {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
}

impl OrderService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let store = api.store();
        Self { api, store }
    }

    /// Place an order for the current cart.
    ///
    /// Requires a resolved warehouse; the guard is local and makes no
    /// network call. A successful cash-on-delivery order ends the checkout
    /// flow, so the one-shot delivery context is cleared.
    ///
    /// # Errors
    ///
    /// `LocationRequired` without a resolved warehouse, `Validation` for a
    /// rejected payload, or any pipeline error.
    #[instrument(skip(self), fields(address_id = %address_id, method = payment_method.as_str()))]
    pub async fn create_order(
        &self,
        address_id: &AddressId,
        payment_method: PaymentMethod,
    ) -> Result<OrderCreated, ApiError> {
        let Some(warehouse_id) = self.store.get(keys::WAREHOUSE_ID) else {
            return Err(ApiError::LocationRequired);
        };

        add_breadcrumb("checkout", "order creation started");

        let response = self
            .api
            .post(
                "/orders/create/",
                json!({
                    "delivery_address_id": address_id,
                    "warehouse_id": WarehouseId::new(warehouse_id),
                    "payment_method": payment_method.as_str(),
                    "delivery_type": "express",
                }),
            )
            .await?;
        let created: OrderCreated = serde_json::from_value(response)?;

        if payment_method == PaymentMethod::CashOnDelivery {
            self.store.remove(keys::DELIVERY_CONTEXT);
        }

        Ok(created)
    }

    /// Verify a gateway payment server-side.
    ///
    /// Gateway payments stay pending until this succeeds; the delivery
    /// context is cleared only once the payment is confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if verification is rejected or the request fails.
    #[instrument(skip(self, proof))]
    pub async fn verify_payment(&self, proof: &PaymentProof) -> Result<(), ApiError> {
        self.api
            .post(
                "/payments/verify/razorpay/",
                json!({
                    "razorpay_payment_id": proof.payment_id,
                    "razorpay_order_id": proof.gateway_order_id,
                    "razorpay_signature": proof.signature,
                }),
            )
            .await?;

        self.store.remove(keys::DELIVERY_CONTEXT);
        Ok(())
    }

    /// The customer's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn my_orders(&self, page_size: Option<u32>) -> Result<Vec<Order>, ApiError> {
        let endpoint = page_size.map_or_else(
            || "/orders/my/".to_string(),
            |size| format!("/orders/my/?page_size={size}"),
        );
        let response: OrderListResponse = self
            .api
            .request_as(&endpoint, reqwest::Method::GET, None)
            .await?;
        Ok(match response {
            OrderListResponse::Paginated { results } => results,
            OrderListResponse::Bare(orders) => orders,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStore;
    use crate::testing::ScriptedTransport;
    use reqwest::Method;
    use std::sync::Arc;

    fn orders(
        transport: Arc<ScriptedTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> OrderService {
        OrderService::new(ApiClient::new(
            &ClientConfig::for_tests(),
            transport,
            store,
        ))
    }

    #[tokio::test]
    async fn test_create_order_requires_warehouse() {
        let transport = Arc::new(ScriptedTransport::new());
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let service = orders(Arc::clone(&transport), store);

        let error = service
            .create_order(&AddressId::new("addr_1"), PaymentMethod::CashOnDelivery)
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::LocationRequired));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cod_success_clears_delivery_context() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.always(
            Method::POST,
            "/api/v1/orders/create/",
            201,
            &serde_json::json!({ "order_id": "ord_1" }),
        );

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::WAREHOUSE_ID, "wh_1".to_string());
        store.set(keys::DELIVERY_CONTEXT, "{}".to_string());

        let service = orders(Arc::clone(&transport), Arc::clone(&store));
        let created = service
            .create_order(&AddressId::new("addr_1"), PaymentMethod::CashOnDelivery)
            .await
            .unwrap();

        assert_eq!(created.order_id.as_str(), "ord_1");
        assert!(created.razorpay_order_id.is_none());
        assert!(store.get(keys::DELIVERY_CONTEXT).is_none());

        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["payment_method"], "cod");
        assert_eq!(body["delivery_type"], "express");
        assert_eq!(body["warehouse_id"], "wh_1");
    }

    #[tokio::test]
    async fn test_gateway_order_keeps_delivery_context_until_verified() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.always(
            Method::POST,
            "/api/v1/orders/create/",
            201,
            &serde_json::json!({
                "order_id": "ord_2",
                "razorpay_order_id": "rzp_9",
                "amount": 455.0,
                "currency": "INR"
            }),
        );
        transport.always(
            Method::POST,
            "/api/v1/payments/verify/razorpay/",
            200,
            &serde_json::json!({ "status": "verified" }),
        );

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::WAREHOUSE_ID, "wh_1".to_string());
        store.set(keys::DELIVERY_CONTEXT, "{}".to_string());

        let service = orders(Arc::clone(&transport), Arc::clone(&store));
        let created = service
            .create_order(&AddressId::new("addr_1"), PaymentMethod::Razorpay)
            .await
            .unwrap();
        assert_eq!(created.razorpay_order_id.as_deref(), Some("rzp_9"));

        // Pending payment: context survives
        assert!(store.get(keys::DELIVERY_CONTEXT).is_some());

        service
            .verify_payment(&PaymentProof {
                payment_id: "pay_1".to_string(),
                gateway_order_id: "rzp_9".to_string(),
                signature: "sig".to_string(),
            })
            .await
            .unwrap();
        assert!(store.get(keys::DELIVERY_CONTEXT).is_none());
    }

    #[tokio::test]
    async fn test_my_orders_passes_page_size() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.always(
            Method::GET,
            "/api/v1/orders/my/",
            200,
            &serde_json::json!({ "results": [{
                "id": "ord_1",
                "status": "delivered",
                "final_amount": 120.5,
                "created_at": "2026-08-27T09:30:00Z"
            }] }),
        );

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let service = orders(Arc::clone(&transport), store);

        let history = service.my_orders(Some(5)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "delivered");

        let url = transport.requests()[0].url.clone();
        assert!(url.ends_with("/orders/my/?page_size=5"));
    }
}
