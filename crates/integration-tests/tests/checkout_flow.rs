//! Cart and order placement driven end to end through the location manager.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use zipcart_core::{AddressId, Coordinates, DeliveryContext, SkuCode};

use zipcart_client::ApiClient;
use zipcart_client::config::ClientConfig;
use zipcart_client::error::ApiError;
use zipcart_client::location::{LocationManager, LocationState};
use zipcart_client::services::cart::{CartService, ConfirmPrompt};
use zipcart_client::services::orders::{OrderService, PaymentMethod};
use zipcart_client::storage::{KeyValueStore, MemoryStore, keys};
use zipcart_client::testing::ScriptedTransport;

struct AlwaysConfirm;

#[async_trait]
impl ConfirmPrompt for AlwaysConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

fn home_address() -> DeliveryContext {
    DeliveryContext {
        address_id: AddressId::new("addr_7"),
        coords: Coordinates::new(12.93, 77.61),
        city: "Bengaluru".to_string(),
        label: "Home".to_string(),
        area_name: "Koramangala".to_string(),
        full_address: "42, 5th Block, Koramangala, Bengaluru".to_string(),
    }
}

fn signed_in_client(transport: Arc<ScriptedTransport>) -> ApiClient {
    let store = MemoryStore::new();
    store.set(keys::ACCESS_TOKEN, "tok".to_string());
    store.set(keys::REFRESH_TOKEN, "ref".to_string());
    ApiClient::new(
        &ClientConfig::for_tests(),
        transport as Arc<dyn zipcart_client::api::transport::Transport>,
        Arc::new(store),
    )
}

#[tokio::test]
async fn test_cart_and_order_blocked_until_location_resolves() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = signed_in_client(Arc::clone(&transport));
    let cart = CartService::new(client.clone(), Arc::new(AlwaysConfirm));
    let orders = OrderService::new(client);

    let error = cart.add_item(&SkuCode::new("SKU-1"), 1).await.unwrap_err();
    assert!(matches!(error, ApiError::LocationRequired));

    let error = orders
        .create_order(&AddressId::new("addr_7"), PaymentMethod::CashOnDelivery)
        .await
        .unwrap_err();
    assert!(matches!(error, ApiError::LocationRequired));

    // Both guards are local
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_full_checkout_clears_delivery_context() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.always(
        Method::POST,
        "/api/v1/warehouse/find-serviceable/",
        200,
        &json!({ "serviceable": true, "warehouse": { "id": "wh_7" } }),
    );
    // First add hits a cross-warehouse conflict; the confirmed retry lands
    transport.respond(
        Method::POST,
        "/api/v1/orders/cart/add/",
        409,
        &json!({
            "code": "warehouse_conflict",
            "detail": "Your cart contains items from a different store. Clear it to continue?"
        }),
    );
    transport.always(
        Method::POST,
        "/api/v1/orders/cart/add/",
        200,
        &json!({ "items": [{ "sku": "SKU-1", "quantity": 2 }] }),
    );
    transport.always(
        Method::GET,
        "/api/v1/orders/cart/",
        200,
        &json!({ "items": [{ "sku": "SKU-1", "quantity": 2 }] }),
    );
    transport.always(
        Method::POST,
        "/api/v1/orders/create/",
        201,
        &json!({ "order_id": "ord_42" }),
    );

    let client = signed_in_client(Arc::clone(&transport));
    let store = client.store();
    let location = LocationManager::new(client.clone());
    let cart = CartService::new(client.clone(), Arc::new(AlwaysConfirm));
    let orders = OrderService::new(client);

    location.set_delivery_context(home_address()).await.unwrap();
    assert_eq!(store.get(keys::WAREHOUSE_ID).as_deref(), Some("wh_7"));

    let updated = cart.add_item(&SkuCode::new("SKU-1"), 2).await.unwrap();
    assert_eq!(updated.items.len(), 1);

    let adds: Vec<_> = transport
        .requests()
        .into_iter()
        .filter(|request| request.url.ends_with("/orders/cart/add/"))
        .collect();
    assert_eq!(adds.len(), 2);
    assert_eq!(adds[0].body.as_ref().unwrap()["force_clear"], false);
    assert_eq!(adds[1].body.as_ref().unwrap()["force_clear"], true);
    assert_eq!(adds[1].body.as_ref().unwrap()["warehouse_id"], "wh_7");

    let created = orders
        .create_order(&AddressId::new("addr_7"), PaymentMethod::CashOnDelivery)
        .await
        .unwrap();
    assert_eq!(created.order_id.as_str(), "ord_42");

    // Checkout consumed the one-shot delivery target; browsing context stays
    assert!(location.delivery_context().is_none());
    assert_eq!(location.state(), LocationState::ServiceOnly);
    assert_eq!(location.current_label(), "Koramangala, Bengaluru");
}
