//! Service/delivery context transitions and the warehouse resolution race.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::json;

use zipcart_core::{AddressId, Coordinates, DeliveryContext, ServiceContext};

use zipcart_client::config::ClientConfig;
use zipcart_client::error::ApiError;
use zipcart_client::location::{
    LocationManager, LocationState, ServiceOrigin, WarehouseResolution,
};
use zipcart_client::storage::{KeyValueStore, MemoryStore, keys};
use zipcart_client::testing::ScriptedTransport;
use zipcart_client::ApiClient;

const FIND_SERVICEABLE: &str = "/api/v1/warehouse/find-serviceable/";

fn manager(transport: Arc<ScriptedTransport>) -> (LocationManager, Arc<dyn KeyValueStore>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let client = ApiClient::new(
        &ClientConfig::for_tests(),
        transport as Arc<dyn zipcart_client::api::transport::Transport>,
        Arc::clone(&store),
    );
    (LocationManager::new(client), store)
}

fn serviceable(id: &str) -> serde_json::Value {
    json!({ "serviceable": true, "warehouse": { "id": id } })
}

fn pin(lat: f64, lng: f64) -> ServiceContext {
    ServiceContext {
        coords: Coordinates::new(lat, lng),
        city: "Bengaluru".to_string(),
        area_name: "Indiranagar".to_string(),
        formatted_address: "100 Feet Rd, Indiranagar, Bengaluru".to_string(),
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

#[tokio::test]
async fn test_map_pin_clears_confirmed_delivery_target() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_A"));
    transport.always(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_B"));

    let (manager, store) = manager(Arc::clone(&transport));

    manager.set_delivery_context(home_address()).await.unwrap();
    assert_eq!(manager.state(), LocationState::ServiceAndDelivery);
    assert_eq!(manager.current_label(), "Home \u{2022} Koramangala");

    // A free pin move must never leave a stale delivery target behind
    manager
        .set_service_context(pin(12.97, 77.59), ServiceOrigin::MapPin)
        .await
        .unwrap();

    assert_eq!(manager.state(), LocationState::ServiceOnly);
    assert!(manager.delivery_context().is_none());
    assert_eq!(manager.current_label(), "Indiranagar, Bengaluru");
    assert_eq!(store.get(keys::WAREHOUSE_ID).as_deref(), Some("wh_B"));
}

#[tokio::test]
async fn test_saved_address_origin_preserves_delivery_target() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.always(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_A"));

    let (manager, _store) = manager(Arc::clone(&transport));

    let address = home_address();
    manager.set_delivery_context(address.clone()).await.unwrap();
    manager
        .set_service_context(address.to_service_context(), ServiceOrigin::SavedAddress)
        .await
        .unwrap();

    assert_eq!(manager.state(), LocationState::ServiceAndDelivery);
    assert_eq!(manager.delivery_context().unwrap().address_id, address.address_id);
}

#[tokio::test]
async fn test_delivery_selection_mirrors_service_context() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.always(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_A"));

    let (manager, _store) = manager(Arc::clone(&transport));

    let address = home_address();
    let resolution = manager.set_delivery_context(address.clone()).await.unwrap();
    assert!(matches!(resolution, WarehouseResolution::Serviceable(_)));

    // Browsing context follows the checkout location
    let service = manager.service_context().unwrap();
    assert_eq!(service.coords, address.coords);
    assert_eq!(service.formatted_address, address.full_address);

    // Re-selecting the same address is idempotent and re-resolves
    manager.set_delivery_context(address).await.unwrap();
    assert_eq!(transport.count(&Method::POST, FIND_SERVICEABLE), 2);
    assert_eq!(manager.state(), LocationState::ServiceAndDelivery);
}

#[tokio::test]
async fn test_unserviceable_location_clears_stored_warehouse() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_A"));
    transport.always(
        Method::POST,
        FIND_SERVICEABLE,
        200,
        &json!({ "serviceable": false }),
    );

    let (manager, store) = manager(Arc::clone(&transport));

    manager
        .set_service_context(pin(12.97, 77.59), ServiceOrigin::MapPin)
        .await
        .unwrap();
    assert_eq!(store.get(keys::WAREHOUSE_ID).as_deref(), Some("wh_A"));

    // Serviceable then not: no stale id may survive
    let error = manager
        .set_service_context(pin(28.61, 77.20), ServiceOrigin::MapPin)
        .await
        .unwrap_err();
    assert!(matches!(error, ApiError::ServiceUnavailable(_)));
    assert!(store.get(keys::WAREHOUSE_ID).is_none());
    assert!(manager.current_warehouse().is_none());

    // The context itself persisted regardless, so the UI can show the pin
    assert_eq!(manager.state(), LocationState::ServiceOnly);
}

#[tokio::test]
async fn test_superseded_resolution_is_discarded() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_OLD"));
    transport.respond(Method::POST, FIND_SERVICEABLE, 200, &serviceable("wh_NEW"));
    let gate = transport.gate(Method::POST, FIND_SERVICEABLE);

    let (manager, store) = manager(Arc::clone(&transport));
    let manager = Arc::new(manager);

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .resolve_warehouse(Coordinates::new(12.97, 77.59), "Bengaluru")
                .await
        })
    };
    wait_for_count(&transport, 1).await;

    let second = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .resolve_warehouse(Coordinates::new(12.93, 77.61), "Bengaluru")
                .await
        })
    };
    wait_for_count(&transport, 2).await;

    // Release both in-flight lookups; only the newest may touch storage
    gate.add_permits(2);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(first, WarehouseResolution::Superseded);
    assert!(matches!(second, WarehouseResolution::Serviceable(_)));
    assert_eq!(store.get(keys::WAREHOUSE_ID).as_deref(), Some("wh_NEW"));
}

async fn wait_for_count(transport: &Arc<ScriptedTransport>, expected: usize) {
    for _ in 0..200 {
        if transport.count(&Method::POST, FIND_SERVICEABLE) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {expected} serviceability lookups");
}
