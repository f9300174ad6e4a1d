//! Key-value storage abstraction.
//!
//! The browser original persisted everything in local storage; here the same
//! records live behind the [`KeyValueStore`] trait so the pipeline and the
//! location manager can be driven against an in-memory fake in tests and a
//! platform-appropriate store in production.
//!
//! All structured records are stored JSON-encoded under the keys in [`keys`].

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage keys shared by the pipeline and the services.
pub mod keys {
    /// Short-lived bearer token.
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Longer-lived refresh token.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Cached customer profile blob.
    pub const USER: &str = "user_data";
    /// Legacy single-record location blob, kept for older sessions.
    pub const LEGACY_LOCATION: &str = "user_location_data";
    /// Warehouse resolved for the current coordinates.
    pub const WAREHOUSE_ID: &str = "current_warehouse_id";
    /// Browsing location (map pin / mirrored address coordinates).
    pub const SERVICE_CONTEXT: &str = "app_service_context";
    /// Confirmed delivery address selected for checkout.
    pub const DELIVERY_CONTEXT: &str = "app_delivery_context";
}

/// Process-wide key-value storage capability.
///
/// Object-safe so components can hold an `Arc<dyn KeyValueStore>` without
/// depending on a concrete store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: String);

    /// Remove a value if present.
    fn remove(&self, key: &str);

    /// Remove everything. Used on hard logout.
    fn clear(&self);
}

/// Read a JSON-encoded record.
///
/// A present-but-unparsable record is treated as absent; the writer side
/// always goes through [`set_record`], so this only happens when a different
/// (legacy) writer produced the value.
pub fn get_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(key, %error, "discarding unreadable stored record");
            None
        }
    }
}

/// Write a JSON-encoded record.
pub fn set_record<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, raw),
        Err(error) => tracing::error!(key, %error, "failed to encode record"),
    }
}

/// In-memory store used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}
