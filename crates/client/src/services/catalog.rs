//! Catalog reads.
//!
//! Location-aware storefront feed plus the generic home feed, category,
//! banner, brand, and flash-sale reads, and warehouse-scoped product detail.
//! Responses are cached in-memory via `moka` (5 minute TTL); coordinates and
//! the warehouse id are part of the cache key, so a location change never
//! serves stale pricing.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, instrument};

use zipcart_core::{Coordinates, SkuCode};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::storage::{KeyValueStore, keys};

/// Cached catalog responses.
#[derive(Clone)]
enum CacheValue {
    Feed(StorefrontFeed),
    HomePage(HomeFeed),
    Categories(Vec<Category>),
    Banners(Vec<Banner>),
    Brands(Vec<Brand>),
    FlashSales(Vec<FlashSaleItem>),
    Product(Box<Product>),
}

/// A product as the catalog endpoints return it. Prices are
/// warehouse-specific when the detail read is warehouse-scoped.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    pub sale_price: f64,
    #[serde(default)]
    pub mrp: Option<f64>,
}

/// Category tile.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Hero banner.
#[derive(Debug, Clone, Deserialize)]
pub struct Banner {
    pub image_url: String,
    #[serde(default)]
    pub target_url: Option<String>,
}

/// Brand tile.
#[derive(Debug, Clone, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Flash-sale entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FlashSaleItem {
    pub sku_id: String,
    pub sku_name: String,
    #[serde(default)]
    pub sku_image: Option<String>,
    pub discount_percent: f64,
}

/// One category section of a feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    #[serde(alias = "name")]
    pub category_name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Location-aware storefront feed.
///
/// `serviceable == false` means the coordinates are outside every delivery
/// area; the sections are empty and the UI should prompt for a new location.
#[derive(Debug, Clone, Deserialize)]
pub struct StorefrontFeed {
    pub serviceable: bool,
    #[serde(default)]
    pub categories: Vec<FeedSection>,
}

/// Paginated generic home feed.
#[derive(Debug, Clone, Deserialize)]
pub struct HomeFeed {
    #[serde(default)]
    pub sections: Vec<FeedSection>,
    #[serde(default)]
    pub has_next: bool,
}

/// Client for the catalog endpoints.
///
/// Reads are cached for 5 minutes.
pub struct CatalogService {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    cache: Cache<String, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        let store = api.store();
        Self { api, store, cache }
    }

    /// Location-aware storefront feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn storefront_feed(
        &self,
        coords: Coordinates,
        city: &str,
    ) -> Result<StorefrontFeed, ApiError> {
        let cache_key = format!("storefront:{coords}:{city}");

        if let Some(CacheValue::Feed(feed)) = self.cache.get(&cache_key).await {
            debug!("Cache hit for storefront feed");
            return Ok(feed);
        }

        let endpoint = format!(
            "/catalog/storefront/?lat={}&lon={}&city={}",
            coords.lat,
            coords.lng,
            urlencoding::encode(city)
        );
        let feed: StorefrontFeed = self.api.request_as(&endpoint, reqwest::Method::GET, None).await?;

        self.cache
            .insert(cache_key, CacheValue::Feed(feed.clone()))
            .await;

        Ok(feed)
    }

    /// One page of the generic home feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn home_feed(&self, page: u32) -> Result<HomeFeed, ApiError> {
        let cache_key = format!("home-feed:{page}");

        if let Some(CacheValue::HomePage(feed)) = self.cache.get(&cache_key).await {
            debug!("Cache hit for home feed");
            return Ok(feed);
        }

        let endpoint = format!("/catalog/home/feed/?page={page}");
        let feed: HomeFeed = self.api.request_as(&endpoint, reqwest::Method::GET, None).await?;

        self.cache
            .insert(cache_key, CacheValue::HomePage(feed.clone()))
            .await;

        Ok(feed)
    }

    /// All category tiles.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) = self.cache.get("categories").await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self
            .api
            .request_as("/catalog/categories/", reqwest::Method::GET, None)
            .await?;

        self.cache
            .insert(
                "categories".to_string(),
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Hero banners.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn banners(&self) -> Result<Vec<Banner>, ApiError> {
        if let Some(CacheValue::Banners(banners)) = self.cache.get("banners").await {
            debug!("Cache hit for banners");
            return Ok(banners);
        }

        let banners: Vec<Banner> = self
            .api
            .request_as("/catalog/banners/", reqwest::Method::GET, None)
            .await?;

        self.cache
            .insert("banners".to_string(), CacheValue::Banners(banners.clone()))
            .await;

        Ok(banners)
    }

    /// Brand tiles.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn brands(&self) -> Result<Vec<Brand>, ApiError> {
        if let Some(CacheValue::Brands(brands)) = self.cache.get("brands").await {
            debug!("Cache hit for brands");
            return Ok(brands);
        }

        let brands: Vec<Brand> = self
            .api
            .request_as("/catalog/brands/", reqwest::Method::GET, None)
            .await?;

        self.cache
            .insert("brands".to_string(), CacheValue::Brands(brands.clone()))
            .await;

        Ok(brands)
    }

    /// Active flash sales.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn flash_sales(&self) -> Result<Vec<FlashSaleItem>, ApiError> {
        if let Some(CacheValue::FlashSales(sales)) = self.cache.get("flash-sales").await {
            debug!("Cache hit for flash sales");
            return Ok(sales);
        }

        let sales: Vec<FlashSaleItem> = self
            .api
            .request_as("/catalog/flash-sales/", reqwest::Method::GET, None)
            .await?;

        self.cache
            .insert(
                "flash-sales".to_string(),
                CacheValue::FlashSales(sales.clone()),
            )
            .await;

        Ok(sales)
    }

    /// Product detail, scoped to the resolved warehouse when one is stored
    /// so pricing matches what the cart will charge.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn product(&self, sku: &SkuCode) -> Result<Product, ApiError> {
        let warehouse_id = self.store.get(keys::WAREHOUSE_ID);
        let cache_key = format!(
            "product:{sku}:{}",
            warehouse_id.as_deref().unwrap_or("")
        );

        if let Some(CacheValue::Product(product)) = self.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let endpoint = warehouse_id.map_or_else(
            || format!("/catalog/skus/{sku}/"),
            |id| format!("/catalog/skus/{sku}/?warehouse_id={id}"),
        );
        let product: Product = self.api.request_as(&endpoint, reqwest::Method::GET, None).await?;

        self.cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Invalidate all cached catalog data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
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
    use serde_json::json;

    fn catalog(transport: Arc<ScriptedTransport>) -> CatalogService {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        CatalogService::new(ApiClient::new(
            &ClientConfig::for_tests(),
            transport,
            store,
        ))
    }

    #[tokio::test]
    async fn test_storefront_feed_is_cached_per_location() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.always(
            Method::GET,
            "/api/v1/catalog/storefront/",
            200,
            &json!({ "serviceable": true, "categories": [] }),
        );

        let catalog = catalog(Arc::clone(&transport));
        let coords = Coordinates::new(12.97, 77.59);

        let first = catalog.storefront_feed(coords, "Bengaluru").await.unwrap();
        let second = catalog.storefront_feed(coords, "Bengaluru").await.unwrap();
        assert!(first.serviceable && second.serviceable);

        // Second read served from cache
        assert_eq!(transport.count(&Method::GET, "/api/v1/catalog/storefront/"), 1);

        // A different location misses the cache
        catalog
            .storefront_feed(Coordinates::new(13.0, 77.6), "Bengaluru")
            .await
            .unwrap();
        assert_eq!(transport.count(&Method::GET, "/api/v1/catalog/storefront/"), 2);
    }

    #[tokio::test]
    async fn test_product_detail_scoped_by_stored_warehouse() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.always(
            Method::GET,
            "/api/v1/catalog/skus/SKU-1/",
            200,
            &json!({ "name": "Milk 1L", "sale_price": 54.0 }),
        );

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::WAREHOUSE_ID, "wh_9".to_string());
        let catalog = CatalogService::new(ApiClient::new(
            &ClientConfig::for_tests(),
            Arc::clone(&transport) as Arc<dyn crate::api::transport::Transport>,
            store,
        ));

        let product = catalog.product(&SkuCode::new("SKU-1")).await.unwrap();
        assert_eq!(product.name, "Milk 1L");

        let url = transport.requests().first().unwrap().url.clone();
        assert!(url.ends_with("?warehouse_id=wh_9"));
    }
}
