//! ZipCart storefront client library.
//!
//! Talks to the ZipCart REST backend (`/api/v1`) on behalf of a storefront
//! frontend: authenticated requests with automatic token refresh, the
//! service/delivery location context machine, and the domain services built
//! on top (catalog, cart, addresses, orders, profile).
//!
//! Presentation concerns (rendering, map chrome, toasts, the payment-gateway
//! SDK) live outside this crate; they consume it through the observer and
//! prompt traits it exposes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod location;
pub mod services;
pub mod storage;
pub mod testing;

pub use api::ApiClient;
pub use error::{ApiError, Result};
pub use location::LocationManager;
