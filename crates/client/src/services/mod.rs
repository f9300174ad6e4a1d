//! Domain services layered on the request pipeline.
//!
//! Each service owns its endpoints and DTOs; presentation layers talk to
//! these rather than to [`ApiClient`](crate::api::ApiClient) directly.

pub mod addresses;
pub mod bootstrap;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod profile;

pub use addresses::AddressService;
pub use bootstrap::BootstrapService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use profile::ProfileService;
