//! Core types for ZipCart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod context;
pub mod coords;
pub mod id;

pub use context::{DeliveryContext, ServiceContext};
pub use coords::Coordinates;
pub use id::*;
