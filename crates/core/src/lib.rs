//! ZipCart Core - Shared types library.
//!
//! This crate provides common types used across all ZipCart components:
//! - `client` - Storefront API client (pipeline, location, domain services)
//! - `integration-tests` - End-to-end scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, coordinates, and the
//!   service/delivery location contexts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
