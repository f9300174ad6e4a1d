//! Integration tests for the ZipCart client.
//!
//! Scenario tests live under `tests/` and drive the real pipeline, location
//! manager, and services against a scripted transport
//! ([`zipcart_client::testing::ScriptedTransport`]) - no server required.
//!
//! # Test Categories
//!
//! - `refresh_flow` - single-flight credential refresh under concurrency
//! - `location_contexts` - service/delivery context transitions and the
//!   warehouse resolution race
//! - `checkout_flow` - cart guard, conflict recovery, and order placement
