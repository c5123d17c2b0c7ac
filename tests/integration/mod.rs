//! Integration tests for nimbus
//!
//! These tests drive the provider service against the mock vendor with a real
//! SQLite database per test.

mod catalog_tests;
mod plugin_driver_tests;
mod provider_tests;
