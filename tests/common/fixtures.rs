//! Test fixtures for common test data
//!
//! Fixed catalogs and forms shared across the integration and BDD suites.

use std::collections::BTreeMap;

use serde_json::Value;

use nimbus::models::{ExtraData, NodeForm, VendorImage, VendorLocation, VendorSize};

/// Deploy key installed on nodes spawned in tests
pub const TEST_PUBLIC_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8g deploy@nimbus";

/// Images `img-1` to `img-{count}`
pub fn images(count: usize) -> Vec<VendorImage> {
    (1..=count)
        .map(|i| VendorImage {
            id: format!("img-{}", i),
            name: format!("Image {}", i),
        })
        .collect()
}

pub fn locations() -> Vec<VendorLocation> {
    vec![
        VendorLocation {
            id: "eu-1".to_string(),
            name: "Frankfurt".to_string(),
            country: "DE".to_string(),
        },
        VendorLocation {
            id: "us-1".to_string(),
            name: "Virginia".to_string(),
            country: "US".to_string(),
        },
    ]
}

pub fn sizes() -> Vec<VendorSize> {
    vec![
        VendorSize {
            id: "small".to_string(),
            name: "Small".to_string(),
            ram: Some(1024),
            disk: Some(20),
            bandwidth: None,
            price: Some(0.01),
        },
        VendorSize {
            id: "large".to_string(),
            name: "Large".to_string(),
            ram: Some(8192),
            disk: Some(160),
            bandwidth: Some(5000),
            price: Some(0.12),
        },
    ]
}

/// Spawn form against the fixture catalogs
pub fn node_form(name: &str) -> NodeForm {
    NodeForm {
        name: name.to_string(),
        image: "img-1".to_string(),
        flavor: "small".to_string(),
        realm: Some("eu-1".to_string()),
        extra: BTreeMap::new(),
    }
}

/// Vendor attributes from key/value pairs
pub fn extra(pairs: &[(&str, &str)]) -> ExtraData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
