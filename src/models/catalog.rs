//! Vendor catalog models (images, locations, sizes)
//!
//! Catalog rows are keyed by `(provider_id, vendor id)` and are refreshed on every
//! catalog import. They are never deleted when a vendor stops listing them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted machine image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub provider_id: String,
    /// Vendor-assigned image id
    pub image_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted vendor location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub provider_id: String,
    /// Vendor-assigned location id
    pub location_id: String,
    pub name: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted instance size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub id: String,
    pub provider_id: String,
    /// Vendor-assigned size id
    pub size_id: String,
    pub name: String,
    pub ram: Option<i64>,
    pub disk: Option<i64>,
    pub bandwidth: Option<i64>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which catalog an import touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Images,
    Locations,
    Sizes,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Images => "images",
            CatalogKind::Locations => "locations",
            CatalogKind::Sizes => "sizes",
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
