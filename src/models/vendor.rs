//! Vendor-native records
//!
//! These are the shapes a vendor driver reports back. They are deliberately loose:
//! each vendor fills `extra` with whatever attributes it exposes, and the
//! reconciliation engine only reads a few well-known keys out of it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ExtraData;

/// A compute instance as listed by a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorNode {
    /// Vendor-assigned instance id
    pub id: String,
    /// Stable identity used to match the node against local rows
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    /// Numeric state code (see [`crate::models::get_state`])
    #[serde(default = "unknown_state_code")]
    pub state: i64,
    #[serde(default)]
    pub public_ips: Vec<String>,
    #[serde(default)]
    pub private_ips: Vec<String>,
    #[serde(default)]
    pub extra: ExtraData,
}

fn unknown_state_code() -> i64 {
    4
}

impl VendorNode {
    /// First public address, or an empty string when the vendor reports none
    pub fn primary_public_ip(&self) -> String {
        self.public_ips.first().cloned().unwrap_or_default()
    }

    /// Fill in a missing uuid from the vendor id and provider type
    pub fn with_derived_uuid(mut self, provider_type: &str) -> Self {
        if self.uuid.is_empty() {
            self.uuid = derive_node_uuid(&self.id, provider_type);
        }
        self
    }
}

/// Derive a stable node uuid as the SHA-256 hex digest of `"{id}:{provider_type}"`
pub fn derive_node_uuid(id: &str, provider_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(b":");
    hasher.update(provider_type.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Node-creation capabilities a vendor declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateFeature {
    /// Accepts an SSH public key at creation time
    SshKey,
    /// Generates a root password itself
    GeneratesPassword,
    /// Accepts a caller-chosen root password
    Password,
}

/// A machine image offered by a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorImage {
    pub id: String,
    pub name: String,
}

/// A datacenter/region offered by a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
}

/// An instance size/flavor offered by a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorSize {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ram: Option<i64>,
    #[serde(default)]
    pub disk: Option<i64>,
    #[serde(default)]
    pub bandwidth: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
}
