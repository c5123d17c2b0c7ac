//! Vendor drivers
//!
//! A driver speaks to one vendor API. Drivers are created by a [`DriverFactory`]
//! from a provider's credentials and are used through the object-safe
//! [`NodeDriver`] trait, so built-in and plugin vendors are interchangeable.

pub mod dummy;
pub mod http;

pub use dummy::{DummyDriver, DummyDriverFactory};
pub use http::{HttpDriver, HttpDriverFactory};

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{CreateFeature, Provider, VendorImage, VendorLocation, VendorNode, VendorSize};

/// Credentials handed to a driver factory
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Vendors authenticated by a single key
    Single(String),
    /// Vendors authenticated by a key pair
    Pair(String, String),
}

impl Credentials {
    /// One key when the secret is empty, two otherwise
    pub fn from_provider(provider: &Provider) -> Self {
        if provider.secret_key.is_empty() {
            Credentials::Single(provider.access_key.clone())
        } else {
            Credentials::Pair(provider.access_key.clone(), provider.secret_key.clone())
        }
    }

    pub fn access_key(&self) -> &str {
        match self {
            Credentials::Single(key) | Credentials::Pair(key, _) => key,
        }
    }

    pub fn secret_key(&self) -> Option<&str> {
        match self {
            Credentials::Single(_) => None,
            Credentials::Pair(_, secret) => Some(secret),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Single(key) => f.debug_tuple("Single").field(key).finish(),
            Credentials::Pair(key, _) => f.debug_tuple("Pair").field(key).field(&"***").finish(),
        }
    }
}

/// Authentication installed on a node at creation time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NodeAuth {
    SshKey(String),
    Password(String),
}

/// Arguments of a node creation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateNodeRequest {
    pub name: String,
    pub image: VendorImage,
    pub size: VendorSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<VendorLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<NodeAuth>,
    /// Free-form vendor arguments
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Post-boot deployment run by `deploy_node`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Deployment {
    /// Install an OpenSSH public key for root
    SshKey { key: String },
}

/// Uniform interface over a vendor API
#[async_trait]
pub trait NodeDriver: Send + Sync {
    /// Node-creation features the vendor declares
    fn features(&self) -> &[CreateFeature];

    async fn list_nodes(&self) -> Result<Vec<VendorNode>>;

    async fn list_images(&self) -> Result<Vec<VendorImage>>;

    async fn list_locations(&self) -> Result<Vec<VendorLocation>>;

    async fn list_sizes(&self) -> Result<Vec<VendorSize>>;

    /// Create a node and return it as the vendor reports it
    async fn create_node(&self, request: CreateNodeRequest) -> Result<VendorNode>;

    /// Create a node, then run a deployment on it once it boots
    async fn deploy_node(
        &self,
        request: CreateNodeRequest,
        deployment: Deployment,
    ) -> Result<VendorNode>;

    /// Reboot a node; `false` means the vendor refused
    async fn reboot_node(&self, node: &VendorNode) -> Result<bool>;

    /// Destroy a node; `false` means the vendor refused
    async fn destroy_node(&self, node: &VendorNode) -> Result<bool>;
}

/// Builds connected drivers for one provider type
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn connect(
        &self,
        provider_type: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn NodeDriver>>;
}
