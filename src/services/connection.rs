//! Provider connection adapter
//!
//! Resolves a driver for a provider type, holds the connected driver and exposes
//! a uniform set of inventory and node operations on top of it. Node creation picks
//! a strategy from the features the driver declares.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::deploy_key::DeployKey;
use super::drivers::{
    CreateNodeRequest, Credentials, Deployment, DriverFactory, DummyDriverFactory,
    HttpDriverFactory, NodeAuth, NodeDriver,
};
use crate::config::PluginConfig;
use crate::models::{
    get_state, CreateFeature, ExtraParam, NodeForm, Provider, SpawnedNode, VendorImage,
    VendorLocation, VendorNode, VendorSize,
};
use crate::utils::{OperationError, ProvisionError, ProvisionResult};

/// Form keys consumed by the adapter itself and never forwarded to vendors
const RESERVED_FORM_FIELDS: [&str; 4] = ["name", "image", "flavor", "realm"];

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789'\"!@#$%&*()-_=+[{}]~^,<.>;:/?";

// ============================================================================
// Driver registry
// ============================================================================

/// Maps provider types to driver factories.
///
/// Built-in factories are consulted before plugin factories.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    builtin: HashMap<String, Arc<dyn DriverFactory>>,
    plugins: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Registry without any driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the drivers shipped in nimbus
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_builtin("DUMMY", Arc::new(DummyDriverFactory));
        registry
    }

    /// Built-in drivers plus one HTTP driver per configured plugin
    pub fn from_config(plugins: &[PluginConfig]) -> Self {
        let mut registry = Self::with_builtin();
        for plugin in plugins {
            registry.register_plugin(
                &plugin.provider_type,
                Arc::new(HttpDriverFactory::new(plugin)),
            );
        }
        registry
    }

    pub fn register_builtin(&mut self, provider_type: &str, factory: Arc<dyn DriverFactory>) {
        self.builtin.insert(provider_type.to_string(), factory);
    }

    pub fn register_plugin(&mut self, provider_type: &str, factory: Arc<dyn DriverFactory>) {
        self.plugins.insert(provider_type.to_string(), factory);
    }

    /// Find the factory serving a provider type
    pub fn resolve(&self, provider_type: &str) -> ProvisionResult<Arc<dyn DriverFactory>> {
        self.builtin
            .get(provider_type)
            .or_else(|| self.plugins.get(provider_type))
            .cloned()
            .ok_or_else(|| ProvisionError::UnknownProvider(provider_type.to_string()))
    }
}

// ============================================================================
// Creation strategy
// ============================================================================

/// How a node gets its access credentials installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStrategy {
    /// Pass the deploy key to the vendor at creation
    SshKey,
    /// Vendor generates a password; push the deploy key post-boot
    GeneratedPassword,
    /// Send a random root password and push the deploy key post-boot
    Password,
    /// Plain create with the extra form fields and the provider extra parameter
    Plain,
}

impl CreateStrategy {
    /// Pick the strategy from declared features, first match wins
    pub fn select(features: &[CreateFeature]) -> Self {
        if features.contains(&CreateFeature::SshKey) {
            CreateStrategy::SshKey
        } else if features.contains(&CreateFeature::GeneratesPassword) {
            CreateStrategy::GeneratedPassword
        } else if features.contains(&CreateFeature::Password) {
            CreateStrategy::Password
        } else {
            CreateStrategy::Plain
        }
    }

    pub fn needs_deploy_key(&self) -> bool {
        !matches!(self, CreateStrategy::Plain)
    }
}

/// Random root password over letters, digits and punctuation
pub fn generate_random_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

// ============================================================================
// Connection
// ============================================================================

/// A live connection to one provider account.
///
/// Not meant for concurrent use: callers serialize operations on a provider.
pub struct ProviderConnection {
    provider_type: String,
    extra_param: Option<ExtraParam>,
    driver: Box<dyn NodeDriver>,
    deploy_key: Option<DeployKey>,
    password_length: usize,
}

impl ProviderConnection {
    /// Resolve the driver for the provider type and connect with its credentials
    pub async fn open(
        provider: &Provider,
        drivers: &DriverRegistry,
        deploy_key: Option<DeployKey>,
        password_length: usize,
    ) -> ProvisionResult<Self> {
        let factory = drivers.resolve(&provider.provider_type)?;
        let credentials = Credentials::from_provider(provider);

        let driver = factory
            .connect(&provider.provider_type, &credentials)
            .await
            .map_err(|e| {
                warn!("Failed to connect provider {}: {:#}", provider.name, e);
                ProvisionError::Connection(format!("{}: {:#}", provider.name, e))
            })?;

        info!(
            "Connected provider {} ({})",
            provider.name, provider.provider_type
        );
        Ok(Self::with_driver(provider, driver, deploy_key, password_length))
    }

    /// Wrap an already connected driver
    pub fn with_driver(
        provider: &Provider,
        driver: Box<dyn NodeDriver>,
        deploy_key: Option<DeployKey>,
        password_length: usize,
    ) -> Self {
        Self {
            provider_type: provider.provider_type.clone(),
            extra_param: provider.extra_param.clone(),
            driver,
            deploy_key,
            password_length,
        }
    }

    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    pub fn features(&self) -> &[CreateFeature] {
        self.driver.features()
    }

    /// Live nodes, each carrying a uuid
    pub async fn list_nodes(&self) -> ProvisionResult<Vec<VendorNode>> {
        let nodes = self.driver.list_nodes().await.map_err(vendor_error)?;
        Ok(nodes
            .into_iter()
            .map(|n| n.with_derived_uuid(&self.provider_type))
            .collect())
    }

    /// Live images; EC2 types only list machine images
    pub async fn list_images(&self) -> ProvisionResult<Vec<VendorImage>> {
        let images = self.driver.list_images().await.map_err(vendor_error)?;
        if self.provider_type.starts_with("EC2") {
            return Ok(images
                .into_iter()
                .filter(|image| image.id.starts_with("ami"))
                .collect());
        }
        Ok(images)
    }

    pub async fn list_locations(&self) -> ProvisionResult<Vec<VendorLocation>> {
        self.driver.list_locations().await.map_err(vendor_error)
    }

    pub async fn list_sizes(&self) -> ProvisionResult<Vec<VendorSize>> {
        self.driver.list_sizes().await.map_err(vendor_error)
    }

    /// Create a node from operator input
    pub async fn create_node(&self, form: &NodeForm) -> ProvisionResult<SpawnedNode> {
        let image = self
            .list_images()
            .await?
            .into_iter()
            .find(|i| i.id == form.image)
            .ok_or_else(|| ProvisionError::NotFound(format!("Image {}", form.image)))?;

        let size = self
            .list_sizes()
            .await?
            .into_iter()
            .find(|s| s.id == form.flavor)
            .ok_or_else(|| ProvisionError::NotFound(format!("Flavor {}", form.flavor)))?;

        let location = match form.realm.as_deref().filter(|r| !r.is_empty()) {
            Some(realm) => Some(
                self.list_locations()
                    .await?
                    .into_iter()
                    .find(|l| l.id == realm)
                    .ok_or_else(|| ProvisionError::NotFound(format!("Realm {}", realm)))?,
            ),
            None => None,
        };

        let mut request = CreateNodeRequest {
            name: form.name.clone(),
            image,
            size,
            location,
            auth: None,
            extra: Default::default(),
        };

        let strategy = CreateStrategy::select(self.driver.features());
        debug!("Creating node {} with strategy {:?}", form.name, strategy);

        let deploy_key = match (strategy.needs_deploy_key(), &self.deploy_key) {
            (true, Some(key)) => Some(key.as_openssh().to_string()),
            (true, None) => {
                return Err(ProvisionError::Config(format!(
                    "{} nodes need a deploy key but none is configured",
                    self.provider_type
                )))
            }
            (false, _) => None,
        };

        let result = match (strategy, deploy_key) {
            (CreateStrategy::SshKey, Some(key)) => {
                request.auth = Some(NodeAuth::SshKey(key));
                self.driver.create_node(request).await
            }
            (CreateStrategy::GeneratedPassword, Some(key)) => {
                self.driver
                    .deploy_node(request, Deployment::SshKey { key })
                    .await
            }
            (CreateStrategy::Password, Some(key)) => {
                request.auth = Some(NodeAuth::Password(generate_random_password(
                    self.password_length,
                )));
                self.driver
                    .deploy_node(request, Deployment::SshKey { key })
                    .await
            }
            _ => {
                request.extra = form
                    .extra
                    .iter()
                    .filter(|(k, _)| !RESERVED_FORM_FIELDS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if let Some(param) = &self.extra_param {
                    request.extra.insert(param.name.clone(), param.value.clone());
                }
                self.driver.create_node(request).await
            }
        };

        let node = result
            .map_err(|e| {
                error!("Failed to create node {}: {:#}", form.name, e);
                vendor_error(e)
            })?
            .with_derived_uuid(&self.provider_type);

        Ok(SpawnedNode {
            public_ip: node.primary_public_ip(),
            uuid: node.uuid,
            state: get_state(node.state),
            extra: node.extra,
        })
    }

    /// Reboot the live node with the given uuid
    pub async fn reboot_node(&self, uuid: &str) -> Result<(), OperationError> {
        let node = self.find_live(uuid).await?;
        match self.driver.reboot_node(&node).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(OperationError::Rejected {
                action: "reboot",
                uuid: uuid.to_string(),
            }),
            Err(e) => Err(vendor_error(e).into()),
        }
    }

    /// Destroy the live node with the given uuid
    pub async fn destroy_node(&self, uuid: &str) -> Result<(), OperationError> {
        let node = self.find_live(uuid).await?;
        match self.driver.destroy_node(&node).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(OperationError::Rejected {
                action: "destroy",
                uuid: uuid.to_string(),
            }),
            Err(e) => Err(vendor_error(e).into()),
        }
    }

    // Linear scan over the live inventory
    async fn find_live(&self, uuid: &str) -> Result<VendorNode, OperationError> {
        self.list_nodes()
            .await?
            .into_iter()
            .find(|n| n.uuid == uuid)
            .ok_or_else(|| OperationError::NodeNotFound(uuid.to_string()))
    }
}

fn vendor_error(err: anyhow::Error) -> ProvisionError {
    ProvisionError::Vendor(format!("{:#}", err))
}
