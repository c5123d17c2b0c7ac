//! Provider service
//!
//! Entry point used by the CLI and any other front end. [`ProviderService`] manages
//! provider accounts; [`ProviderSession`] wraps one provider together with its lazily
//! opened vendor connection and runs sync and lifecycle operations against it.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, error, info};
use validator::Validate;

use super::capabilities::CapabilityRegistry;
use super::connection::{DriverRegistry, ProviderConnection};
use super::deploy_key::DeployKey;
use super::lifecycle::NodeLifecycle;
use super::reconcile::Reconciler;
use crate::config::AppConfig;
use crate::db::{migrations, CatalogRepository, NodeRepository, ProviderRepository};
use crate::models::{
    ActionKind, CatalogImport, Environment, Image, Location, NewProvider, Node, NodeForm,
    Provider, ProviderStatus, Size, StatusReport, SyncOutcome, SyncReport,
};
use crate::utils::validation::{validate_provider_name, validate_provider_type};
use crate::utils::{OperationError, ProvisionError, ProvisionResult};

/// Registries and settings shared by every provider session
pub struct ProvisioningContext {
    pub capabilities: CapabilityRegistry,
    pub drivers: DriverRegistry,
    pub deploy_key: Option<DeployKey>,
    pub import_creator: String,
    pub password_length: usize,
}

impl ProvisioningContext {
    /// Build registries from configuration and load the deploy key
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            capabilities: CapabilityRegistry::with_plugins(&config.plugins),
            drivers: DriverRegistry::from_config(&config.plugins),
            deploy_key: DeployKey::from_config(&config.provisioning)?,
            import_creator: config.provisioning.import_creator.clone(),
            password_length: config.provisioning.password_length,
        })
    }
}

/// Manages provider accounts
pub struct ProviderService {
    pool: SqlitePool,
    context: Arc<ProvisioningContext>,
    providers: ProviderRepository,
}

impl ProviderService {
    pub fn new(pool: SqlitePool, context: Arc<ProvisioningContext>) -> Self {
        Self {
            providers: ProviderRepository::new(pool.clone()),
            pool,
            context,
        }
    }

    pub fn context(&self) -> &ProvisioningContext {
        &self.context
    }

    /// Register a provider account.
    ///
    /// The vendor connection is established before anything is written, so bad
    /// credentials leave no row behind.
    pub async fn create_provider(&self, input: NewProvider) -> ProvisionResult<ProviderSession> {
        input.validate()?;
        if !validate_provider_name(&input.name) {
            return Err(ProvisionError::Validation(format!(
                "Invalid provider name: {}",
                input.name
            )));
        }
        if !validate_provider_type(&input.provider_type) {
            return Err(ProvisionError::Validation(format!(
                "Invalid provider type: {}",
                input.provider_type
            )));
        }

        let provider = Provider::new(
            &input.name,
            &input.provider_type,
            &input.access_key,
            &input.secret_key,
        );
        let mut session = self.session(provider);
        session.save().await?;

        info!(
            "Registered provider {} ({})",
            session.provider().name,
            session.provider().provider_type
        );
        Ok(session)
    }

    /// Open a session on a provider by name
    pub async fn open(&self, name: &str) -> ProvisionResult<ProviderSession> {
        let provider = self
            .providers
            .get_by_name(name)
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("Provider {}", name)))?;
        Ok(self.session(provider))
    }

    /// Open a session on a provider by id
    pub async fn open_by_id(&self, id: &str) -> ProvisionResult<ProviderSession> {
        let provider = self
            .providers
            .get_by_id(id)
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("Provider {}", id)))?;
        Ok(self.session(provider))
    }

    pub async fn list_providers(&self) -> ProvisionResult<Vec<Provider>> {
        self.providers.list().await
    }

    /// Delete a provider with its nodes and catalogs
    pub async fn delete_provider(&self, name: &str) -> ProvisionResult<()> {
        let provider = self
            .providers
            .get_by_name(name)
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("Provider {}", name)))?;
        self.providers.delete(&provider.id).await?;
        info!("Deleted provider {}", name);
        Ok(())
    }

    /// Update every provider in turn; a failing provider does not stop the rest
    pub async fn sync_all(&self) -> ProvisionResult<Vec<SyncOutcome>> {
        let providers = self.providers.list().await?;
        let mut outcomes = Vec::with_capacity(providers.len());

        for provider in providers {
            let name = provider.name.clone();
            let mut session = self.session(provider);
            match session.update().await {
                Ok(report) => outcomes.push(SyncOutcome::Synced(report)),
                Err(e) => {
                    error!("Sync of provider {} failed: {}", name, e);
                    outcomes.push(SyncOutcome::Failed {
                        provider: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Schema version and per-provider node counts
    pub async fn status(&self) -> ProvisionResult<StatusReport> {
        let nodes = NodeRepository::new(self.pool.clone());
        let schema_version = migrations::schema_version(&self.pool)
            .await
            .map_err(|e| ProvisionError::Database(e.to_string()))?;

        let mut providers = Vec::new();
        for provider in self.providers.list().await? {
            let decommissioned = nodes
                .count_by_environment(&provider.id, Environment::Decommissioned)
                .await?;
            let active = nodes.list_active(&provider.id).await?.len() as i64;
            providers.push(ProviderStatus {
                name: provider.name,
                provider_type: provider.provider_type,
                actions: provider.actions,
                active_nodes: active,
                decommissioned_nodes: decommissioned,
            });
        }

        Ok(StatusReport {
            schema_version,
            providers,
        })
    }

    fn session(&self, provider: Provider) -> ProviderSession {
        ProviderSession::new(provider, self.pool.clone(), self.context.clone())
    }
}

/// One provider and its cached vendor connection.
///
/// The connection is opened on first use and kept until [`reset_connection`] or
/// until the session is dropped. Operations take `&mut self`, so a session is
/// never used by two callers at once.
///
/// [`reset_connection`]: ProviderSession::reset_connection
pub struct ProviderSession {
    provider: Provider,
    context: Arc<ProvisioningContext>,
    connection: Option<Arc<ProviderConnection>>,
    providers: ProviderRepository,
    nodes: NodeRepository,
    catalog: CatalogRepository,
    reconciler: Reconciler,
    lifecycle: NodeLifecycle,
}

impl ProviderSession {
    pub fn new(provider: Provider, pool: SqlitePool, context: Arc<ProvisioningContext>) -> Self {
        Self {
            reconciler: Reconciler::new(pool.clone(), &context.import_creator),
            lifecycle: NodeLifecycle::new(pool.clone()),
            providers: ProviderRepository::new(pool.clone()),
            nodes: NodeRepository::new(pool.clone()),
            catalog: CatalogRepository::new(pool),
            provider,
            context,
            connection: None,
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The live connection, opened on first use
    pub async fn connection(&mut self) -> ProvisionResult<Arc<ProviderConnection>> {
        if let Some(conn) = &self.connection {
            return Ok(conn.clone());
        }

        let conn = Arc::new(
            ProviderConnection::open(
                &self.provider,
                &self.context.drivers,
                self.context.deploy_key.clone(),
                self.context.password_length,
            )
            .await?,
        );
        self.connection = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached connection; the next operation reconnects
    pub fn reset_connection(&mut self) {
        if self.connection.take().is_some() {
            debug!("Dropped connection of provider {}", self.provider.name);
        }
    }

    /// Re-derive capability metadata, make sure a connection is open, then
    /// persist the provider
    pub async fn save(&mut self) -> ProvisionResult<()> {
        let capabilities = self.context.capabilities.get(&self.provider.provider_type)?;
        capabilities.validate_credentials(&self.provider.access_key, &self.provider.secret_key)?;

        if let Some(action) = capabilities
            .supported_actions
            .iter()
            .find(|a| ActionKind::parse(a).is_none())
        {
            return Err(ProvisionError::Config(format!(
                "Unsupported action \"{}\" specified",
                action
            )));
        }
        self.provider.actions = capabilities.supported_actions.clone();
        self.provider.extra_param = capabilities.extra_param.clone();

        self.connection().await?;

        self.providers.save(&self.provider).await?;
        debug!("Saved provider {}", self.provider.name);
        Ok(())
    }

    /// Save the provider, then import its nodes
    pub async fn update(&mut self) -> ProvisionResult<SyncReport> {
        info!("Updating provider {}", self.provider.name);
        self.save().await?;
        self.import_nodes().await
    }

    pub async fn import_nodes(&mut self) -> ProvisionResult<SyncReport> {
        if !self.provider.supports(ActionKind::List) {
            return Ok(SyncReport::skipped(&self.provider.name));
        }
        let conn = self.connection().await?;
        self.reconciler.import_nodes(&self.provider, &conn).await
    }

    pub async fn import_images(&mut self) -> ProvisionResult<CatalogImport> {
        let conn = self.connection().await?;
        self.reconciler.import_images(&self.provider, &conn).await
    }

    pub async fn import_locations(&mut self) -> ProvisionResult<CatalogImport> {
        let conn = self.connection().await?;
        self.reconciler.import_locations(&self.provider, &conn).await
    }

    pub async fn import_sizes(&mut self) -> ProvisionResult<CatalogImport> {
        let conn = self.connection().await?;
        self.reconciler.import_sizes(&self.provider, &conn).await
    }

    /// Images, locations and sizes, each in its own transaction
    pub async fn import_catalog(&mut self) -> ProvisionResult<Vec<CatalogImport>> {
        Ok(vec![
            self.import_images().await?,
            self.import_locations().await?,
            self.import_sizes().await?,
        ])
    }

    pub async fn get_images(&self) -> ProvisionResult<Vec<Image>> {
        self.catalog.list_images(&self.provider.id).await
    }

    pub async fn get_locations(&self) -> ProvisionResult<Vec<Location>> {
        self.catalog.list_locations(&self.provider.id).await
    }

    pub async fn get_sizes(&self) -> ProvisionResult<Vec<Size>> {
        self.catalog.list_sizes(&self.provider.id).await
    }

    /// All nodes of the provider, decommissioned ones included
    pub async fn nodes(&self) -> ProvisionResult<Vec<Node>> {
        self.nodes.list_for_provider(&self.provider.id).await
    }

    pub async fn find_node(&self, name: &str) -> ProvisionResult<Node> {
        self.nodes
            .find_by_name(&self.provider.id, name)
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("Node {} on {}", name, self.provider.name)))
    }

    pub async fn create_node(&mut self, form: &NodeForm, creator: &str) -> ProvisionResult<Node> {
        let conn = self.connection().await?;
        self.lifecycle
            .spawn(&self.provider, &conn, form, creator)
            .await
    }

    pub async fn reboot_node(&mut self, node: &Node) -> Result<(), OperationError> {
        self.ensure_owned(node)?;
        let conn = self.connection().await?;
        self.lifecycle.reboot(&conn, node).await
    }

    pub async fn destroy_node(&mut self, node: &mut Node) -> Result<(), OperationError> {
        self.ensure_owned(node)?;
        let conn = if self.provider.supports(ActionKind::Destroy) {
            Some(self.connection().await?)
        } else {
            None
        };
        self.lifecycle
            .destroy(&self.provider, conn.as_deref(), node)
            .await
    }

    fn ensure_owned(&self, node: &Node) -> ProvisionResult<()> {
        if node.provider_id != self.provider.id {
            return Err(ProvisionError::Validation(format!(
                "Node {} does not belong to provider {}",
                node.name, self.provider.name
            )));
        }
        Ok(())
    }
}
