//! Node lifecycle
//!
//! Spawn, reboot, destroy and decommission. Decommissioned is terminal: the node
//! keeps its row and history but gives up its name so a live node can reuse it.

use sqlx::SqlitePool;
use tracing::{error, info};
use validator::Validate;

use super::connection::ProviderConnection;
use crate::db::{CatalogRepository, NodeRepository};
use crate::models::{ActionKind, Environment, Node, NodeForm, NodeState, Provider};
use crate::utils::validation::validate_node_name;
use crate::utils::{OperationError, ProvisionError, ProvisionResult};

/// Name a decommissioned node takes for a given attempt
pub fn decommissioned_name(counter: u32, name: &str) -> String {
    format!("DECOM{}-{}", counter, name)
}

/// Node state transitions backed by the node table
pub struct NodeLifecycle {
    nodes: NodeRepository,
    catalog: CatalogRepository,
}

impl NodeLifecycle {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            nodes: NodeRepository::new(pool.clone()),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// Rename the node to the first free `DECOM{n}-` name and mark it decommissioned.
    ///
    /// Names held by the node itself do not count as taken, so decommissioning twice
    /// still yields a name unique among its siblings.
    pub async fn decommission(&self, node: &mut Node) -> ProvisionResult<()> {
        let mut counter = 1;
        let mut candidate = decommissioned_name(counter, &node.name);
        while self
            .nodes
            .name_taken(&node.provider_id, &candidate, &node.id)
            .await?
        {
            counter += 1;
            candidate = decommissioned_name(counter, &node.name);
        }

        node.name = candidate;
        node.environment = Environment::Decommissioned;
        node.state = NodeState::Terminated;
        self.nodes.save(node).await?;

        info!("Decommissioned node {}", node);
        Ok(())
    }

    /// Create a node at the vendor and persist it.
    ///
    /// The node keeps the state the vendor reported; the next sync refreshes it.
    pub async fn spawn(
        &self,
        provider: &Provider,
        conn: &ProviderConnection,
        form: &NodeForm,
        creator: &str,
    ) -> ProvisionResult<Node> {
        if !provider.supports(ActionKind::Create) {
            return Err(ProvisionError::Unsupported(format!(
                "{} does not support node creation",
                provider.name
            )));
        }
        form.validate()?;
        if !validate_node_name(&form.name) {
            return Err(ProvisionError::Validation(format!(
                "Invalid node name: {}",
                form.name
            )));
        }

        if self
            .nodes
            .find_by_name(&provider.id, &form.name)
            .await?
            .is_some()
        {
            return Err(ProvisionError::Conflict(format!(
                "A node named {} already exists on {}",
                form.name, provider.name
            )));
        }

        let spawned = conn.create_node(form).await?;

        let mut node = Node::new(&provider.id, &form.name, &spawned.uuid, creator);
        node.public_ip = spawned.public_ip;
        node.state = spawned.state;
        node.save_extra_data(&spawned.extra)?;

        node.image_id = self
            .catalog
            .find_image(&provider.id, &form.image)
            .await?
            .map(|i| i.id);
        node.size_id = self
            .catalog
            .find_size(&provider.id, &form.flavor)
            .await?
            .map(|s| s.id);
        if let Some(realm) = form.realm.as_deref() {
            node.location_id = self
                .catalog
                .find_location(&provider.id, realm)
                .await?
                .map(|l| l.id);
        }

        self.nodes.save(&node).await?;
        info!("Spawned node {} on {}", node, provider.name);
        Ok(node)
    }

    /// Ask the vendor to reboot the node; the stored state is left to the next sync
    pub async fn reboot(&self, conn: &ProviderConnection, node: &Node) -> Result<(), OperationError> {
        conn.reboot_node(&node.uuid).await?;
        info!("Rebooted node {}", node);
        Ok(())
    }

    /// Destroy the node at the vendor, then decommission it.
    ///
    /// Providers without the destroy capability are decommissioned locally only.
    /// When the vendor refuses, the node is left untouched.
    pub async fn destroy(
        &self,
        provider: &Provider,
        conn: Option<&ProviderConnection>,
        node: &mut Node,
    ) -> Result<(), OperationError> {
        if provider.supports(ActionKind::Destroy) {
            let conn = conn.ok_or_else(|| {
                ProvisionError::Connection(format!("{} is not connected", provider.name))
            })?;
            if let Err(e) = conn.destroy_node(&node.uuid).await {
                error!("Not decommissioning {}: {}", node, e);
                return Err(e);
            }
            info!("Destroyed node {}", node);
        }

        self.decommission(node).await?;
        Ok(())
    }
}
