//! Reconciliation engine
//!
//! Brings the local node table and catalogs in line with what a live provider
//! connection reports. Node imports are applied node by node; each catalog import
//! commits as a single transaction.

use std::collections::HashSet;

use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use super::connection::ProviderConnection;
use super::lifecycle::NodeLifecycle;
use crate::db::{CatalogRepository, NodeRepository};
use crate::models::{
    get_state, ActionKind, CatalogImport, CatalogKind, ExtraData, Node, Provider, SyncReport,
    VendorNode,
};
use crate::utils::ProvisionResult;

/// Vendor attribute keys naming the image of a node
const IMAGE_KEYS: [&str; 1] = ["imageId"];
/// Vendor attribute keys naming the location of a node
const LOCATION_KEYS: [&str; 1] = ["availability"];
/// Vendor attribute keys naming the size of a node, tried in order
const SIZE_KEYS: [&str; 2] = ["instancetype", "flavorId"];

/// Synchronizes one provider's local state with its live inventory
pub struct Reconciler {
    pool: SqlitePool,
    nodes: NodeRepository,
    catalog: CatalogRepository,
    lifecycle: NodeLifecycle,
    import_creator: String,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, import_creator: &str) -> Self {
        Self {
            nodes: NodeRepository::new(pool.clone()),
            catalog: CatalogRepository::new(pool.clone()),
            lifecycle: NodeLifecycle::new(pool.clone()),
            pool,
            import_creator: import_creator.to_string(),
        }
    }

    /// Import live nodes and decommission the ones the vendor stopped listing.
    ///
    /// Nodes that disappeared are decommissioned before live nodes are written, so
    /// a replacement node may take over the name of the one it replaced.
    pub async fn import_nodes(
        &self,
        provider: &Provider,
        conn: &ProviderConnection,
    ) -> ProvisionResult<SyncReport> {
        if !provider.supports(ActionKind::List) {
            debug!("Provider {} cannot list nodes, skipping import", provider.name);
            return Ok(SyncReport::skipped(&provider.name));
        }

        let live = conn.list_nodes().await?;
        let mut report = SyncReport::new(&provider.name);

        let live_uuids: HashSet<&str> = live.iter().map(|n| n.uuid.as_str()).collect();
        for mut node in self.nodes.list_active(&provider.id).await? {
            if live_uuids.contains(node.uuid.as_str()) {
                continue;
            }
            info!(
                "Node {} is no longer listed by {}, decommissioning",
                node, provider.name
            );
            self.lifecycle.decommission(&mut node).await?;
            report.decommissioned += 1;
        }

        for vendor_node in &live {
            let mut node = match self.nodes.find_by_uuid(&provider.id, &vendor_node.uuid).await? {
                Some(existing) => {
                    report.updated += 1;
                    existing
                }
                None => {
                    let node = self.new_node(provider, vendor_node).await?;
                    report.added += 1;
                    node
                }
            };

            node.public_ip = vendor_node.primary_public_ip();
            if let Some(ip) = vendor_node.private_ips.first() {
                node.internal_ip = ip.clone();
            }
            node.state = get_state(vendor_node.state);
            node.save_extra_data(&vendor_node.extra)?;
            self.nodes.save(&node).await?;
        }

        info!(
            "Synced {}: {} added, {} updated, {} decommissioned",
            provider.name, report.added, report.updated, report.decommissioned
        );
        Ok(report)
    }

    async fn new_node(&self, provider: &Provider, vendor_node: &VendorNode) -> ProvisionResult<Node> {
        let mut name = vendor_node.name.clone();
        if self.nodes.name_taken(&provider.id, &name, "").await? {
            let base = format!("{}-{}", vendor_node.name, vendor_node.id);
            name = base.clone();
            let mut counter = 1;
            while self.nodes.name_taken(&provider.id, &name, "").await? {
                counter += 1;
                name = format!("{}-{}", base, counter);
            }
            warn!(
                "Node name {} is already used on {}, importing as {}",
                vendor_node.name, provider.name, name
            );
        }

        let mut node = Node::new(&provider.id, &name, &vendor_node.uuid, &self.import_creator);
        let extra = &vendor_node.extra;

        if let Some(vendor_id) = attribute(extra, &IMAGE_KEYS) {
            node.image_id = self
                .catalog
                .find_image(&provider.id, &vendor_id)
                .await?
                .map(|i| i.id);
            if node.image_id.is_none() {
                warn!("Image {} of node {} is not in the local catalog", vendor_id, name);
            }
        }

        if let Some(vendor_id) = attribute(extra, &LOCATION_KEYS) {
            node.location_id = self
                .catalog
                .find_location(&provider.id, &vendor_id)
                .await?
                .map(|l| l.id);
            if node.location_id.is_none() {
                warn!("Location {} of node {} is not in the local catalog", vendor_id, name);
            }
        }

        for key in SIZE_KEYS {
            if let Some(vendor_id) = attribute(extra, &[key]) {
                node.size_id = self
                    .catalog
                    .find_size(&provider.id, &vendor_id)
                    .await?
                    .map(|s| s.id);
                if node.size_id.is_some() {
                    break;
                }
            }
        }
        if node.size_id.is_none() && attribute(extra, &SIZE_KEYS).is_some() {
            warn!("Size of node {} is not in the local catalog", name);
        }

        debug!("Adding node {} from {}", name, provider.name);
        Ok(node)
    }

    /// Upsert every live image in one transaction
    pub async fn import_images(
        &self,
        provider: &Provider,
        conn: &ProviderConnection,
    ) -> ProvisionResult<CatalogImport> {
        let images = conn.list_images().await?;
        let mut tx = self.pool.begin().await?;
        for image in &images {
            if let Err(e) = CatalogRepository::upsert_image(&mut *tx, &provider.id, image).await {
                error!("Image import for {} rolled back at {}: {}", provider.name, image.id, e);
                return Err(e);
            }
        }
        tx.commit().await?;

        info!("Imported {} images for {}", images.len(), provider.name);
        Ok(CatalogImport {
            kind: CatalogKind::Images,
            upserted: images.len(),
        })
    }

    /// Upsert every live location in one transaction
    pub async fn import_locations(
        &self,
        provider: &Provider,
        conn: &ProviderConnection,
    ) -> ProvisionResult<CatalogImport> {
        let locations = conn.list_locations().await?;
        let mut tx = self.pool.begin().await?;
        for location in &locations {
            if let Err(e) = CatalogRepository::upsert_location(&mut *tx, &provider.id, location).await {
                error!(
                    "Location import for {} rolled back at {}: {}",
                    provider.name, location.id, e
                );
                return Err(e);
            }
        }
        tx.commit().await?;

        info!("Imported {} locations for {}", locations.len(), provider.name);
        Ok(CatalogImport {
            kind: CatalogKind::Locations,
            upserted: locations.len(),
        })
    }

    /// Upsert every live size in one transaction
    pub async fn import_sizes(
        &self,
        provider: &Provider,
        conn: &ProviderConnection,
    ) -> ProvisionResult<CatalogImport> {
        let sizes = conn.list_sizes().await?;
        let mut tx = self.pool.begin().await?;
        for size in &sizes {
            if let Err(e) = CatalogRepository::upsert_size(&mut *tx, &provider.id, size).await {
                error!("Size import for {} rolled back at {}: {}", provider.name, size.id, e);
                return Err(e);
            }
        }
        tx.commit().await?;

        info!("Imported {} sizes for {}", sizes.len(), provider.name);
        Ok(CatalogImport {
            kind: CatalogKind::Sizes,
            upserted: sizes.len(),
        })
    }
}

/// First of `keys` present in the vendor attributes, as a string
fn attribute(extra: &ExtraData, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match extra.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
