//! In-memory dummy vendor
//!
//! Behaves like a small, well-mannered cloud: a fixed catalog and a node inventory
//! that lives as long as the connection. Useful for demos and local testing.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CreateNodeRequest, Credentials, Deployment, DriverFactory, NodeDriver};
use crate::models::{
    CreateFeature, ExtraData, VendorImage, VendorLocation, VendorNode, VendorSize,
};

const DEFAULT_NODE_COUNT: usize = 2;

const RUNNING: i64 = 0;
const REBOOTING: i64 = 1;

/// Factory for the `DUMMY` provider type
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyDriverFactory;

#[async_trait]
impl DriverFactory for DummyDriverFactory {
    async fn connect(
        &self,
        provider_type: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn NodeDriver>> {
        let count = credentials
            .access_key()
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_NODE_COUNT);

        debug!("Connecting dummy driver with {} initial nodes", count);
        Ok(Box::new(DummyDriver::new(provider_type, count)))
    }
}

/// In-memory driver
pub struct DummyDriver {
    provider_type: String,
    nodes: RwLock<Vec<VendorNode>>,
    next_id: RwLock<usize>,
}

impl DummyDriver {
    pub fn new(provider_type: &str, count: usize) -> Self {
        let nodes = (1..=count)
            .map(|n| dummy_node(provider_type, n, ExtraData::new()))
            .collect();

        Self {
            provider_type: provider_type.to_string(),
            nodes: RwLock::new(nodes),
            next_id: RwLock::new(count + 1),
        }
    }

    async fn spawn(&self, request: &CreateNodeRequest, deployed: bool) -> VendorNode {
        let mut next_id = self.next_id.write().await;
        let n = *next_id;
        *next_id += 1;

        let mut extra = ExtraData::new();
        extra.insert("imageId".to_string(), json!(request.image.id));
        extra.insert("flavorId".to_string(), json!(request.size.id));
        if let Some(location) = &request.location {
            extra.insert("availability".to_string(), json!(location.id));
        }
        if deployed {
            extra.insert("deployed".to_string(), json!(true));
        }

        let mut node = dummy_node(&self.provider_type, n, extra);
        node.name = request.name.clone();
        self.nodes.write().await.push(node.clone());
        node
    }
}

fn dummy_node(provider_type: &str, n: usize, extra: ExtraData) -> VendorNode {
    VendorNode {
        id: n.to_string(),
        uuid: String::new(),
        name: format!("dummy-{}", n),
        state: RUNNING,
        public_ips: vec![format!("127.0.0.{}", n)],
        private_ips: vec![],
        extra,
    }
    .with_derived_uuid(provider_type)
}

#[async_trait]
impl NodeDriver for DummyDriver {
    fn features(&self) -> &[CreateFeature] {
        &[CreateFeature::GeneratesPassword]
    }

    async fn list_nodes(&self) -> Result<Vec<VendorNode>> {
        Ok(self.nodes.read().await.clone())
    }

    async fn list_images(&self) -> Result<Vec<VendorImage>> {
        Ok([("1", "Ubuntu 9.10"), ("2", "Ubuntu 9.04"), ("3", "Slackware 4")]
            .into_iter()
            .map(|(id, name)| VendorImage {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect())
    }

    async fn list_locations(&self) -> Result<Vec<VendorLocation>> {
        Ok([
            ("1", "Paul's Room", "US"),
            ("2", "London Loft", "GB"),
            ("3", "Island Datacenter", "ISL"),
        ]
        .into_iter()
        .map(|(id, name, country)| VendorLocation {
            id: id.to_string(),
            name: name.to_string(),
            country: country.to_string(),
        })
        .collect())
    }

    async fn list_sizes(&self) -> Result<Vec<VendorSize>> {
        Ok([
            ("1", "Small", 128, 4, 500, 4.0),
            ("2", "Medium", 512, 16, 1500, 8.0),
            ("3", "Big", 4096, 32, 2500, 32.0),
            ("4", "XXL Big", 8192, 128, 7500, 64.0),
        ]
        .into_iter()
        .map(|(id, name, ram, disk, bandwidth, price)| VendorSize {
            id: id.to_string(),
            name: name.to_string(),
            ram: Some(ram),
            disk: Some(disk),
            bandwidth: Some(bandwidth),
            price: Some(price),
        })
        .collect())
    }

    async fn create_node(&self, request: CreateNodeRequest) -> Result<VendorNode> {
        Ok(self.spawn(&request, false).await)
    }

    async fn deploy_node(
        &self,
        request: CreateNodeRequest,
        deployment: Deployment,
    ) -> Result<VendorNode> {
        match &deployment {
            Deployment::SshKey { key } => {
                if key.trim().is_empty() {
                    anyhow::bail!("Deployment key is empty");
                }
            }
        }
        Ok(self.spawn(&request, true).await)
    }

    async fn reboot_node(&self, node: &VendorNode) -> Result<bool> {
        let mut nodes = self.nodes.write().await;
        match nodes.iter_mut().find(|n| n.id == node.id) {
            Some(n) => {
                n.state = REBOOTING;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn destroy_node(&self, node: &VendorNode) -> Result<bool> {
        let mut nodes = self.nodes.write().await;
        let before = nodes.len();
        nodes.retain(|n| n.id != node.id);
        Ok(nodes.len() < before)
    }
}
