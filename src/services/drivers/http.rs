//! HTTP plugin driver
//!
//! Vendors not built into nimbus are served by an external bridge speaking a small
//! JSON protocol:
//!
//! | Method | Path                  | Body / response                    |
//! |--------|-----------------------|------------------------------------|
//! | GET    | `/nodes`              | `[VendorNode]`                     |
//! | GET    | `/images`             | `[VendorImage]`                    |
//! | GET    | `/locations`          | `[VendorLocation]`                 |
//! | GET    | `/sizes`              | `[VendorSize]`                     |
//! | POST   | `/nodes`              | create request → `VendorNode`      |
//! | POST   | `/nodes/{id}/reboot`  | → `{"success": bool}`              |
//! | DELETE | `/nodes/{id}`         | → `{"success": bool}`              |
//!
//! Provider credentials are sent as HTTP basic auth.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::{CreateNodeRequest, Credentials, Deployment, DriverFactory, NodeDriver};
use crate::config::PluginConfig;
use crate::models::{CreateFeature, VendorImage, VendorLocation, VendorNode, VendorSize};

/// Factory for one configured plugin provider type
#[derive(Debug, Clone)]
pub struct HttpDriverFactory {
    endpoint: String,
    timeout: Duration,
    features: Vec<CreateFeature>,
}

impl HttpDriverFactory {
    pub fn new(plugin: &PluginConfig) -> Self {
        Self {
            endpoint: plugin.endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(plugin.timeout_secs),
            features: plugin.features.clone(),
        }
    }
}

#[async_trait]
impl DriverFactory for HttpDriverFactory {
    /// Build a client and probe the node listing so bad credentials fail here
    async fn connect(
        &self,
        provider_type: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn NodeDriver>> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build plugin HTTP client")?;

        let driver = HttpDriver {
            client,
            base_url: self.endpoint.clone(),
            provider_type: provider_type.to_string(),
            credentials: credentials.clone(),
            features: self.features.clone(),
        };

        let response = driver
            .request(reqwest::Method::GET, "/nodes")
            .send()
            .await
            .with_context(|| format!("Failed to reach plugin endpoint {}", driver.base_url))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Plugin endpoint {} rejected the credentials (status {})",
                driver.base_url,
                response.status()
            );
        }

        info!("Connected {} plugin driver at {}", provider_type, driver.base_url);
        Ok(Box::new(driver))
    }
}

/// Driver backed by an HTTP plugin endpoint
pub struct HttpDriver {
    client: Client,
    base_url: String,
    provider_type: String,
    credentials: Credentials,
    features: Vec<CreateFeature>,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(flatten)]
    request: &'a CreateNodeRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment: Option<&'a Deployment>,
}

#[derive(Deserialize)]
struct OperationResponse {
    success: bool,
}

impl HttpDriver {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .basic_auth(self.credentials.access_key(), self.credentials.secret_key())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("Plugin GET {}{}", self.base_url, path);
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?;
        handle_response(response).await
    }

    async fn create(
        &self,
        request: &CreateNodeRequest,
        deployment: Option<&Deployment>,
    ) -> Result<VendorNode> {
        let response = self
            .request(reqwest::Method::POST, "/nodes")
            .json(&CreateBody {
                request,
                deployment,
            })
            .send()
            .await
            .context("Failed to send create request")?;

        let node: VendorNode = handle_response(response).await?;
        Ok(node.with_derived_uuid(&self.provider_type))
    }

    fn node_path(node: &VendorNode) -> String {
        format!("/nodes/{}", urlencoding::encode(&node.id))
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;
        serde_json::from_str::<T>(&body).with_context(|| {
            let truncated = if body.len() > 500 {
                format!("{}... (truncated)", body.chars().take(500).collect::<String>())
            } else {
                body
            };
            format!("Failed to parse response JSON: {}", truncated)
        })
    } else {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Request failed with status {}: {}", status, body);
    }
}

#[async_trait]
impl NodeDriver for HttpDriver {
    fn features(&self) -> &[CreateFeature] {
        &self.features
    }

    async fn list_nodes(&self) -> Result<Vec<VendorNode>> {
        let nodes: Vec<VendorNode> = self.get("/nodes").await?;
        Ok(nodes
            .into_iter()
            .map(|n| n.with_derived_uuid(&self.provider_type))
            .collect())
    }

    async fn list_images(&self) -> Result<Vec<VendorImage>> {
        self.get("/images").await
    }

    async fn list_locations(&self) -> Result<Vec<VendorLocation>> {
        self.get("/locations").await
    }

    async fn list_sizes(&self) -> Result<Vec<VendorSize>> {
        self.get("/sizes").await
    }

    async fn create_node(&self, request: CreateNodeRequest) -> Result<VendorNode> {
        self.create(&request, None).await
    }

    async fn deploy_node(
        &self,
        request: CreateNodeRequest,
        deployment: Deployment,
    ) -> Result<VendorNode> {
        self.create(&request, Some(&deployment)).await
    }

    async fn reboot_node(&self, node: &VendorNode) -> Result<bool> {
        let path = format!("{}/reboot", Self::node_path(node));
        let response = self
            .request(reqwest::Method::POST, &path)
            .send()
            .await
            .context("Failed to send reboot request")?;
        let result: OperationResponse = handle_response(response).await?;
        Ok(result.success)
    }

    async fn destroy_node(&self, node: &VendorNode) -> Result<bool> {
        let response = self
            .request(reqwest::Method::DELETE, &Self::node_path(node))
            .send()
            .await
            .context("Failed to send destroy request")?;
        let result: OperationResponse = handle_response(response).await?;
        Ok(result.success)
    }
}
