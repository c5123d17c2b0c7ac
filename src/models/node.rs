//! Node data model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Opaque vendor attributes stored alongside a node
pub type ExtraData = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Begin,
    Pending,
    Rebooting,
    Configuring,
    Running,
    Terminated,
    Stopping,
    Stopped,
    Stranded,
    Unknown,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Begin => "Begin",
            NodeState::Pending => "Pending",
            NodeState::Rebooting => "Rebooting",
            NodeState::Configuring => "Configuring",
            NodeState::Running => "Running",
            NodeState::Terminated => "Terminated",
            NodeState::Stopping => "Stopping",
            NodeState::Stopped => "Stopped",
            NodeState::Stranded => "Stranded",
            NodeState::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Begin" => Some(NodeState::Begin),
            "Pending" => Some(NodeState::Pending),
            "Rebooting" => Some(NodeState::Rebooting),
            "Configuring" => Some(NodeState::Configuring),
            "Running" => Some(NodeState::Running),
            "Terminated" => Some(NodeState::Terminated),
            "Stopping" => Some(NodeState::Stopping),
            "Stopped" => Some(NodeState::Stopped),
            "Stranded" => Some(NodeState::Stranded),
            "Unknown" => Some(NodeState::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a vendor state code to a node state.
///
/// Total over all integers: anything outside 0..=3 is `Unknown`.
pub fn get_state(code: i64) -> NodeState {
    match code {
        0 => NodeState::Running,
        1 => NodeState::Rebooting,
        2 => NodeState::Terminated,
        3 => NodeState::Pending,
        _ => NodeState::Unknown,
    }
}

/// Deployment environment of a node. `Decommissioned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Environment {
    #[default]
    Production,
    Stage,
    Test,
    Decommissioned,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "Production",
            Environment::Stage => "Stage",
            Environment::Test => "Test",
            Environment::Decommissioned => "Decommissioned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Production" => Some(Environment::Production),
            "Stage" => Some(Environment::Stage),
            "Test" => Some(Environment::Test),
            "Decommissioned" => Some(Environment::Decommissioned),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compute instance tracked locally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub provider_id: String,
    pub name: String,
    /// Vendor identity, unique per provider
    pub uuid: String,
    /// Local image row, when the vendor's image id resolved
    pub image_id: Option<String>,
    pub location_id: Option<String>,
    pub size_id: Option<String>,
    pub state: NodeState,
    pub public_ip: String,
    pub internal_ip: String,
    pub hostname: String,
    /// Serialized vendor attributes; read through [`Node::extra_data`]
    #[serde(skip)]
    pub(crate) extra: String,
    pub environment: Environment,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Build a node that has not been persisted yet
    pub fn new(provider_id: &str, name: &str, uuid: &str, creator: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.to_string(),
            name: name.to_string(),
            uuid: uuid.to_string(),
            image_id: None,
            location_id: None,
            size_id: None,
            state: NodeState::Begin,
            public_ip: String::new(),
            internal_ip: String::new(),
            hostname: String::new(),
            extra: String::new(),
            environment: Environment::default(),
            creator: creator.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Serialize vendor attributes into the extra data blob
    pub fn save_extra_data(&mut self, data: &ExtraData) -> Result<(), serde_json::Error> {
        self.extra = serde_json::to_string(data)?;
        Ok(())
    }

    /// Parse the extra data blob; an unset blob is an empty mapping
    pub fn extra_data(&self) -> Result<ExtraData, serde_json::Error> {
        if self.extra.is_empty() {
            return Ok(ExtraData::new());
        }
        serde_json::from_str(&self.extra)
    }

    pub fn is_decommissioned(&self) -> bool {
        self.environment == Environment::Decommissioned
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} - {} - {}>", self.name, self.public_ip, self.uuid)
    }
}

/// Operator input for spawning a node.
///
/// Fields other than the four reserved ones are collected in `extra` and forwarded
/// to vendors that take free-form creation arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct NodeForm {
    #[validate(length(min = 1, max = 25))]
    pub name: String,
    #[validate(length(min = 1))]
    pub image: String,
    #[validate(length(min = 1))]
    pub flavor: String,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// What a vendor reports back for a freshly created node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnedNode {
    pub public_ip: String,
    pub uuid: String,
    pub state: NodeState,
    pub extra: ExtraData,
}
