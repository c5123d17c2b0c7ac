//! Provider account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Capability flags a provider can support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Enumerate live nodes (required for sync)
    List,
    /// Spawn new nodes
    Create,
    /// Reboot a node
    Reboot,
    /// Destroy a node at the vendor
    Destroy,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::List => "list",
            ActionKind::Create => "create",
            ActionKind::Reboot => "reboot",
            ActionKind::Destroy => "destroy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "list" => Some(ActionKind::List),
            "create" => Some(ActionKind::Create),
            "reboot" => Some(ActionKind::Reboot),
            "destroy" => Some(ActionKind::Destroy),
            _ => None,
        }
    }

    pub fn all() -> [ActionKind; 4] {
        [
            ActionKind::List,
            ActionKind::Create,
            ActionKind::Reboot,
            ActionKind::Destroy,
        ]
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row of the global action table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub name: String,
    /// Whether the action is offered in the UI
    pub show: bool,
}

/// Vendor-specific parameter passed on every plain node creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraParam {
    pub name: String,
    pub value: String,
}

/// A registered cloud vendor account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    /// Unique display name
    pub name: String,
    /// Key into the capability registry (e.g. `EC2_US_EAST`)
    pub provider_type: String,
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub extra_param: Option<ExtraParam>,
    /// Names of the supported actions
    pub actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// Build a provider that has not been persisted yet
    pub fn new(name: &str, provider_type: &str, access_key: &str, secret_key: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            provider_type: provider_type.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            extra_param: None,
            actions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the provider declares the given capability
    pub fn supports(&self, action: ActionKind) -> bool {
        self.actions.iter().any(|a| a == action.as_str())
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Operator input for registering a provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct NewProvider {
    #[validate(length(min = 1, max = 25))]
    pub name: String,
    #[validate(length(min = 1, max = 25))]
    pub provider_type: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub access_key: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub secret_key: String,
}
