//! Synchronization outcomes

use serde::Serialize;

use super::CatalogKind;

/// Outcome of one node import against a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub provider: String,
    /// Nodes seen for the first time
    pub added: usize,
    /// Existing rows refreshed from the vendor
    pub updated: usize,
    /// Rows decommissioned because the vendor no longer lists them
    pub decommissioned: usize,
    /// Set when the provider cannot list nodes
    pub skipped: bool,
}

impl SyncReport {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            ..Default::default()
        }
    }

    pub fn skipped(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            skipped: true,
            ..Default::default()
        }
    }
}

/// Outcome of one catalog import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogImport {
    pub kind: CatalogKind,
    /// Entries upserted in the committed transaction
    pub upserted: usize,
}

/// Per-provider result of a sync over all providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncOutcome {
    Synced(SyncReport),
    Failed { provider: String, error: String },
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

/// Node counts of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub provider_type: String,
    pub actions: Vec<String>,
    pub active_nodes: i64,
    pub decommissioned_nodes: i64,
}

/// Snapshot of the local database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub schema_version: Option<i64>,
    pub providers: Vec<ProviderStatus>,
}
