//! Provider capability registry
//!
//! Static metadata per provider type: which credential fields an account needs,
//! which actions it supports and the optional vendor extra parameter. Lookups are
//! pure; plugin types are merged in from configuration at startup.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::PluginConfig;
use crate::models::{ActionKind, ExtraParam};
use crate::utils::{ProvisionError, ProvisionResult};

/// Capability metadata for one provider type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCapabilities {
    pub provider_type: String,
    pub display_name: String,
    /// Label of the access key field, `None` when the vendor does not use it
    pub access_key: Option<String>,
    /// Label of the secret key field, `None` when the vendor does not use it
    pub secret_key: Option<String>,
    pub supported_actions: Vec<String>,
    pub extra_param: Option<ExtraParam>,
}

impl ProviderCapabilities {
    fn builtin(
        provider_type: &str,
        display_name: &str,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        actions: &[ActionKind],
    ) -> Self {
        Self {
            provider_type: provider_type.to_string(),
            display_name: display_name.to_string(),
            access_key: access_key.map(str::to_string),
            secret_key: secret_key.map(str::to_string),
            supported_actions: actions.iter().map(|a| a.as_str().to_string()).collect(),
            extra_param: None,
        }
    }

    /// Reject credentials that leave a declared field empty
    pub fn validate_credentials(&self, access_key: &str, secret_key: &str) -> ProvisionResult<()> {
        for (label, value) in [(&self.access_key, access_key), (&self.secret_key, secret_key)] {
            if let Some(label) = label {
                if value.trim().is_empty() {
                    return Err(ProvisionError::Validation(format!(
                        "{} is required for {} providers",
                        label, self.provider_type
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn supports(&self, action: ActionKind) -> bool {
        self.supported_actions.iter().any(|a| a == action.as_str())
    }
}

impl From<&PluginConfig> for ProviderCapabilities {
    fn from(plugin: &PluginConfig) -> Self {
        Self {
            provider_type: plugin.provider_type.clone(),
            display_name: plugin
                .display_name
                .clone()
                .unwrap_or_else(|| plugin.provider_type.clone()),
            access_key: plugin.access_key_label.clone(),
            secret_key: plugin.secret_key_label.clone(),
            supported_actions: plugin.supported_actions.clone(),
            extra_param: plugin.extra_param.clone(),
        }
    }
}

/// Registry keyed by provider type
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, ProviderCapabilities>,
}

impl CapabilityRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in provider types
    pub fn builtin() -> Self {
        use ActionKind::*;

        let mut registry = Self::new();
        registry.register(ProviderCapabilities::builtin(
            "DUMMY",
            "Dummy Provider",
            Some("Dummy Access Key"),
            None,
            &[List, Create, Reboot, Destroy],
        ));
        for (provider_type, display_name) in [
            ("EC2_US_EAST", "Amazon EC2 (us-east-1)"),
            ("EC2_US_WEST", "Amazon EC2 (us-west-1)"),
            ("EC2_EU_WEST", "Amazon EC2 (eu-west-1)"),
        ] {
            registry.register(ProviderCapabilities::builtin(
                provider_type,
                display_name,
                Some("Access Key"),
                Some("Secret Key"),
                &[List, Create, Reboot, Destroy],
            ));
        }
        registry.register(ProviderCapabilities::builtin(
            "RACKSPACE",
            "Rackspace Cloud Servers",
            Some("Username"),
            Some("API Access Key"),
            &[List, Create, Reboot, Destroy],
        ));
        registry.register(ProviderCapabilities::builtin(
            "LINODE",
            "Linode",
            Some("API Key"),
            None,
            &[List, Create, Reboot, Destroy],
        ));
        registry
    }

    /// Built-in types plus the configured plugin types.
    ///
    /// A plugin declaring a built-in type replaces the built-in entry.
    pub fn with_plugins(plugins: &[PluginConfig]) -> Self {
        let mut registry = Self::builtin();
        for plugin in plugins {
            registry.register(ProviderCapabilities::from(plugin));
        }
        registry
    }

    pub fn register(&mut self, capabilities: ProviderCapabilities) {
        self.entries
            .insert(capabilities.provider_type.clone(), capabilities);
    }

    /// Look up a provider type
    pub fn get(&self, provider_type: &str) -> ProvisionResult<&ProviderCapabilities> {
        self.entries.get(provider_type).ok_or_else(|| {
            ProvisionError::Config(format!("Unknown provider type \"{}\"", provider_type))
        })
    }

    /// Registered provider types in sorted order
    pub fn provider_types(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderCapabilities> {
        self.entries.values()
    }
}
