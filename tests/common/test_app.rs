//! Test application setup utilities
//!
//! Builds a provider service over a throwaway SQLite file with the mock vendor
//! registered as the driver of a handful of test provider types.

use std::sync::Arc;

use uuid::Uuid;

use nimbus::config::DatabaseConfig;
use nimbus::db::{self, DbPool};
use nimbus::models::{ActionKind, ExtraParam, NewProvider};
use nimbus::services::{
    CapabilityRegistry, DeployKey, DriverRegistry, ProviderCapabilities, ProviderService,
    ProviderSession, ProvisioningContext,
};

use super::fixtures::TEST_PUBLIC_KEY;
use super::mocks::MockVendor;

/// Provider type backed by the mock with every action
pub const MOCK: &str = "MOCK";
/// Mock provider type without the destroy action
pub const MOCK_LOCAL: &str = "MOCK_LOCAL";
/// Mock provider type that cannot list nodes
pub const MOCK_BLIND: &str = "MOCK_BLIND";

/// Creator recorded on nodes imported by sync in tests
pub const IMPORT_CREATOR: &str = "imported by test";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub pool: DbPool,
    pub service: Arc<ProviderService>,
    pub vendor: MockVendor,
    db_path: String,
}

impl TestApp {
    /// Create a test application with a deploy key configured
    pub async fn new() -> Self {
        Self::with_deploy_key(true).await
    }

    pub async fn with_deploy_key(deploy_key: bool) -> Self {
        let db_path = std::env::temp_dir()
            .join(format!("nimbus_test_{}.db", Uuid::new_v4()))
            .to_string_lossy()
            .to_string();

        let pool = db::init_pool(&test_database_config(&db_path))
            .await
            .expect("Failed to initialize test database");

        let vendor = MockVendor::new();
        let deploy_key = deploy_key
            .then(|| DeployKey::parse(TEST_PUBLIC_KEY).expect("Invalid test deploy key"));

        let context = ProvisioningContext {
            capabilities: test_capabilities(),
            drivers: test_drivers(&vendor),
            deploy_key,
            import_creator: IMPORT_CREATOR.to_string(),
            password_length: 15,
        };
        let service = Arc::new(ProviderService::new(pool.clone(), Arc::new(context)));

        Self {
            pool,
            service,
            vendor,
            db_path,
        }
    }

    /// Register a provider of type [`MOCK`]
    pub async fn provider(&self, name: &str) -> ProviderSession {
        self.provider_of_type(name, MOCK).await
    }

    pub async fn provider_of_type(&self, name: &str, provider_type: &str) -> ProviderSession {
        self.service
            .create_provider(new_provider(name, provider_type))
            .await
            .expect("Failed to create test provider")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.db_path, suffix));
        }
    }
}

/// Registration input with an access key unique to the provider name
pub fn new_provider(name: &str, provider_type: &str) -> NewProvider {
    NewProvider {
        name: name.to_string(),
        provider_type: provider_type.to_string(),
        access_key: format!("key-{}", name),
        secret_key: format!("secret-{}", name),
    }
}

pub fn test_database_config(db_path: &str) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", db_path),
        max_connections: 1,
        min_connections: 1,
        connect_timeout_secs: 30,
        idle_timeout_secs: 600,
    }
}

/// Built-in capabilities plus the mock provider types
pub fn test_capabilities() -> CapabilityRegistry {
    use ActionKind::*;

    let mut registry = CapabilityRegistry::builtin();
    registry.register(mock_capabilities(
        MOCK,
        &[List, Create, Reboot, Destroy],
        Some(ExtraParam {
            name: "ex_project".to_string(),
            value: "nimbus-test".to_string(),
        }),
    ));
    registry.register(mock_capabilities(MOCK_LOCAL, &[List, Create, Reboot], None));
    registry.register(mock_capabilities(MOCK_BLIND, &[Create], None));
    registry
}

fn mock_capabilities(
    provider_type: &str,
    actions: &[ActionKind],
    extra_param: Option<ExtraParam>,
) -> ProviderCapabilities {
    ProviderCapabilities {
        provider_type: provider_type.to_string(),
        display_name: format!("Mock ({})", provider_type),
        access_key: Some("Access Key".to_string()),
        secret_key: None,
        supported_actions: actions.iter().map(|a| a.as_str().to_string()).collect(),
        extra_param,
    }
}

/// Built-in drivers with the mock serving the mock types and `EC2_US_EAST`
pub fn test_drivers(vendor: &MockVendor) -> DriverRegistry {
    let mut registry = DriverRegistry::with_builtin();
    for provider_type in [MOCK, MOCK_LOCAL, MOCK_BLIND, "EC2_US_EAST"] {
        registry.register_builtin(provider_type, Arc::new(vendor.clone()));
    }
    registry
}
