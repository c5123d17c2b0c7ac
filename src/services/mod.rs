//! Business logic services

pub mod capabilities;
pub mod connection;
pub mod deploy_key;
pub mod drivers;
pub mod lifecycle;
pub mod provider;
pub mod reconcile;

pub use capabilities::{CapabilityRegistry, ProviderCapabilities};
pub use connection::{generate_random_password, CreateStrategy, DriverRegistry, ProviderConnection};
pub use deploy_key::DeployKey;
pub use drivers::{
    CreateNodeRequest, Credentials, Deployment, DriverFactory, NodeAuth, NodeDriver,
};
pub use lifecycle::{decommissioned_name, NodeLifecycle};
pub use provider::{ProviderService, ProviderSession, ProvisioningContext};
pub use reconcile::Reconciler;
