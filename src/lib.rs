//! Nimbus Library
//!
//! Core of the nimbus provisioning dashboard: provider accounts, vendor drivers,
//! inventory reconciliation and node lifecycle.

use std::sync::Arc;

use anyhow::Context;

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use services::{ProviderService, ProviderSession, ProvisioningContext};

/// Application state shared by front ends
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Provider accounts and sync
    pub providers: Arc<ProviderService>,
}

impl AppState {
    /// Open the database, run migrations and build the provider service
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::init_pool(&config.database)
            .await
            .context("Failed to initialize database")?;
        let context = ProvisioningContext::from_config(&config)
            .context("Failed to initialize provisioning")?;
        let providers = Arc::new(ProviderService::new(db.clone(), Arc::new(context)));

        Ok(Self {
            config,
            db,
            providers,
        })
    }
}
