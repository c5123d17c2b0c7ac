//! Database migrations
//!
//! Migrations are handled by SQLx and stored in the `migrations/` directory.
//! This module reports migration status programmatically.

use anyhow::Result;
use sqlx::SqlitePool;

/// Latest successfully applied migration version, if any
pub async fn schema_version(pool: &SqlitePool) -> Result<Option<i64>> {
    let version: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1",
    )
    .fetch_one(pool)
    .await?;

    Ok(version)
}
