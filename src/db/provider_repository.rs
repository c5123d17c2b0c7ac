//! Provider repository
//!
//! Providers are saved together with their action links in one transaction, so a
//! provider referencing an action missing from the global table is never persisted.

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::parse_timestamp;
use crate::models::{Action, ExtraParam, Provider};
use crate::utils::{ProvisionError, ProvisionResult};

/// Repository for provider accounts and the global action table
pub struct ProviderRepository {
    pool: SqlitePool,
}

impl ProviderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a provider and replace its action links
    pub async fn save(&self, provider: &Provider) -> ProvisionResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let (param_name, param_value) = match &provider.extra_param {
            Some(param) => (Some(param.name.as_str()), Some(param.value.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO providers (
                id, name, provider_type, access_key, secret_key,
                extra_param_name, extra_param_value, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                name = ?2,
                provider_type = ?3,
                access_key = ?4,
                secret_key = ?5,
                extra_param_name = ?6,
                extra_param_value = ?7,
                updated_at = ?9
            "#,
        )
        .bind(&provider.id)
        .bind(&provider.name)
        .bind(&provider.provider_type)
        .bind(&provider.access_key)
        .bind(&provider.secret_key)
        .bind(param_name)
        .bind(param_value)
        .bind(provider.created_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM provider_actions WHERE provider_id = ?1")
            .bind(&provider.id)
            .execute(&mut *tx)
            .await?;

        for name in &provider.actions {
            link_action(&mut *tx, &provider.id, name).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a provider by its local id
    pub async fn get_by_id(&self, id: &str) -> ProvisionResult<Option<Provider>> {
        let row = sqlx::query_as::<_, ProviderRow>("SELECT * FROM providers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_actions(row).await?)),
            None => Ok(None),
        }
    }

    /// Get a provider by its unique name
    pub async fn get_by_name(&self, name: &str) -> ProvisionResult<Option<Provider>> {
        let row = sqlx::query_as::<_, ProviderRow>("SELECT * FROM providers WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_actions(row).await?)),
            None => Ok(None),
        }
    }

    /// List all providers ordered by name
    pub async fn list(&self) -> ProvisionResult<Vec<Provider>> {
        let rows = sqlx::query_as::<_, ProviderRow>("SELECT * FROM providers ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut providers = Vec::with_capacity(rows.len());
        for row in rows {
            providers.push(self.with_actions(row).await?);
        }
        Ok(providers)
    }

    /// Delete a provider; its nodes and catalogs go with it
    pub async fn delete(&self, id: &str) -> ProvisionResult<bool> {
        let result = sqlx::query("DELETE FROM providers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List the global action table
    pub async fn list_actions(&self) -> ProvisionResult<Vec<Action>> {
        let rows = sqlx::query_as::<_, ActionRow>("SELECT id, name, show FROM actions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| Action {
                id: r.id,
                name: r.name,
                show: r.show,
            })
            .collect())
    }

    async fn with_actions(&self, row: ProviderRow) -> ProvisionResult<Provider> {
        let actions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT a.name FROM actions a
            JOIN provider_actions pa ON pa.action_id = a.id
            WHERE pa.provider_id = ?1
            ORDER BY a.id
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.into_provider(actions))
    }
}

async fn link_action(conn: &mut SqliteConnection, provider_id: &str, name: &str) -> ProvisionResult<()> {
    let action_id: Option<i64> = sqlx::query_scalar("SELECT id FROM actions WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    let action_id = action_id.ok_or_else(|| {
        ProvisionError::Config(format!("Unsupported action \"{}\" specified", name))
    })?;

    sqlx::query("INSERT INTO provider_actions (provider_id, action_id) VALUES (?1, ?2)")
        .bind(provider_id)
        .bind(action_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProviderRow {
    id: String,
    name: String,
    provider_type: String,
    access_key: String,
    secret_key: String,
    extra_param_name: Option<String>,
    extra_param_value: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ProviderRow {
    fn into_provider(self, actions: Vec<String>) -> Provider {
        let extra_param = match (self.extra_param_name, self.extra_param_value) {
            (Some(name), Some(value)) if !name.is_empty() => Some(ExtraParam { name, value }),
            _ => None,
        };

        Provider {
            id: self.id,
            name: self.name,
            provider_type: self.provider_type,
            access_key: self.access_key,
            secret_key: self.secret_key,
            extra_param,
            actions,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

#[derive(Debug, FromRow)]
struct ActionRow {
    id: i64,
    name: String,
    show: bool,
}
