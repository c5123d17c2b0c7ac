//! Node repository
//!
//! Nodes are upserted one at a time; the sync loop does not wrap a whole node
//! import in a transaction.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

use super::parse_timestamp;
use crate::models::{Environment, Node, NodeState};
use crate::utils::ProvisionResult;

/// Repository for node rows
pub struct NodeRepository {
    pool: SqlitePool,
}

impl NodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new node or update the row with the same id
    pub async fn save(&self, node: &Node) -> ProvisionResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO nodes (
                id, provider_id, name, uuid, image_id, location_id, size_id,
                state, public_ip, internal_ip, hostname, extra_data,
                environment, creator, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(id) DO UPDATE SET
                name = ?3,
                uuid = ?4,
                image_id = ?5,
                location_id = ?6,
                size_id = ?7,
                state = ?8,
                public_ip = ?9,
                internal_ip = ?10,
                hostname = ?11,
                extra_data = ?12,
                environment = ?13,
                updated_at = ?16
            "#,
        )
        .bind(&node.id)
        .bind(&node.provider_id)
        .bind(&node.name)
        .bind(&node.uuid)
        .bind(&node.image_id)
        .bind(&node.location_id)
        .bind(&node.size_id)
        .bind(node.state.as_str())
        .bind(&node.public_ip)
        .bind(&node.internal_ip)
        .bind(&node.hostname)
        .bind(&node.extra)
        .bind(node.environment.as_str())
        .bind(&node.creator)
        .bind(node.created_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a node by its local id
    pub async fn get(&self, id: &str) -> ProvisionResult<Option<Node>> {
        let row = sqlx::query_as::<_, NodeRow>("SELECT * FROM nodes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Find a node of a provider by vendor uuid
    pub async fn find_by_uuid(&self, provider_id: &str, uuid: &str) -> ProvisionResult<Option<Node>> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT * FROM nodes WHERE provider_id = ?1 AND uuid = ?2",
        )
        .bind(provider_id)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Find a node of a provider by name
    pub async fn find_by_name(&self, provider_id: &str, name: &str) -> ProvisionResult<Option<Node>> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT * FROM nodes WHERE provider_id = ?1 AND name = ?2",
        )
        .bind(provider_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// All nodes of a provider, decommissioned ones included
    pub async fn list_for_provider(&self, provider_id: &str) -> ProvisionResult<Vec<Node>> {
        let rows = sqlx::query_as::<_, NodeRow>(
            "SELECT * FROM nodes WHERE provider_id = ?1 ORDER BY created_at ASC, name ASC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Nodes of a provider that are not decommissioned
    pub async fn list_active(&self, provider_id: &str) -> ProvisionResult<Vec<Node>> {
        let rows = sqlx::query_as::<_, NodeRow>(
            r#"
            SELECT * FROM nodes
            WHERE provider_id = ?1 AND environment != ?2
            ORDER BY created_at ASC, name ASC
            "#,
        )
        .bind(provider_id)
        .bind(Environment::Decommissioned.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Whether a node other than `exclude_id` already holds `name` under the provider
    pub async fn name_taken(
        &self,
        provider_id: &str,
        name: &str,
        exclude_id: &str,
    ) -> ProvisionResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM nodes WHERE provider_id = ?1 AND name = ?2 AND id != ?3",
        )
        .bind(provider_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Count nodes of a provider by environment
    pub async fn count_by_environment(
        &self,
        provider_id: &str,
        environment: Environment,
    ) -> ProvisionResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM nodes WHERE provider_id = ?1 AND environment = ?2",
        )
        .bind(provider_id)
        .bind(environment.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, FromRow)]
struct NodeRow {
    id: String,
    provider_id: String,
    name: String,
    uuid: String,
    image_id: Option<String>,
    location_id: Option<String>,
    size_id: Option<String>,
    state: String,
    public_ip: String,
    internal_ip: String,
    hostname: String,
    extra_data: String,
    environment: String,
    creator: String,
    created_at: String,
    updated_at: String,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.id,
            provider_id: row.provider_id,
            name: row.name,
            uuid: row.uuid,
            image_id: row.image_id,
            location_id: row.location_id,
            size_id: row.size_id,
            state: NodeState::parse(&row.state).unwrap_or(NodeState::Unknown),
            public_ip: row.public_ip,
            internal_ip: row.internal_ip,
            hostname: row.hostname,
            extra: row.extra_data,
            environment: Environment::parse(&row.environment).unwrap_or_default(),
            creator: row.creator,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}
