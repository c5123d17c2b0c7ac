//! Catalog repository (images, locations, sizes)
//!
//! Upserts run on a caller-provided connection so the reconciliation engine can
//! enlist a whole catalog import in a single transaction. Reads go through the pool.

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp;
use crate::models::{CatalogKind, Image, Location, Size, VendorImage, VendorLocation, VendorSize};
use crate::utils::ProvisionResult;

/// Repository for vendor catalog rows
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Upserts
    // =========================================================================

    /// Insert or refresh an image keyed by `(provider_id, image.id)`
    pub async fn upsert_image(
        conn: &mut SqliteConnection,
        provider_id: &str,
        image: &VendorImage,
    ) -> ProvisionResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO images (id, provider_id, image_id, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(provider_id, image_id) DO UPDATE SET
                name = excluded.name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(provider_id)
        .bind(&image.id)
        .bind(&image.name)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Insert or refresh a location keyed by `(provider_id, location.id)`
    pub async fn upsert_location(
        conn: &mut SqliteConnection,
        provider_id: &str,
        location: &VendorLocation,
    ) -> ProvisionResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO locations (id, provider_id, location_id, name, country, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(provider_id, location_id) DO UPDATE SET
                name = excluded.name,
                country = excluded.country,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(provider_id)
        .bind(&location.id)
        .bind(&location.name)
        .bind(&location.country)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Insert or refresh a size keyed by `(provider_id, size.id)`
    pub async fn upsert_size(
        conn: &mut SqliteConnection,
        provider_id: &str,
        size: &VendorSize,
    ) -> ProvisionResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO sizes (
                id, provider_id, size_id, name, ram, disk, bandwidth, price, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(provider_id, size_id) DO UPDATE SET
                name = excluded.name,
                ram = excluded.ram,
                disk = excluded.disk,
                bandwidth = excluded.bandwidth,
                price = excluded.price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(provider_id)
        .bind(&size.id)
        .bind(&size.name)
        .bind(size.ram)
        .bind(size.disk)
        .bind(size.bandwidth)
        .bind(size.price)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn list_images(&self, provider_id: &str) -> ProvisionResult<Vec<Image>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            "SELECT * FROM images WHERE provider_id = ?1 ORDER BY name ASC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn list_locations(&self, provider_id: &str) -> ProvisionResult<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT * FROM locations WHERE provider_id = ?1 ORDER BY name ASC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn list_sizes(&self, provider_id: &str) -> ProvisionResult<Vec<Size>> {
        let rows = sqlx::query_as::<_, SizeRow>(
            "SELECT * FROM sizes WHERE provider_id = ?1 ORDER BY ram ASC, name ASC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Find an image by its vendor id
    pub async fn find_image(&self, provider_id: &str, image_id: &str) -> ProvisionResult<Option<Image>> {
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT * FROM images WHERE provider_id = ?1 AND image_id = ?2",
        )
        .bind(provider_id)
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Find a location by its vendor id
    pub async fn find_location(
        &self,
        provider_id: &str,
        location_id: &str,
    ) -> ProvisionResult<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(
            "SELECT * FROM locations WHERE provider_id = ?1 AND location_id = ?2",
        )
        .bind(provider_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Find a size by its vendor id
    pub async fn find_size(&self, provider_id: &str, size_id: &str) -> ProvisionResult<Option<Size>> {
        let row = sqlx::query_as::<_, SizeRow>(
            "SELECT * FROM sizes WHERE provider_id = ?1 AND size_id = ?2",
        )
        .bind(provider_id)
        .bind(size_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Number of persisted rows in one catalog of a provider
    pub async fn count(&self, provider_id: &str, kind: CatalogKind) -> ProvisionResult<i64> {
        let sql = match kind {
            CatalogKind::Images => "SELECT COUNT(*) FROM images WHERE provider_id = ?1",
            CatalogKind::Locations => "SELECT COUNT(*) FROM locations WHERE provider_id = ?1",
            CatalogKind::Sizes => "SELECT COUNT(*) FROM sizes WHERE provider_id = ?1",
        };

        let count: i64 = sqlx::query_scalar(sql)
            .bind(provider_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, FromRow)]
struct ImageRow {
    id: String,
    provider_id: String,
    image_id: String,
    name: String,
    created_at: String,
    updated_at: String,
}

impl From<ImageRow> for Image {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            provider_id: row.provider_id,
            image_id: row.image_id,
            name: row.name,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: String,
    provider_id: String,
    location_id: String,
    name: String,
    country: String,
    created_at: String,
    updated_at: String,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.id,
            provider_id: row.provider_id,
            location_id: row.location_id,
            name: row.name,
            country: row.country,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(Debug, FromRow)]
struct SizeRow {
    id: String,
    provider_id: String,
    size_id: String,
    name: String,
    ram: Option<i64>,
    disk: Option<i64>,
    bandwidth: Option<i64>,
    price: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl From<SizeRow> for Size {
    fn from(row: SizeRow) -> Self {
        Self {
            id: row.id,
            provider_id: row.provider_id,
            size_id: row.size_id,
            name: row.name,
            ram: row.ram,
            disk: row.disk,
            bandwidth: row.bandwidth,
            price: row.price,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}
