//! Location repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::location::{Location, CreateLocationRequest, UpdateLocationRequest};
use crate::utils::errors::QrMarkError;

const LOCATION_COLUMNS: &str = "id, name, address, maps_url, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateLocationRequest) -> Result<Location, QrMarkError> {
        let location = sqlx::query_as::<_, Location>(&format!(
            r#"
            INSERT INTO locations (name, address, maps_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(request.name)
        .bind(request.address)
        .bind(request.maps_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(location)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Location>, QrMarkError> {
        let location = sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    pub async fn update(&self, id: i64, request: UpdateLocationRequest) -> Result<Option<Location>, QrMarkError> {
        let location = sqlx::query_as::<_, Location>(&format!(
            r#"
            UPDATE locations
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                maps_url = COALESCE($4, maps_url),
                updated_at = $5
            WHERE id = $1
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.address)
        .bind(request.maps_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Delete a location no event refers to
    pub async fn delete_unused(&self, id: i64) -> Result<bool, QrMarkError> {
        let result = sqlx::query(
            "DELETE FROM locations WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM events WHERE location_id = $1)"
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_all(&self) -> Result<Vec<Location>, QrMarkError> {
        let locations = sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name ASC, id ASC"))
            .fetch_all(&self.pool)
            .await?;

        Ok(locations)
    }
}
