//! Distribution list repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::distribution_list::{DistributionList, CreateDistributionListRequest, UpdateDistributionListRequest};
use crate::models::user::User;
use crate::utils::errors::QrMarkError;

const LIST_COLUMNS: &str = "id, name, description, organizer_id, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct DistributionListRepository {
    pool: PgPool,
}

impl DistributionListRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateDistributionListRequest, organizer_id: i64) -> Result<DistributionList, QrMarkError> {
        let list = sqlx::query_as::<_, DistributionList>(&format!(
            r#"
            INSERT INTO distribution_lists (name, description, organizer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(request.name)
        .bind(request.description)
        .bind(organizer_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(list)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<DistributionList>, QrMarkError> {
        let list = sqlx::query_as::<_, DistributionList>(&format!("SELECT {LIST_COLUMNS} FROM distribution_lists WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(list)
    }

    pub async fn update(&self, id: i64, request: UpdateDistributionListRequest) -> Result<Option<DistributionList>, QrMarkError> {
        let list = sqlx::query_as::<_, DistributionList>(&format!(
            r#"
            UPDATE distribution_lists
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = $4
            WHERE id = $1
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(list)
    }

    /// Delete a list; memberships go with it
    pub async fn delete(&self, id: i64) -> Result<bool, QrMarkError> {
        let result = sqlx::query("DELETE FROM distribution_lists WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_by_organizer(&self, organizer_id: i64) -> Result<Vec<DistributionList>, QrMarkError> {
        let lists = sqlx::query_as::<_, DistributionList>(&format!(
            "SELECT {LIST_COLUMNS} FROM distribution_lists WHERE organizer_id = $1 ORDER BY name ASC"
        ))
        .bind(organizer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    /// Add existing users to a list, ignoring current members
    pub async fn add_members(&self, list_id: i64, user_ids: &[i64]) -> Result<u64, QrMarkError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO distribution_list_members (list_id, user_id, added_at)
            SELECT $1, u.id, $3 FROM users u WHERE u.id = ANY($2)
            ON CONFLICT (list_id, user_id) DO NOTHING
            "#
        )
        .bind(list_id)
        .bind(user_ids)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn remove_member(&self, list_id: i64, user_id: i64) -> Result<bool, QrMarkError> {
        let result = sqlx::query("DELETE FROM distribution_list_members WHERE list_id = $1 AND user_id = $2")
            .bind(list_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get the users on a list
    pub async fn members(&self, list_id: i64) -> Result<Vec<User>, QrMarkError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.full_name, u.role, u.created_at, u.updated_at
            FROM users u
            JOIN distribution_list_members m ON m.user_id = u.id
            WHERE m.list_id = $1
            ORDER BY m.added_at ASC, u.id ASC
            "#
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
