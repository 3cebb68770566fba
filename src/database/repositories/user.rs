//! User repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::user::{User, Role, CreateUserRequest, UpdateUserRequest};
use crate::utils::errors::QrMarkError;

const USER_COLUMNS: &str = "id, email, full_name, role, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, QrMarkError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, full_name, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(request.email)
        .bind(request.full_name)
        .bind(request.role.unwrap_or(Role::User).as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, QrMarkError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, QrMarkError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// List users, optionally restricted to one role
    pub async fn list(&self, role: Option<Role>) -> Result<Vec<User>, QrMarkError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY id ASC"
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Update user profile
    pub async fn update(&self, id: i64, request: UpdateUserRequest) -> Result<Option<User>, QrMarkError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                updated_at = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.full_name)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Change the role only while it still holds the expected value
    pub async fn set_role(&self, id: i64, from: Role, to: Role) -> Result<bool, QrMarkError> {
        let result = sqlx::query("UPDATE users SET role = $3, updated_at = $4 WHERE id = $1 AND role = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
