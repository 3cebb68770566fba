//! Invitation repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::invitation::{Invitation, InvitationStatus};
use crate::utils::errors::QrMarkError;

const INVITATION_COLUMNS: &str = "id, event_id, user_id, sender_id, status, created_at, responded_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct InvitationRepository {
    pool: PgPool,
}

impl InvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the invitation for an (event, user) pair
    pub async fn find(&self, event_id: i64, user_id: i64) -> Result<Option<Invitation>, QrMarkError> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE event_id = $1 AND user_id = $2"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invitation)
    }

    /// Find invitation by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Invitation>, QrMarkError> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invitation)
    }

    /// Insert a pending invitation; `None` when the pair already has one
    pub async fn insert_if_absent(&self, event_id: i64, user_id: i64, sender_id: i64) -> Result<Option<Invitation>, QrMarkError> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            INSERT INTO invitations (event_id, user_id, sender_id, status, created_at)
            VALUES ($1, $2, $3, 'PENDING', $4)
            ON CONFLICT (event_id, user_id) DO NOTHING
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(sender_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(invitation)
    }

    /// Insert pending invitations for every existing user in `user_ids` that has none yet
    pub async fn insert_many_if_absent(&self, event_id: i64, user_ids: &[i64], sender_id: i64) -> Result<Vec<Invitation>, QrMarkError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            INSERT INTO invitations (event_id, user_id, sender_id, status, created_at)
            SELECT $1, u.id, $3, 'PENDING', $4 FROM users u WHERE u.id = ANY($2)
            ON CONFLICT (event_id, user_id) DO NOTHING
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(user_ids)
        .bind(sender_id)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    /// Answer an invitation that is still pending
    pub async fn respond_if_pending(&self, id: i64, status: InvitationStatus, now: DateTime<Utc>) -> Result<bool, QrMarkError> {
        let result = sqlx::query("UPDATE invitations SET status = $2, responded_at = $3 WHERE id = $1 AND status = 'PENDING'")
            .bind(id)
            .bind(status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete invitation
    pub async fn delete(&self, id: i64) -> Result<bool, QrMarkError> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get invitations of an event
    pub async fn list_by_event(&self, event_id: i64) -> Result<Vec<Invitation>, QrMarkError> {
        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE event_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    /// Get invitations of a user
    pub async fn list_by_user(&self, user_id: i64, status: Option<InvitationStatus>) -> Result<Vec<Invitation>, QrMarkError> {
        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }
}
