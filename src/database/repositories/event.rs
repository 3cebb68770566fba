//! Event repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::event::{Event, EventStatus, CreateEventRequest, UpdateEventRequest};
use crate::utils::errors::QrMarkError;

const EVENT_COLUMNS: &str = "id, title, description, location_id, start_time, end_time, status, is_published, capacity, \
     requires_checkout, checkout_tolerance_minutes, organizer_id, reminder_sent_at, created_at, updated_at";

fn status_names(statuses: &[EventStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[derive(Clone)]
#[derive(Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, request: CreateEventRequest, organizer_id: i64, status: EventStatus) -> Result<Event, QrMarkError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, description, location_id, start_time, end_time, status, is_published, capacity,
                                requires_checkout, checkout_tolerance_minutes, organizer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(request.title)
        .bind(request.description)
        .bind(request.location_id)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(status.as_str())
        .bind(request.is_published.unwrap_or(false))
        .bind(request.capacity)
        .bind(request.requires_checkout.unwrap_or(false))
        .bind(request.checkout_tolerance_minutes.unwrap_or(0))
        .bind(organizer_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, QrMarkError> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Update event
    pub async fn update(&self, id: i64, request: UpdateEventRequest) -> Result<Option<Event>, QrMarkError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                location_id = COALESCE($4, location_id),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                is_published = COALESCE($7, is_published),
                capacity = COALESCE($8, capacity),
                requires_checkout = COALESCE($9, requires_checkout),
                checkout_tolerance_minutes = COALESCE($10, checkout_tolerance_minutes),
                updated_at = $11
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.location_id)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(request.is_published)
        .bind(request.capacity)
        .bind(request.requires_checkout)
        .bind(request.checkout_tolerance_minutes)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Publish event; false if it was already published or does not exist
    pub async fn publish(&self, id: i64) -> Result<bool, QrMarkError> {
        let result = sqlx::query("UPDATE events SET is_published = TRUE, updated_at = $2 WHERE id = $1 AND is_published = FALSE")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete an event; invitations and attendance rows cascade
    pub async fn delete(&self, id: i64) -> Result<bool, QrMarkError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Compare-and-set on status
    pub async fn set_status(&self, id: i64, from: &[EventStatus], to: EventStatus) -> Result<bool, QrMarkError> {
        let result = sqlx::query("UPDATE events SET status = $3, updated_at = $4 WHERE id = $1 AND status = ANY($2)")
            .bind(id)
            .bind(status_names(from))
            .bind(to.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Claim the reminder for an event
    pub async fn mark_reminder_sent(&self, id: i64, now: DateTime<Utc>) -> Result<bool, QrMarkError> {
        let result = sqlx::query("UPDATE events SET reminder_sent_at = $2 WHERE id = $1 AND reminder_sent_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get events created by an organizer
    pub async fn list_by_organizer(&self, organizer_id: i64, status: Option<EventStatus>) -> Result<Vec<Event>, QrMarkError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE organizer_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY start_time ASC"
        ))
        .bind(organizer_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Get events in any of the given statuses
    pub async fn list_by_status(&self, statuses: &[EventStatus]) -> Result<Vec<Event>, QrMarkError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = ANY($1) ORDER BY start_time ASC"
        ))
        .bind(status_names(statuses))
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Get events a user is invited to or attended
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Event>, QrMarkError> {
        let events = sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events e
            WHERE EXISTS (SELECT 1 FROM invitations i WHERE i.event_id = e.id AND i.user_id = $1)
               OR EXISTS (SELECT 1 FROM attendances a WHERE a.event_id = e.id AND a.user_id = $1)
            ORDER BY e.start_time ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
