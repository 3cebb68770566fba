//! Attendance repository implementation
//!
//! Check-in and check-out are single conditional statements, so concurrent
//! scans for the same (event, user) race inside Postgres and exactly one wins.

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::attendance::{Attendance, AttendanceStats};
use crate::utils::errors::QrMarkError;

const ATTENDANCE_COLUMNS: &str = "id, event_id, user_id, check_in_time, check_out_time, checked_in_by, checked_out_by";

#[derive(Clone)]
#[derive(Debug)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the check-in row unless the pair already has one
    pub async fn check_in_if_absent(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool, QrMarkError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendances (event_id, user_id, check_in_time, checked_in_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id, user_id) DO NOTHING
            "#
        )
        .bind(event_id)
        .bind(user_id)
        .bind(now)
        .bind(scanner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Stamp the check-out on a checked-in row that has none
    pub async fn check_out_if_pending(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool, QrMarkError> {
        let result = sqlx::query(
            r#"
            UPDATE attendances
            SET check_out_time = $3, checked_out_by = $4
            WHERE event_id = $1 AND user_id = $2
              AND check_in_time IS NOT NULL
              AND check_out_time IS NULL
            "#
        )
        .bind(event_id)
        .bind(user_id)
        .bind(now)
        .bind(scanner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find(&self, event_id: i64, user_id: i64) -> Result<Option<Attendance>, QrMarkError> {
        let attendance = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE event_id = $1 AND user_id = $2"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attendance)
    }

    pub async fn list_by_event(&self, event_id: i64) -> Result<Vec<Attendance>, QrMarkError> {
        let attendances = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE event_id = $1 ORDER BY check_in_time ASC, id ASC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attendances)
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Attendance>, QrMarkError> {
        let attendances = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = $1 ORDER BY check_in_time DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attendances)
    }

    /// Invitation and attendance counters for one event
    pub async fn stats(&self, event_id: i64) -> Result<AttendanceStats, QrMarkError> {
        let stats = sqlx::query_as::<_, AttendanceStats>(
            r#"
            SELECT
                e.id AS event_id,
                e.capacity,
                (SELECT COUNT(*) FROM invitations i WHERE i.event_id = e.id) AS invited,
                (SELECT COUNT(*) FROM invitations i WHERE i.event_id = e.id AND i.status = 'ACCEPTED') AS accepted,
                (SELECT COUNT(*) FROM invitations i WHERE i.event_id = e.id AND i.status = 'DECLINED') AS declined,
                (SELECT COUNT(*) FROM invitations i WHERE i.event_id = e.id AND i.status = 'PENDING') AS pending,
                (SELECT COUNT(*) FROM attendances a WHERE a.event_id = e.id AND a.check_in_time IS NOT NULL) AS checked_in,
                (SELECT COUNT(*) FROM attendances a WHERE a.event_id = e.id AND a.check_out_time IS NOT NULL) AS checked_out
            FROM events e
            WHERE e.id = $1
            "#
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stats.unwrap_or(AttendanceStats { event_id, ..Default::default() }))
    }
}
