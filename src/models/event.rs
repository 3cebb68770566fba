//! Event model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use super::text_enum;

/// Event lifecycle status.
///
/// The forward path `Upcoming -> InProgress -> Completed` follows the clock.
/// `Cancelled` is reachable from `Upcoming` or `InProgress` by an organizer
/// and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "UPCOMING",
            EventStatus::InProgress => "IN_PROGRESS",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Cancelled => "CANCELLED",
        }
    }

    /// No further transitions leave a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            EventStatus::Upcoming => 0,
            EventStatus::InProgress => 1,
            EventStatus::Completed => 2,
            EventStatus::Cancelled => 3,
        }
    }

    /// Whether `self -> next` is a legal lifecycle move
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            EventStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

text_enum!(EventStatus, "event status", [Upcoming, InProgress, Completed, Cancelled]);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub is_published: bool,
    pub capacity: Option<i32>,
    pub requires_checkout: bool,
    pub checkout_tolerance_minutes: i32,
    pub organizer_id: i64,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Latest instant a check-out is still accepted
    pub fn checkout_deadline(&self) -> DateTime<Utc> {
        self.end_time + Duration::minutes(i64::from(self.checkout_tolerance_minutes.max(0)))
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.organizer_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub location_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_published: Option<bool>,
    pub capacity: Option<i32>,
    pub requires_checkout: Option<bool>,
    pub checkout_tolerance_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location_id: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_published: Option<bool>,
    pub capacity: Option<i32>,
    pub requires_checkout: Option<bool>,
    pub checkout_tolerance_minutes: Option<i32>,
}

impl UpdateEventRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location_id.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.is_published.is_none()
            && self.capacity.is_none()
            && self.requires_checkout.is_none()
            && self.checkout_tolerance_minutes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_only() {
        use EventStatus::*;
        assert!(Upcoming.can_transition_to(InProgress));
        assert!(Upcoming.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Upcoming));
        assert!(!Completed.can_transition_to(InProgress));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        use EventStatus::*;
        assert!(Upcoming.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        for next in [Upcoming, InProgress, Completed, Cancelled] {
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_status_text_mapping() {
        assert_eq!("IN_PROGRESS".parse::<EventStatus>().unwrap(), EventStatus::InProgress);
        assert_eq!(EventStatus::Cancelled.to_string(), "CANCELLED");
        assert!("DONE".parse::<EventStatus>().is_err());
    }
}
