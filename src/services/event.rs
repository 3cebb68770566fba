//! Event lifecycle service
//!
//! Owns event status. `UPCOMING -> IN_PROGRESS -> COMPLETED` follows the
//! clock and is persisted with compare-and-set writes; `CANCELLED` is the
//! only transition a caller can request.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use crate::database::Store;
use crate::models::{CreateEventRequest, Event, EventStatus, InvitationStatus, UpdateEventRequest, User};
use crate::services::authorization::{Action, AuthorizationPolicy};
use crate::services::notification::NotificationService;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{QrMarkError, Result};
use crate::utils::helpers::format_timestamp;
use crate::utils::logging::{log_database_operation, log_event_action};

const MIN_TITLE_LEN: usize = 3;

/// Status implied by the clock. Terminal statuses stick and the result
/// never ranks below `event.status`.
pub fn derive_status(event: &Event, now: DateTime<Utc>) -> EventStatus {
    if event.status.is_terminal() {
        return event.status;
    }

    let by_clock = if now < event.start_time {
        EventStatus::Upcoming
    } else if now < event.end_time {
        EventStatus::InProgress
    } else {
        EventStatus::Completed
    };

    if event.status.can_transition_to(by_clock) {
        by_clock
    } else {
        event.status
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(QrMarkError::InvalidInput(format!(
            "Event title must be at least {} characters",
            MIN_TITLE_LEN
        )));
    }
    Ok(())
}

fn validate_schedule(start: DateTime<Utc>, end: DateTime<Utc>, capacity: Option<i32>, tolerance: Option<i32>) -> Result<()> {
    if end <= start {
        return Err(QrMarkError::InvalidInput("Event must end after it starts".to_string()));
    }
    if matches!(capacity, Some(c) if c <= 0) {
        return Err(QrMarkError::InvalidInput("Capacity must be greater than 0".to_string()));
    }
    if matches!(tolerance, Some(t) if t < 0) {
        return Err(QrMarkError::InvalidInput("Check-out tolerance cannot be negative".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct EventLifecycle {
    store: Arc<dyn Store>,
    policy: AuthorizationPolicy,
    notifications: NotificationService,
    clock: SharedClock,
    checkin_grace: Duration,
}

impl EventLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        policy: AuthorizationPolicy,
        notifications: NotificationService,
        clock: SharedClock,
        checkin_grace: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            notifications,
            clock,
            checkin_grace,
        }
    }

    pub fn checkin_grace(&self) -> Duration {
        self.checkin_grace
    }

    /// Create an event owned by `organizer_id`
    pub async fn create(&self, request: CreateEventRequest, organizer_id: i64) -> Result<Event> {
        let organizer = self.load_user(organizer_id).await?;
        self.policy.require(&organizer, Action::ManageEvents)?;

        validate_title(&request.title)?;
        validate_schedule(request.start_time, request.end_time, request.capacity, request.checkout_tolerance_minutes)?;
        self.require_location(request.location_id).await?;

        let now = self.clock.now();
        let status = if now < request.start_time {
            EventStatus::Upcoming
        } else if now < request.end_time {
            EventStatus::InProgress
        } else {
            EventStatus::Completed
        };

        let event = self.store.create_event(request, organizer_id, status).await?;
        log_event_action(event.id, "create", organizer_id, Some(event.title.as_str()));
        Ok(event)
    }

    /// Fetch an event, bringing its status up to date first
    pub async fn get(&self, event_id: i64) -> Result<Event> {
        let event = self.load_event(event_id).await?;
        self.refresh(event).await
    }

    pub async fn refresh_status(&self, event_id: i64) -> Result<Event> {
        self.get(event_id).await
    }

    /// Persist the clock-derived status of every non-terminal event.
    /// Returns how many events moved.
    pub async fn refresh_all(&self) -> Result<usize> {
        let events = self.store.list_events_by_status(&[EventStatus::Upcoming, EventStatus::InProgress]).await?;
        let mut changed = 0;
        for event in events {
            let before = event.status;
            if self.refresh(event).await?.status != before {
                changed += 1;
            }
        }
        log_database_operation("refresh_status", "events", changed as u64);
        Ok(changed)
    }

    async fn refresh(&self, mut event: Event) -> Result<Event> {
        let derived = derive_status(&event, self.clock.now());
        if derived == event.status {
            return Ok(event);
        }

        if self.store.set_event_status(event.id, &[event.status], derived).await? {
            debug!(event_id = event.id, from = %event.status, to = %derived, "Event status advanced");
            event.status = derived;
            Ok(event)
        } else {
            // Someone else moved it first
            self.load_event(event.id).await
        }
    }

    /// Make the event visible. Publishing twice is a no-op.
    pub async fn publish(&self, event_id: i64, organizer_id: i64) -> Result<Event> {
        let event = self.owned_event(event_id, organizer_id).await?;
        if event.is_published {
            return Ok(event);
        }
        if event.status == EventStatus::Cancelled {
            return Err(QrMarkError::InvalidStateTransition {
                from: event.status.to_string(),
                to: "PUBLISHED".to_string(),
            });
        }

        if self.store.publish_event(event_id).await? {
            log_event_action(event_id, "publish", organizer_id, None);
        }
        self.load_event(event_id).await
    }

    /// Cancel an upcoming or running event and tell everyone involved
    pub async fn cancel(&self, event_id: i64, organizer_id: i64) -> Result<Event> {
        let event = self.owned_event(event_id, organizer_id).await?;
        if !event.status.can_transition_to(EventStatus::Cancelled) {
            return Err(QrMarkError::InvalidStateTransition {
                from: event.status.to_string(),
                to: EventStatus::Cancelled.to_string(),
            });
        }

        let applied = self.store
            .set_event_status(event_id, &[EventStatus::Upcoming, EventStatus::InProgress], EventStatus::Cancelled)
            .await?;
        let event = self.load_event(event_id).await?;
        if !applied {
            return Err(QrMarkError::InvalidStateTransition {
                from: event.status.to_string(),
                to: EventStatus::Cancelled.to_string(),
            });
        }

        let recipients = self.recipients(event_id).await?;
        log_event_action(event_id, "cancel", organizer_id, Some(&format!("{} recipients", recipients.len())));
        self.notifications.notify_event_cancelled(&recipients, &event);
        Ok(event)
    }

    /// Remove an event with its invitations and attendance. Participants of
    /// an event that had not finished are told it is cancelled.
    pub async fn delete(&self, event_id: i64, organizer_id: i64) -> Result<()> {
        let event = self.owned_event(event_id, organizer_id).await?;
        let recipients = self.recipients(event_id).await?;

        if !self.store.delete_event(event_id).await? {
            return Err(QrMarkError::EventNotFound { event_id });
        }
        log_event_action(event_id, "delete", organizer_id, Some(&format!("{} recipients", recipients.len())));

        if !event.status.is_terminal() {
            self.notifications.notify_event_cancelled(&recipients, &event);
        }
        Ok(())
    }

    /// Change event details. Published events notify their participants.
    pub async fn update(&self, event_id: i64, request: UpdateEventRequest, organizer_id: i64) -> Result<Event> {
        let event = self.owned_event(event_id, organizer_id).await?;
        if event.status.is_terminal() {
            return Err(QrMarkError::InvalidStateTransition {
                from: event.status.to_string(),
                to: "UPDATED".to_string(),
            });
        }
        if request.is_empty() {
            return Ok(event);
        }

        if let Some(ref title) = request.title {
            validate_title(title)?;
        }
        validate_schedule(
            request.start_time.unwrap_or(event.start_time),
            request.end_time.unwrap_or(event.end_time),
            request.capacity,
            request.checkout_tolerance_minutes,
        )?;
        if let Some(location_id) = request.location_id {
            self.require_location(location_id).await?;
        }

        let updated = self.store
            .update_event(event_id, request)
            .await?
            .ok_or(QrMarkError::EventNotFound { event_id })?;
        let updated = self.refresh(updated).await?;
        log_event_action(event_id, "update", organizer_id, None);

        if updated.is_published {
            let recipients = self.recipients(event_id).await?;
            self.notifications.notify_event_update(&recipients, &updated);
        }
        Ok(updated)
    }

    /// Check-in is open from `start - grace` through `end`
    pub fn check_in_window(&self, event: &Event, now: DateTime<Utc>) -> Result<()> {
        if event.status.is_terminal() {
            return Err(not_scannable(event, format!("event is {}", event.status)));
        }
        let opens = event.start_time - self.checkin_grace;
        if now < opens {
            return Err(not_scannable(event, format!("check-in opens at {}", format_timestamp(opens))));
        }
        if now > event.end_time {
            return Err(not_scannable(event, "check-in has closed".to_string()));
        }
        Ok(())
    }

    /// Check-out is open from `start` through `end + tolerance`. An event
    /// that completed at `end` still accepts check-outs inside the tolerance.
    pub fn check_out_window(&self, event: &Event, now: DateTime<Utc>) -> Result<()> {
        if event.status == EventStatus::Cancelled {
            return Err(not_scannable(event, "event is CANCELLED".to_string()));
        }
        if now < event.start_time {
            return Err(not_scannable(event, format!("check-out opens at {}", format_timestamp(event.start_time))));
        }
        if now > event.checkout_deadline() {
            return Err(not_scannable(event, "check-out has closed".to_string()));
        }
        Ok(())
    }

    pub async fn list_by_organizer(&self, organizer_id: i64, status: Option<EventStatus>) -> Result<Vec<Event>> {
        self.store.list_events_by_organizer(organizer_id, status).await
    }

    pub async fn list_upcoming(&self) -> Result<Vec<Event>> {
        self.store.list_events_by_status(&[EventStatus::Upcoming]).await
    }

    pub async fn list_in_progress(&self) -> Result<Vec<Event>> {
        self.store.list_events_by_status(&[EventStatus::InProgress]).await
    }

    /// Events the user was invited to or attended
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Event>> {
        self.store.list_events_for_user(user_id).await
    }

    /// Remind accepted invitees of published events starting within `lead`.
    /// Each event is reminded at most once.
    pub async fn send_reminders(&self, now: DateTime<Utc>, lead: Duration) -> Result<usize> {
        let horizon = now + lead;
        let due: Vec<Event> = self.list_upcoming()
            .await?
            .into_iter()
            .filter(|e| e.is_published && e.reminder_sent_at.is_none() && e.start_time > now && e.start_time <= horizon)
            .collect();

        let mut sent = 0;
        for event in due {
            if !self.store.mark_reminder_sent(event.id, now).await? {
                continue;
            }
            let recipients = self.accepted_emails(event.id).await?;
            self.notifications.notify_reminder(&recipients, &event);
            sent += 1;
        }

        if sent > 0 {
            info!(events = sent, "Event reminders dispatched");
        }
        Ok(sent)
    }

    /// Distinct emails of accepted invitees and of anyone with an attendance row
    pub async fn recipients(&self, event_id: i64) -> Result<Vec<String>> {
        let mut user_ids: Vec<i64> = self.store
            .list_invitations_by_event(event_id)
            .await?
            .into_iter()
            .filter(|i| i.status == InvitationStatus::Accepted)
            .map(|i| i.user_id)
            .collect();
        user_ids.extend(self.store.list_attendances_by_event(event_id).await?.into_iter().map(|a| a.user_id));
        self.emails_of(&user_ids).await
    }

    async fn accepted_emails(&self, event_id: i64) -> Result<Vec<String>> {
        let user_ids: Vec<i64> = self.store
            .list_invitations_by_event(event_id)
            .await?
            .into_iter()
            .filter(|i| i.status == InvitationStatus::Accepted)
            .map(|i| i.user_id)
            .collect();
        self.emails_of(&user_ids).await
    }

    async fn emails_of(&self, user_ids: &[i64]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut emails = Vec::new();
        for user_id in user_ids {
            if !seen.insert(*user_id) {
                continue;
            }
            if let Some(user) = self.store.get_user(*user_id).await? {
                emails.push(user.email);
            }
        }
        Ok(emails)
    }

    /// Load an event the acting organizer owns, with its status refreshed
    async fn owned_event(&self, event_id: i64, organizer_id: i64) -> Result<Event> {
        let organizer = self.load_user(organizer_id).await?;
        self.policy.require(&organizer, Action::ManageEvents)?;

        let event = self.get(event_id).await?;
        if !event.is_owned_by(organizer_id) {
            return Err(QrMarkError::Forbidden(format!(
                "user {} does not own event {}",
                organizer_id, event_id
            )));
        }
        Ok(event)
    }

    async fn require_location(&self, location_id: i64) -> Result<()> {
        match self.store.get_location(location_id).await? {
            Some(_) => Ok(()),
            None => Err(QrMarkError::LocationNotFound { location_id }),
        }
    }

    async fn load_event(&self, event_id: i64) -> Result<Event> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or(QrMarkError::EventNotFound { event_id })
    }

    async fn load_user(&self, user_id: i64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id })
    }
}

fn not_scannable(event: &Event, reason: String) -> QrMarkError {
    QrMarkError::EventNotScannable {
        event_id: event.id,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: EventStatus, start: DateTime<Utc>) -> Event {
        Event {
            id: 1,
            title: "Standup".to_string(),
            description: String::new(),
            location_id: 1,
            start_time: start,
            end_time: start + Duration::hours(2),
            status,
            is_published: false,
            capacity: None,
            requires_checkout: true,
            checkout_tolerance_minutes: 15,
            organizer_id: 1,
            reminder_sent_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_derive_status_follows_clock() {
        let start = Utc::now();
        let e = event(EventStatus::Upcoming, start);
        assert_eq!(derive_status(&e, start - Duration::minutes(1)), EventStatus::Upcoming);
        assert_eq!(derive_status(&e, start), EventStatus::InProgress);
        assert_eq!(derive_status(&e, start + Duration::hours(2)), EventStatus::Completed);
    }

    #[test]
    fn test_derive_status_never_moves_back() {
        let start = Utc::now();
        let running = event(EventStatus::InProgress, start);
        assert_eq!(derive_status(&running, start - Duration::hours(1)), EventStatus::InProgress);

        let cancelled = event(EventStatus::Cancelled, start);
        assert_eq!(derive_status(&cancelled, start + Duration::hours(5)), EventStatus::Cancelled);
    }

    #[test]
    fn test_schedule_validation() {
        let start = Utc::now();
        assert!(validate_schedule(start, start, None, None).is_err());
        assert!(validate_schedule(start, start + Duration::hours(1), Some(0), None).is_err());
        assert!(validate_schedule(start, start + Duration::hours(1), None, Some(-1)).is_err());
        assert!(validate_schedule(start, start + Duration::hours(1), Some(10), Some(0)).is_ok());
        assert!(validate_title("ab").is_err());
        assert!(validate_title("  abc ").is_ok());
    }
}
