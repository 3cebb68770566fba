//! Attendance recording
//!
//! Check-in and check-out are each a single conditional store write. Two
//! scanners racing on the same (event, user) both reach the store; one
//! write applies and the other observes the same business error a
//! sequential repeat would.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};
use crate::database::Store;
use crate::models::{Attendance, AttendanceStats, Event, EventStatus, ScanAction, User};
use crate::services::authorization::{Action, AuthorizationPolicy};
use crate::services::event::EventLifecycle;
use crate::services::notification::NotificationService;
use crate::services::token::TokenCodec;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{QrMarkError, Result};
use crate::utils::helpers::generate_uuid;
use crate::utils::logging::log_scan;

/// What a scanner sees after submitting a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub success: bool,
    /// `OK` or the stable error code
    pub code: String,
    pub message: String,
    pub action: Option<ScanAction>,
    pub attendance: Option<Attendance>,
}

impl ScanOutcome {
    fn recorded(action: ScanAction, attendance: Attendance) -> Self {
        let message = match action {
            ScanAction::CheckIn => "Check-in recorded",
            ScanAction::CheckOut => "Check-out recorded",
        };
        Self {
            success: true,
            code: "OK".to_string(),
            message: message.to_string(),
            action: Some(action),
            attendance: Some(attendance),
        }
    }

    fn rejected(action: Option<ScanAction>, error: &QrMarkError) -> Self {
        Self {
            success: false,
            code: error.code().to_string(),
            message: error.to_string(),
            action,
            attendance: None,
        }
    }
}

#[derive(Clone)]
pub struct AttendanceRecorder {
    store: Arc<dyn Store>,
    policy: AuthorizationPolicy,
    tokens: TokenCodec,
    events: EventLifecycle,
    notifications: NotificationService,
    clock: SharedClock,
}

impl AttendanceRecorder {
    pub fn new(
        store: Arc<dyn Store>,
        policy: AuthorizationPolicy,
        tokens: TokenCodec,
        events: EventLifecycle,
        notifications: NotificationService,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            policy,
            tokens,
            events,
            notifications,
            clock,
        }
    }

    /// Issue a token for `user_id`. Users may only ask for their own;
    /// scanners may ask on anyone's behalf. Until an event is published only
    /// its organizer and scanners can get tokens for it.
    pub async fn request_token(&self, event_id: i64, user_id: i64, action: ScanAction, requester_id: i64) -> Result<String> {
        let requester = self.load_user(requester_id).await?;
        self.policy.require(&requester, Action::RequestToken)?;
        if requester_id != user_id {
            self.policy.require(&requester, Action::ScanAttendance)?;
        }

        let event = self.events.get(event_id).await?;
        if !event.is_published
            && !event.is_owned_by(requester_id)
            && !self.policy.check(requester.role, Action::ScanAttendance)
        {
            return Err(QrMarkError::Forbidden(format!("event {} is not published", event_id)));
        }
        let still_closing = event.status == EventStatus::Completed
            && action == ScanAction::CheckOut
            && self.clock.now() <= event.checkout_deadline();
        if event.status.is_terminal() && !still_closing {
            return Err(QrMarkError::EventNotScannable {
                event_id,
                reason: format!("event is {}", event.status),
            });
        }
        self.load_user(user_id).await?;

        self.tokens.issue(event_id, user_id, action)
    }

    /// Verify a token and record what it authorizes. Business failures come
    /// back as an unsuccessful outcome; only infrastructure errors are `Err`.
    pub async fn consume(&self, token: &str, scanner_id: i64) -> Result<ScanOutcome> {
        let span = info_span!("scan", scan_id = %generate_uuid(), scanner_id);
        self.consume_token(token, scanner_id).instrument(span).await
    }

    async fn consume_token(&self, token: &str, scanner_id: i64) -> Result<ScanOutcome> {
        let payload = match self.tokens.verify(token) {
            Ok(payload) => payload,
            Err(e) => {
                let error = QrMarkError::Token(e);
                debug!(scanner_id, code = error.code(), "Token rejected");
                return Ok(ScanOutcome::rejected(None, &error));
            }
        };

        let result = match payload.action {
            ScanAction::CheckIn => self.record_check_in(payload.event_id, payload.user_id, scanner_id).await,
            ScanAction::CheckOut => self.record_check_out(payload.event_id, payload.user_id, scanner_id).await,
        };

        match result {
            Ok(attendance) => Ok(ScanOutcome::recorded(payload.action, attendance)),
            Err(e) if e.is_business() => {
                log_scan(payload.event_id, payload.user_id, scanner_id, payload.action, e.code());
                Ok(ScanOutcome::rejected(Some(payload.action), &e))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn record_check_in(&self, event_id: i64, user_id: i64, scanner_id: i64) -> Result<Attendance> {
        let (event, attendee) = self.scan_context(event_id, user_id, scanner_id).await?;
        let now = self.clock.now();
        self.events.check_in_window(&event, now)?;

        if !self.store.create_attendance_if_absent(event_id, user_id, scanner_id, now).await? {
            return Err(QrMarkError::AlreadyCheckedIn { event_id, user_id });
        }

        let attendance = self.load_attendance(event_id, user_id).await?;
        log_scan(event_id, user_id, scanner_id, ScanAction::CheckIn, "OK");
        self.notifications.notify_attendance(&attendee, &event, ScanAction::CheckIn, now);
        Ok(attendance)
    }

    pub async fn record_check_out(&self, event_id: i64, user_id: i64, scanner_id: i64) -> Result<Attendance> {
        let (event, attendee) = self.scan_context(event_id, user_id, scanner_id).await?;
        if !event.requires_checkout {
            return Err(QrMarkError::CheckoutNotRequired { event_id });
        }
        let now = self.clock.now();
        self.events.check_out_window(&event, now)?;

        if !self.store.set_checkout_if_pending(event_id, user_id, scanner_id, now).await? {
            return Err(match self.store.get_attendance(event_id, user_id).await? {
                Some(a) if a.is_checked_out() => QrMarkError::AlreadyCheckedOut { event_id, user_id },
                _ => QrMarkError::NotCheckedIn { event_id, user_id },
            });
        }

        let attendance = self.load_attendance(event_id, user_id).await?;
        log_scan(event_id, user_id, scanner_id, ScanAction::CheckOut, "OK");
        self.notifications.notify_attendance(&attendee, &event, ScanAction::CheckOut, now);
        Ok(attendance)
    }

    /// Attendance rows of an event, for its organizer or staff
    pub async fn list_for_event(&self, event_id: i64, viewer_id: i64) -> Result<Vec<Attendance>> {
        self.require_event_view(event_id, viewer_id).await?;
        self.store.list_attendances_by_event(event_id).await
    }

    /// A user's own attendance history; staff may look at anyone's
    pub async fn list_for_user(&self, user_id: i64, viewer_id: i64) -> Result<Vec<Attendance>> {
        let viewer = self.load_user(viewer_id).await?;
        if viewer_id == user_id {
            self.policy.require(&viewer, Action::ViewOwnData)?;
        } else {
            self.policy.require(&viewer, Action::ViewEventAttendance)?;
        }
        self.store.list_attendances_by_user(user_id).await
    }

    pub async fn stats(&self, event_id: i64, viewer_id: i64) -> Result<AttendanceStats> {
        self.require_event_view(event_id, viewer_id).await?;
        self.store.attendance_stats(event_id).await
    }

    /// Scanner capability, a scannable event and a known attendee
    async fn scan_context(&self, event_id: i64, user_id: i64, scanner_id: i64) -> Result<(Event, User)> {
        let scanner = self.load_user(scanner_id).await?;
        self.policy.require(&scanner, Action::ScanAttendance)?;

        let event = self.events.get(event_id).await?;
        if event.status == EventStatus::Cancelled {
            return Err(QrMarkError::EventNotScannable {
                event_id,
                reason: "event is CANCELLED".to_string(),
            });
        }

        let attendee = self.load_user(user_id).await?;
        Ok((event, attendee))
    }

    async fn require_event_view(&self, event_id: i64, viewer_id: i64) -> Result<Event> {
        let viewer = self.load_user(viewer_id).await?;
        let event = self.events.get(event_id).await?;
        if !event.is_owned_by(viewer_id) {
            self.policy.require(&viewer, Action::ViewEventAttendance)?;
        }
        Ok(event)
    }

    async fn load_attendance(&self, event_id: i64, user_id: i64) -> Result<Attendance> {
        self.store
            .get_attendance(event_id, user_id)
            .await?
            .ok_or(QrMarkError::NotCheckedIn { event_id, user_id })
    }

    async fn load_user(&self, user_id: i64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id })
    }
}
