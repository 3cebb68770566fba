//! Notification service implementation
//!
//! Renders message templates, deduplicates recipients and hands the result to
//! a [`NotificationGateway`] on a detached task. Callers never wait on
//! delivery and never see its failures; those are logged and counted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::config::NotificationConfig;
use crate::models::{text_enum, Event, Role, ScanAction, User};
use crate::utils::errors::{NotificationError, NotificationResult, QrMarkError, Result};
use crate::utils::helpers::{format_timestamp, normalize_email, truncate_text};
use crate::utils::logging::log_notification_failure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Invitation,
    RoleChange,
    EventUpdate,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Invitation => "INVITATION",
            NotificationKind::RoleChange => "ROLE_CHANGE",
            NotificationKind::EventUpdate => "EVENT_UPDATE",
            NotificationKind::Reminder => "REMINDER",
        }
    }
}

text_enum!(NotificationKind, "notification kind", [Invitation, RoleChange, EventUpdate, Reminder]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient_email: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    pub related_entity_id: Option<i64>,
}

/// Outbound delivery channel
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &Notification) -> NotificationResult<()>;
}

/// Writes notifications to the log and nowhere else
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationGateway for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> NotificationResult<()> {
        info!(
            recipient = %notification.recipient_email,
            kind = %notification.kind,
            subject = %notification.subject,
            related_entity_id = ?notification.related_entity_id,
            "Notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a configured endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("qrmark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(QrMarkError::Http)?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, notification: &Notification) -> NotificationResult<()> {
        let response = self.http_client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout
                } else {
                    NotificationError::DeliveryFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        Ok(())
    }
}

/// Keeps every notification in memory. Recipients listed in `fail_for`
/// are rejected instead.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail_for: Arc<Mutex<HashSet<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, email: &str) {
        self.fail_for.lock().insert(normalize_email(email));
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, email: &str) -> Vec<Notification> {
        let email = normalize_email(email);
        self.sent.lock().iter().filter(|n| n.recipient_email == email).cloned().collect()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, notification: &Notification) -> NotificationResult<()> {
        if self.fail_for.lock().contains(&notification.recipient_email) {
            return Err(NotificationError::DeliveryFailed("recipient rejected".to_string()));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

/// Message template structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub key: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    fn render(&self, parameters: &HashMap<&str, String>) -> (String, String) {
        let mut subject = self.subject.clone();
        let mut body = self.body.clone();
        for (key, value) in parameters {
            let placeholder = format!("{{{}}}", key);
            subject = subject.replace(&placeholder, value);
            body = body.replace(&placeholder, value);
        }
        (subject, body)
    }
}

/// Notification statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total_sent: u64,
    pub total_failed: u64,
    pub sent_by_kind: HashMap<String, u64>,
}

#[derive(Clone)]
pub struct NotificationService {
    gateway: Arc<dyn NotificationGateway>,
    templates: Arc<HashMap<String, MessageTemplate>>,
    stats: Arc<Mutex<NotificationStats>>,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
    enabled: bool,
}

impl NotificationService {
    pub fn new(gateway: Arc<dyn NotificationGateway>, enabled: bool) -> Self {
        Self {
            gateway,
            templates: Arc::new(Self::load_default_templates()),
            stats: Arc::new(Mutex::new(NotificationStats::default())),
            in_flight: Arc::new(Mutex::new(Vec::new())),
            enabled,
        }
    }

    /// Pick the gateway from configuration: webhook when a URL is set, log otherwise
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let gateway: Arc<dyn NotificationGateway> = match config.webhook_url {
            Some(ref url) => Arc::new(WebhookNotifier::new(url.clone(), Duration::from_secs(config.timeout_seconds))?),
            None => Arc::new(LogNotifier),
        };
        info!(gateway = gateway.name(), enabled = config.enabled, "Notification gateway selected");
        Ok(Self::new(gateway, config.enabled))
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    pub fn notify_invitation(&self, invitee: &User, event: &Event) {
        let parameters = Self::event_parameters(event);
        self.send("invitation", std::slice::from_ref(&invitee.email), parameters, Some(event.id));
    }

    /// One rendered message per invitee, all dispatched together
    pub fn notify_invitations(&self, invitees: &[User], event: &Event) {
        let emails: Vec<String> = invitees.iter().map(|u| u.email.clone()).collect();
        self.send("invitation", &emails, Self::event_parameters(event), Some(event.id));
    }

    pub fn notify_role_change(&self, user: &User, new_role: Role) {
        let mut parameters = HashMap::new();
        parameters.insert("full_name", user.full_name.clone());
        parameters.insert("role", new_role.to_string());
        self.send("role_change", std::slice::from_ref(&user.email), parameters, Some(user.id));
    }

    pub fn notify_event_update(&self, recipients: &[String], event: &Event) {
        self.send("event_update", recipients, Self::event_parameters(event), Some(event.id));
    }

    pub fn notify_event_cancelled(&self, recipients: &[String], event: &Event) {
        self.send("event_cancelled", recipients, Self::event_parameters(event), Some(event.id));
    }

    pub fn notify_reminder(&self, recipients: &[String], event: &Event) {
        self.send("reminder", recipients, Self::event_parameters(event), Some(event.id));
    }

    /// Receipt to the attendee after a scan was recorded
    pub fn notify_attendance(&self, attendee: &User, event: &Event, action: ScanAction, at: DateTime<Utc>) {
        let mut parameters = Self::event_parameters(event);
        parameters.insert("action", match action {
            ScanAction::CheckIn => "checked in to".to_string(),
            ScanAction::CheckOut => "checked out of".to_string(),
        });
        parameters.insert("at", format_timestamp(at));
        self.send("attendance_recorded", std::slice::from_ref(&attendee.email), parameters, Some(event.id));
    }

    /// Render `template_key` once per distinct recipient and dispatch the batch
    pub fn send(&self, template_key: &str, recipients: &[String], parameters: HashMap<&str, String>, related_entity_id: Option<i64>) {
        let Some(template) = self.templates.get(template_key) else {
            warn!(template_key, "Unknown notification template");
            return;
        };

        let (subject, message) = template.render(&parameters);
        let notifications: Vec<Notification> = dedupe_recipients(recipients)
            .into_iter()
            .map(|recipient_email| Notification {
                recipient_email,
                kind: template.kind,
                subject: subject.clone(),
                message: message.clone(),
                related_entity_id,
            })
            .collect();

        self.dispatch(notifications);
    }

    /// Fire and forget. Returns immediately; delivery runs on its own task.
    pub fn dispatch(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        if !self.enabled {
            debug!(count = notifications.len(), "Notifications disabled, dropping");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(count = notifications.len(), "No async runtime available, notifications dropped");
            return;
        };

        let gateway = Arc::clone(&self.gateway);
        let stats = Arc::clone(&self.stats);
        let handle = runtime.spawn(async move {
            let deliveries = notifications.iter().map(|n| gateway.notify(n));
            let results = futures::future::join_all(deliveries).await;

            let mut stats = stats.lock();
            for (notification, result) in notifications.iter().zip(results) {
                match result {
                    Ok(()) => {
                        stats.total_sent += 1;
                        *stats.sent_by_kind.entry(notification.kind.to_string()).or_insert(0) += 1;
                    }
                    Err(e) => {
                        stats.total_failed += 1;
                        log_notification_failure(&notification.recipient_email, notification.kind.as_str(), &e.to_string());
                    }
                }
            }
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Wait for every dispatch started so far
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Notification task ended abnormally");
            }
        }
    }

    /// Get notification statistics
    pub fn stats(&self) -> NotificationStats {
        self.stats.lock().clone()
    }

    /// Get available template keys
    pub fn template_keys(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    fn event_parameters(event: &Event) -> HashMap<&'static str, String> {
        let mut parameters = HashMap::new();
        parameters.insert("event_title", event.title.clone());
        parameters.insert("event_start", format_timestamp(event.start_time));
        parameters.insert("event_end", format_timestamp(event.end_time));
        parameters.insert("event_description", truncate_text(&event.description, 280));
        parameters
    }

    /// Load default message templates
    fn load_default_templates() -> HashMap<String, MessageTemplate> {
        let templates = [
            MessageTemplate {
                key: "invitation".to_string(),
                kind: NotificationKind::Invitation,
                subject: "You're invited: {event_title}".to_string(),
                body: "You have been invited to {event_title}.\nStarts: {event_start}\nEnds: {event_end}\n\n{event_description}".to_string(),
            },
            MessageTemplate {
                key: "role_change".to_string(),
                kind: NotificationKind::RoleChange,
                subject: "Your role has changed".to_string(),
                body: "Hello {full_name}, your account role is now {role}.".to_string(),
            },
            MessageTemplate {
                key: "event_update".to_string(),
                kind: NotificationKind::EventUpdate,
                subject: "Event updated: {event_title}".to_string(),
                body: "Details of {event_title} have changed.\nStarts: {event_start}\nEnds: {event_end}\n\n{event_description}".to_string(),
            },
            MessageTemplate {
                key: "event_cancelled".to_string(),
                kind: NotificationKind::EventUpdate,
                subject: "Event cancelled: {event_title}".to_string(),
                body: "{event_title}, scheduled for {event_start}, has been cancelled.".to_string(),
            },
            MessageTemplate {
                key: "attendance_recorded".to_string(),
                kind: NotificationKind::EventUpdate,
                subject: "Attendance recorded: {event_title}".to_string(),
                body: "You {action} {event_title} at {at}.".to_string(),
            },
            MessageTemplate {
                key: "reminder".to_string(),
                kind: NotificationKind::Reminder,
                subject: "Reminder: {event_title}".to_string(),
                body: "{event_title} starts at {event_start}. Bring your check-in code.".to_string(),
            },
        ];

        templates.into_iter().map(|t| (t.key.clone(), t)).collect()
    }
}

/// Normalized, first-occurrence order, empty addresses dropped
fn dedupe_recipients(recipients: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    recipients
        .iter()
        .map(|r| normalize_email(r))
        .filter(|r| !r.is_empty() && seen.insert(r.clone()))
        .collect()
}
