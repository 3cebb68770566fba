//! Services module
//!
//! This module contains business logic services

pub mod attendance;
pub mod authorization;
pub mod distribution_list;
pub mod event;
pub mod invitation;
pub mod location;
pub mod notification;
pub mod scheduler;
pub mod token;
pub mod user;

// Re-export commonly used services
pub use attendance::{AttendanceRecorder, ScanOutcome};
pub use authorization::{Action, AuthorizationPolicy};
pub use distribution_list::DistributionListService;
pub use event::{derive_status, EventLifecycle};
pub use invitation::InvitationWorkflow;
pub use location::LocationService;
pub use notification::{
    LogNotifier, MessageTemplate, Notification, NotificationGateway, NotificationKind, NotificationService,
    NotificationStats, RecordingNotifier, WebhookNotifier,
};
pub use scheduler::{Scheduler, TickReport};
pub use token::{TokenCodec, TokenPayload};
pub use user::UserService;

use chrono::Duration;
use std::sync::Arc;
use crate::config::settings::Settings;
use crate::database::Store;
use crate::utils::clock::{SharedClock, SystemClock};
use crate::utils::errors::Result;

/// Service factory for creating and managing all services.
///
/// Every service shares the same store, clock and notification dispatcher.
#[derive(Clone)]
pub struct ServiceFactory {
    pub user_service: UserService,
    pub event_lifecycle: EventLifecycle,
    pub invitation_workflow: InvitationWorkflow,
    pub attendance_recorder: AttendanceRecorder,
    pub distribution_lists: DistributionListService,
    pub location_service: LocationService,
    pub notification_service: NotificationService,
    pub token_codec: TokenCodec,
    pub policy: AuthorizationPolicy,
    pub scheduler: Scheduler,
    store: Arc<dyn Store>,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(
        settings: &Settings,
        store: Arc<dyn Store>,
        clock: SharedClock,
        notification_service: NotificationService,
    ) -> Result<Self> {
        let policy = AuthorizationPolicy::new();
        let token_codec = TokenCodec::new(&settings.tokens, clock.clone())?;

        let event_lifecycle = EventLifecycle::new(
            store.clone(),
            policy,
            notification_service.clone(),
            clock.clone(),
            Duration::minutes(settings.attendance.checkin_grace_minutes),
        );
        let invitation_workflow = InvitationWorkflow::new(
            store.clone(),
            policy,
            event_lifecycle.clone(),
            notification_service.clone(),
            clock.clone(),
        );
        let attendance_recorder = AttendanceRecorder::new(
            store.clone(),
            policy,
            token_codec.clone(),
            event_lifecycle.clone(),
            notification_service.clone(),
            clock.clone(),
        );
        let user_service = UserService::new(store.clone(), policy, notification_service.clone());
        let distribution_lists = DistributionListService::new(store.clone(), policy);
        let location_service = LocationService::new(store.clone(), policy);
        let scheduler = Scheduler::new(event_lifecycle.clone(), clock, &settings.scheduler);

        Ok(Self {
            user_service,
            event_lifecycle,
            invitation_workflow,
            attendance_recorder,
            distribution_lists,
            location_service,
            notification_service,
            token_codec,
            policy,
            scheduler,
            store,
        })
    }

    /// Wire everything from configuration with the wall clock
    pub fn from_settings(settings: &Settings, store: Arc<dyn Store>) -> Result<Self> {
        let notification_service = NotificationService::from_config(&settings.notifications)?;
        Self::new(settings, store, Arc::new(SystemClock), notification_service)
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let store_reachable = self.store.get_user(0).await.is_ok();
        let stats = self.notification_service.stats();

        ServiceHealthStatus {
            store_reachable,
            notification_gateway: self.notification_service.gateway_name(),
            notifications_sent: stats.total_sent,
            notifications_failed: stats.total_failed,
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub store_reachable: bool,
    pub notification_gateway: &'static str,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.store_reachable
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.store_reachable {
            issues.push("Store is unreachable".to_string());
        }
        if self.notifications_failed > 0 {
            issues.push(format!("{} notifications failed delivery", self.notifications_failed));
        }

        issues
    }
}
