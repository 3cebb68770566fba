//! Test context for integration tests

use chrono::Duration;
use qrmark::config::Settings;
use qrmark::models::{Event, Location, Role, User};
use qrmark::services::{NotificationService, RecordingNotifier, ServiceFactory};
use qrmark::utils::clock::{Clock, ManualClock};
use qrmark::{MemoryStore, Store};
use std::sync::{Arc, Once};
use tokio::sync::OnceCell;

use super::test_data::{base_time, checkout_event_request, event_request, location_request, user_request, TEST_SECRET};

static INIT: Once = Once::new();

/// Initialize test logging once per test binary
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("qrmark=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.tokens.secret = TEST_SECRET.to_string();
    settings
}

/// Services wired over an in-memory store, a manual clock and a
/// recording notification gateway
pub struct TestContext {
    pub services: ServiceFactory,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub notifier: RecordingNotifier,
    pub settings: Settings,
    location: OnceCell<Location>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        init_test_logging();

        let clock = ManualClock::new(base_time());
        let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
        let notifier = RecordingNotifier::new();
        let notifications = NotificationService::new(Arc::new(notifier.clone()), true);
        let services = ServiceFactory::new(&settings, store.clone(), Arc::new(clock.clone()), notifications)
            .expect("Failed to build services");

        Self {
            services,
            store,
            clock,
            notifier,
            settings,
            location: OnceCell::new(),
        }
    }

    /// Venue shared by the events this context creates
    pub async fn location(&self) -> &Location {
        self.location
            .get_or_init(|| async {
                self.store
                    .create_location(location_request("Main hall"))
                    .await
                    .expect("Failed to create location")
            })
            .await
    }

    pub async fn user(&self, role: Role) -> User {
        self.services
            .user_service
            .create_user(user_request(role))
            .await
            .expect("Failed to create user")
    }

    /// Published event without check-out
    pub async fn event(&self, organizer: &User, starts_in: Duration, length: Duration) -> Event {
        self.services
            .event_lifecycle
            .create(event_request(self.location().await.id, self.clock.now(), starts_in, length), organizer.id)
            .await
            .expect("Failed to create event")
    }

    /// Published event requiring check-out
    pub async fn checkout_event(&self, organizer: &User, starts_in: Duration, length: Duration, tolerance_minutes: i32) -> Event {
        self.services
            .event_lifecycle
            .create(
                checkout_event_request(self.location().await.id, self.clock.now(), starts_in, length, tolerance_minutes),
                organizer.id,
            )
            .await
            .expect("Failed to create event")
    }

    /// Wait for detached notification deliveries to land
    pub async fn settle(&self) {
        self.services.notification_service.flush().await;
    }
}
