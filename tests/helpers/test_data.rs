//! Test data fixtures

use chrono::{DateTime, Duration, TimeZone, Utc};
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use qrmark::models::{CreateDistributionListRequest, CreateEventRequest, CreateLocationRequest, CreateUserRequest, Role};
use std::sync::atomic::{AtomicUsize, Ordering};

static EMAIL_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Secret long enough to pass config validation
pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Fixed instant every test clock starts at
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

/// Unique, already-normalized email address
pub fn unique_email() -> String {
    let first: String = FirstName().fake();
    let n = EMAIL_SEQ.fetch_add(1, Ordering::SeqCst);
    format!("{}.{}@example.com", first.to_lowercase().replace(|c: char| !c.is_ascii_alphanumeric(), ""), n)
}

pub fn user_request(role: Role) -> CreateUserRequest {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    CreateUserRequest {
        email: unique_email(),
        full_name: format!("{} {}", first, last),
        role: Some(role),
    }
}

pub fn location_request(name: &str) -> CreateLocationRequest {
    CreateLocationRequest {
        name: name.to_string(),
        address: Some("1 Example Street".to_string()),
        maps_url: Some("https://maps.example.com/?q=1+Example+Street".to_string()),
    }
}

/// An event at `location_id` starting `starts_in` from `now` and lasting `length`
pub fn event_request(location_id: i64, now: DateTime<Utc>, starts_in: Duration, length: Duration) -> CreateEventRequest {
    let description: String = Sentence(3..8).fake();
    CreateEventRequest {
        title: "Quarterly planning session".to_string(),
        description,
        location_id,
        start_time: now + starts_in,
        end_time: now + starts_in + length,
        is_published: Some(true),
        capacity: Some(50),
        requires_checkout: Some(false),
        checkout_tolerance_minutes: Some(0),
    }
}

/// Same as [`event_request`] but with check-out required
pub fn checkout_event_request(
    location_id: i64,
    now: DateTime<Utc>,
    starts_in: Duration,
    length: Duration,
    tolerance_minutes: i32,
) -> CreateEventRequest {
    CreateEventRequest {
        requires_checkout: Some(true),
        checkout_tolerance_minutes: Some(tolerance_minutes),
        ..event_request(location_id, now, starts_in, length)
    }
}

pub fn list_request(name: &str) -> CreateDistributionListRequest {
    CreateDistributionListRequest {
        name: name.to_string(),
        description: Some("Members invited together".to_string()),
    }
}
