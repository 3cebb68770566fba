//! Store contract against Postgres. Skipped unless TEST_DATABASE_URL is set.

mod helpers;

use chrono::{Duration, Utc};
use futures::future::join_all;
use helpers::*;
use qrmark::models::{EventStatus, InvitationStatus, Role};
use qrmark::{DatabaseService, Store};
use serial_test::serial;
use std::sync::Arc;

async fn setup() -> Option<(TestDatabase, Arc<DatabaseService>)> {
    init_test_logging();
    let db = TestDatabase::from_env().await?;
    let store = Arc::new(DatabaseService::new(db.pool.clone()));
    Some((db, store))
}

#[tokio::test]
#[serial]
async fn test_pg_invitation_insert_if_absent() {
    let Some((_db, store)) = setup().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let organizer = store.create_user(user_request(Role::Organizer)).await.unwrap();
    let location = store.create_location(location_request("Main hall")).await.unwrap();
    let user = store.create_user(user_request(Role::User)).await.unwrap();
    let event = store
        .create_event(event_request(location.id, Utc::now(), Duration::days(1), Duration::hours(1)), organizer.id, EventStatus::Upcoming)
        .await
        .unwrap();

    let first = store.insert_invitation_if_absent(event.id, user.id, organizer.id).await.unwrap();
    assert!(first.is_some());
    let second = store.insert_invitation_if_absent(event.id, user.id, organizer.id).await.unwrap();
    assert!(second.is_none());

    let created = store
        .insert_invitations_if_absent(event.id, &[user.id, organizer.id, 987_654], organizer.id)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].user_id, organizer.id);

    let invitation = first.unwrap();
    assert!(store.set_invitation_status_if_pending(invitation.id, InvitationStatus::Accepted, Utc::now()).await.unwrap());
    assert!(!store.set_invitation_status_if_pending(invitation.id, InvitationStatus::Declined, Utc::now()).await.unwrap());

    let stats = store.attendance_stats(event.id).await.unwrap();
    assert_eq!(stats.invited, 2);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.pending, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pg_concurrent_check_in() {
    let Some((_db, store)) = setup().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let organizer = store.create_user(user_request(Role::Organizer)).await.unwrap();
    let location = store.create_location(location_request("Main hall")).await.unwrap();
    let user = store.create_user(user_request(Role::User)).await.unwrap();
    let event = store
        .create_event(event_request(location.id, Utc::now(), Duration::zero(), Duration::hours(1)), organizer.id, EventStatus::InProgress)
        .await
        .unwrap();

    let tasks = (0..8).map(|_| {
        let store = store.clone();
        let (event_id, user_id, scanner_id) = (event.id, user.id, organizer.id);
        tokio::spawn(async move { store.create_attendance_if_absent(event_id, user_id, scanner_id, Utc::now()).await })
    });
    let applied = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|applied| *applied)
        .count();
    assert_eq!(applied, 1);

    assert!(store.set_checkout_if_pending(event.id, user.id, organizer.id, Utc::now()).await.unwrap());
    assert!(!store.set_checkout_if_pending(event.id, user.id, organizer.id, Utc::now()).await.unwrap());

    let row = store.get_attendance(event.id, user.id).await.unwrap().unwrap();
    assert!(row.is_checked_out());
}

#[tokio::test]
#[serial]
async fn test_pg_event_status_compare_and_set() {
    let Some((_db, store)) = setup().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let organizer = store.create_user(user_request(Role::Organizer)).await.unwrap();
    let location = store.create_location(location_request("Main hall")).await.unwrap();
    let event = store
        .create_event(event_request(location.id, Utc::now(), Duration::hours(2), Duration::hours(1)), organizer.id, EventStatus::Upcoming)
        .await
        .unwrap();

    assert!(store.set_event_status(event.id, &[EventStatus::Upcoming], EventStatus::Cancelled).await.unwrap());
    assert!(!store.set_event_status(event.id, &[EventStatus::Upcoming], EventStatus::InProgress).await.unwrap());

    assert!(store.mark_reminder_sent(event.id, Utc::now()).await.unwrap());
    assert!(!store.mark_reminder_sent(event.id, Utc::now()).await.unwrap());

    assert!(store.set_user_role(organizer.id, Role::Organizer, Role::Moderator).await.unwrap());
    assert!(!store.set_user_role(organizer.id, Role::Organizer, Role::Moderator).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_pg_delete_event_cascades_and_pins_location() {
    let Some((_db, store)) = setup().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let organizer = store.create_user(user_request(Role::Organizer)).await.unwrap();
    let user = store.create_user(user_request(Role::User)).await.unwrap();
    let location = store.create_location(location_request("Main hall")).await.unwrap();
    let event = store
        .create_event(event_request(location.id, Utc::now(), Duration::zero(), Duration::hours(1)), organizer.id, EventStatus::InProgress)
        .await
        .unwrap();
    store.insert_invitation_if_absent(event.id, user.id, organizer.id).await.unwrap();
    store.create_attendance_if_absent(event.id, user.id, organizer.id, Utc::now()).await.unwrap();

    assert!(!store.delete_location(location.id).await.unwrap());

    assert!(store.delete_event(event.id).await.unwrap());
    assert!(!store.delete_event(event.id).await.unwrap());
    assert!(store.get_invitation(event.id, user.id).await.unwrap().is_none());
    assert!(store.get_attendance(event.id, user.id).await.unwrap().is_none());

    assert!(store.delete_location(location.id).await.unwrap());
    assert!(store.get_location(location.id).await.unwrap().is_none());
}
