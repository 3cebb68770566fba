//! Racing writers resolve to exactly one winner

mod helpers;

use chrono::Duration;
use futures::future::join_all;
use helpers::*;
use qrmark::models::{InvitationStatus, Role};
use qrmark::services::NotificationKind;
use qrmark::QrMarkError;

const RACERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_check_ins_record_once() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let mut scanners = Vec::new();
    for _ in 0..4 {
        scanners.push(ctx.user(Role::Moderator).await);
    }
    let event = ctx.event(&organizer, Duration::zero(), Duration::hours(1)).await;

    let tasks = (0..RACERS).map(|i| {
        let recorder = ctx.services.attendance_recorder.clone();
        let scanner_id = scanners[i % scanners.len()].id;
        let (event_id, user_id) = (event.id, user.id);
        tokio::spawn(async move { recorder.record_check_in(event_id, user_id, scanner_id).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let repeats = results
        .iter()
        .filter(|r| matches!(r, Err(QrMarkError::AlreadyCheckedIn { .. })))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(repeats, RACERS - 1);

    let rows = ctx.services.attendance_recorder.list_for_event(event.id, organizer.id).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_check_outs_record_once() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let scanner = ctx.user(Role::Moderator).await;
    let event = ctx.checkout_event(&organizer, Duration::zero(), Duration::hours(1), 15).await;

    ctx.services.attendance_recorder.record_check_in(event.id, user.id, scanner.id).await.unwrap();
    ctx.clock.advance(Duration::minutes(30));

    let tasks = (0..RACERS).map(|_| {
        let recorder = ctx.services.attendance_recorder.clone();
        let (event_id, user_id, scanner_id) = (event.id, user.id, scanner.id);
        tokio::spawn(async move { recorder.record_check_out(event_id, user_id, scanner_id).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(e @ QrMarkError::AlreadyCheckedOut { .. }) if e.code() == "NOT_CHECKED_IN")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invites_create_one_invitation() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;

    let tasks = (0..RACERS).map(|_| {
        let workflow = ctx.services.invitation_workflow.clone();
        let (event_id, user_id, sender_id) = (event.id, user.id, organizer.id);
        tokio::spawn(async move { workflow.invite(event_id, user_id, sender_id).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(QrMarkError::DuplicateInvitation { .. }))));

    ctx.settle().await;
    assert_eq!(ctx.notifier.count(NotificationKind::Invitation), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_bulk_invites_partition_users() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let mut user_ids = Vec::new();
    for _ in 0..12 {
        user_ids.push(ctx.user(Role::User).await.id);
    }
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;

    // Each batch overlaps its neighbours
    let batches: Vec<Vec<i64>> = (0..4).map(|i| user_ids[i * 2..i * 2 + 6].to_vec()).collect();
    let tasks = batches.into_iter().map(|batch| {
        let workflow = ctx.services.invitation_workflow.clone();
        let (event_id, sender_id) = (event.id, organizer.id);
        tokio::spawn(async move { workflow.bulk_invite(event_id, &batch, sender_id).await })
    });
    let reports: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap().unwrap()).collect();

    let created: usize = reports.iter().map(|r| r.created_count()).sum();
    assert_eq!(created, 12);

    let stored = ctx.services.invitation_workflow.list_for_event(event.id, organizer.id).await.unwrap();
    assert_eq!(stored.len(), 12);
    assert!(stored.iter().all(|i| i.status == InvitationStatus::Pending));

    ctx.settle().await;
    assert_eq!(ctx.notifier.count(NotificationKind::Invitation), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_responses_apply_once() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let invitation = ctx.services.invitation_workflow.invite(event.id, user.id, organizer.id).await.unwrap();

    let tasks = (0..RACERS).map(|i| {
        let workflow = ctx.services.invitation_workflow.clone();
        let status = if i % 2 == 0 { InvitationStatus::Accepted } else { InvitationStatus::Declined };
        let (invitation_id, user_id) = (invitation.id, user.id);
        tokio::spawn(async move { workflow.respond(invitation_id, status, user_id).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(QrMarkError::InvitationNotPending { .. }))));
}
