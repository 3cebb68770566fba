//! Invitation workflow: uniqueness, fan-out and responses

mod helpers;

use assert_matches::assert_matches;
use chrono::Duration;
use helpers::*;
use qrmark::models::{InvitationStatus, Role};
use qrmark::services::NotificationKind;
use qrmark::QrMarkError;

#[tokio::test]
async fn test_invite_is_unique_per_event_and_user() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let workflow = &ctx.services.invitation_workflow;

    workflow.invite(event.id, user.id, organizer.id).await.unwrap();
    let duplicate = workflow.invite(event.id, user.id, organizer.id).await;
    assert_matches!(duplicate, Err(QrMarkError::DuplicateInvitation { .. }));

    assert_eq!(workflow.list_for_event(event.id, organizer.id).await.unwrap().len(), 1);
    ctx.settle().await;
    assert_eq!(ctx.notifier.count(NotificationKind::Invitation), 1);
}

#[tokio::test]
async fn test_declined_user_is_not_reinvited() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let workflow = &ctx.services.invitation_workflow;

    let invitation = workflow.invite(event.id, user.id, organizer.id).await.unwrap();
    workflow.respond(invitation.id, InvitationStatus::Declined, user.id).await.unwrap();

    let again = workflow.invite(event.id, user.id, organizer.id).await;
    assert_matches!(again, Err(QrMarkError::DuplicateInvitation { .. }));

    let report = workflow.bulk_invite(event.id, &[user.id], organizer.id).await.unwrap();
    assert_eq!(report.created_count(), 0);
    assert_eq!(report.skipped, vec![user.id]);

    let stored = workflow.get(invitation.id, user.id).await.unwrap();
    assert_eq!(stored.status, InvitationStatus::Declined);
}

#[tokio::test]
async fn test_bulk_invite_notifies_only_new_invitees() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let a = ctx.user(Role::User).await;
    let b = ctx.user(Role::User).await;
    let c = ctx.user(Role::Moderator).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let workflow = &ctx.services.invitation_workflow;

    workflow.invite(event.id, a.id, organizer.id).await.unwrap();

    let report = workflow
        .bulk_invite(event.id, &[a.id, b.id, b.id, c.id, 9_999], organizer.id)
        .await
        .unwrap();
    assert_eq!(report.requested, 4);
    assert_eq!(report.created_count(), 2);
    let mut skipped = report.skipped.clone();
    skipped.sort();
    assert_eq!(skipped, vec![a.id, 9_999]);

    ctx.settle().await;
    assert_eq!(ctx.notifier.sent_to(&a.email).len(), 1);
    assert_eq!(ctx.notifier.sent_to(&b.email).len(), 1);
    assert_eq!(ctx.notifier.sent_to(&c.email).len(), 1);
    assert_eq!(ctx.notifier.count(NotificationKind::Invitation), 3);
}

#[tokio::test]
async fn test_invite_distribution_list() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let rival = ctx.user(Role::Organizer).await;
    let members = vec![ctx.user(Role::User).await, ctx.user(Role::User).await, ctx.user(Role::User).await];
    let member_ids: Vec<i64> = members.iter().map(|u| u.id).collect();

    let lists = &ctx.services.distribution_lists;
    let list = lists.create(list_request("Weekly regulars"), organizer.id).await.unwrap();
    assert_eq!(lists.add_members(list.id, &member_ids, organizer.id).await.unwrap(), 3);

    let event = ctx.event(&organizer, Duration::days(2), Duration::hours(2)).await;
    let workflow = &ctx.services.invitation_workflow;

    let report = workflow.invite_list(event.id, list.id, organizer.id).await.unwrap();
    assert_eq!(report.created_count(), 3);

    let again = workflow.invite_list(event.id, list.id, organizer.id).await.unwrap();
    assert_eq!(again.created_count(), 0);
    assert_eq!(again.skipped.len(), 3);

    let rival_event = ctx.event(&rival, Duration::days(2), Duration::hours(2)).await;
    let foreign = workflow.invite_list(rival_event.id, list.id, rival.id).await;
    assert_matches!(foreign, Err(QrMarkError::Forbidden(_)));

    ctx.settle().await;
    assert_eq!(ctx.notifier.count(NotificationKind::Invitation), 3);
}

#[tokio::test]
async fn test_invite_requires_event_owner() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let other_organizer = ctx.user(Role::Organizer).await;
    let moderator = ctx.user(Role::Moderator).await;
    let user = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let workflow = &ctx.services.invitation_workflow;

    assert_matches!(
        workflow.invite(event.id, user.id, other_organizer.id).await,
        Err(QrMarkError::Forbidden(_))
    );
    assert_matches!(
        workflow.invite(event.id, user.id, moderator.id).await,
        Err(QrMarkError::Forbidden(_))
    );
    assert_matches!(
        workflow.invite(event.id, 424_242, organizer.id).await,
        Err(QrMarkError::UserNotFound { .. })
    );

    ctx.services.event_lifecycle.cancel(event.id, organizer.id).await.unwrap();
    assert_matches!(
        workflow.invite(event.id, user.id, organizer.id).await,
        Err(QrMarkError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
async fn test_respond_rules() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let stranger = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let workflow = &ctx.services.invitation_workflow;

    let invitation = workflow.invite(event.id, user.id, organizer.id).await.unwrap();

    assert_matches!(
        workflow.respond(invitation.id, InvitationStatus::Pending, user.id).await,
        Err(QrMarkError::InvalidInput(_))
    );
    assert_matches!(
        workflow.respond(invitation.id, InvitationStatus::Accepted, stranger.id).await,
        Err(QrMarkError::Forbidden(_))
    );
    assert_matches!(
        workflow.get(invitation.id, stranger.id).await,
        Err(QrMarkError::Forbidden(_))
    );

    assert_eq!(workflow.list_pending_for_user(user.id).await.unwrap().len(), 1);
    workflow.respond(invitation.id, InvitationStatus::Declined, user.id).await.unwrap();
    assert!(workflow.list_pending_for_user(user.id).await.unwrap().is_empty());
    assert_eq!(workflow.list_for_user(user.id).await.unwrap().len(), 1);

    let flip = workflow.respond(invitation.id, InvitationStatus::Accepted, user.id).await;
    assert_matches!(flip, Err(QrMarkError::InvitationNotPending { status, .. }) if status == "DECLINED");
}

#[tokio::test]
async fn test_delete_invitation() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let other_organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let event = ctx.event(&organizer, Duration::days(1), Duration::hours(1)).await;
    let workflow = &ctx.services.invitation_workflow;

    let invitation = workflow.invite(event.id, user.id, organizer.id).await.unwrap();

    assert_matches!(
        workflow.delete(invitation.id, other_organizer.id).await,
        Err(QrMarkError::Forbidden(_))
    );
    workflow.delete(invitation.id, organizer.id).await.unwrap();
    assert_matches!(
        workflow.get(invitation.id, organizer.id).await,
        Err(QrMarkError::InvitationNotFound { .. })
    );

    // The pair is free again once deleted
    workflow.invite(event.id, user.id, organizer.id).await.unwrap();
}
