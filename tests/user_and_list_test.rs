//! Users, role changes and distribution lists

mod helpers;

use assert_matches::assert_matches;
use helpers::*;
use qrmark::models::{CreateUserRequest, Role, UpdateDistributionListRequest, UpdateUserRequest};
use qrmark::services::NotificationKind;
use qrmark::QrMarkError;

#[tokio::test]
async fn test_registration_validates_and_normalizes() {
    let ctx = TestContext::new();
    let users = &ctx.services.user_service;

    let user = users
        .create_user(CreateUserRequest {
            email: "  Ada.Lovelace@Example.COM ".to_string(),
            full_name: "Ada Lovelace".to_string(),
            role: None,
        })
        .await
        .unwrap();
    assert_eq!(user.email, "ada.lovelace@example.com");
    assert_eq!(user.role, Role::User);

    let duplicate = users
        .create_user(CreateUserRequest {
            email: "ada.lovelace@example.com".to_string(),
            full_name: "Someone Else".to_string(),
            role: None,
        })
        .await;
    assert_matches!(duplicate, Err(QrMarkError::InvalidInput(_)));

    let bad_email = users
        .create_user(CreateUserRequest {
            email: "not-an-email".to_string(),
            full_name: "Nobody Here".to_string(),
            role: None,
        })
        .await;
    assert_matches!(bad_email, Err(QrMarkError::InvalidInput(_)));

    let found = users.get_user_by_email("ADA.LOVELACE@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    let renamed = users
        .update_profile(user.id, UpdateUserRequest { full_name: Some(" Augusta Ada King ".to_string()) })
        .await
        .unwrap();
    assert_eq!(renamed.full_name, "Augusta Ada King");

    assert_matches!(users.get_user(9_999).await, Err(QrMarkError::UserNotFound { user_id: 9_999 }));
}

#[tokio::test]
async fn test_promote_and_demote() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let user = ctx.user(Role::User).await;
    let users = &ctx.services.user_service;

    let promoted = users.promote(user.id, organizer.id).await.unwrap();
    assert_eq!(promoted.role, Role::Moderator);

    assert_matches!(
        users.promote(user.id, organizer.id).await,
        Err(QrMarkError::InvalidStateTransition { .. })
    );
    assert_matches!(
        users.demote(organizer.id, organizer.id).await,
        Err(QrMarkError::InvalidStateTransition { .. })
    );

    // Moderators cannot manage roles
    let bystander = ctx.user(Role::User).await;
    assert_matches!(users.promote(bystander.id, promoted.id).await, Err(QrMarkError::Forbidden(_)));

    let demoted = users.demote(user.id, organizer.id).await.unwrap();
    assert_eq!(demoted.role, Role::User);

    ctx.settle().await;
    assert_eq!(ctx.notifier.count(NotificationKind::RoleChange), 2);

    let moderators = users.list_users(Some(Role::Moderator), organizer.id).await.unwrap();
    assert!(moderators.is_empty());
    assert_eq!(users.list_users(None, organizer.id).await.unwrap().len(), 3);
    assert_matches!(users.list_users(None, user.id).await, Err(QrMarkError::Forbidden(_)));
}

#[tokio::test]
async fn test_distribution_list_membership() {
    let ctx = TestContext::new();
    let organizer = ctx.user(Role::Organizer).await;
    let rival = ctx.user(Role::Organizer).await;
    let moderator = ctx.user(Role::Moderator).await;
    let a = ctx.user(Role::User).await;
    let b = ctx.user(Role::User).await;
    let lists = &ctx.services.distribution_lists;

    assert_matches!(
        lists.create(list_request("Volunteers"), moderator.id).await,
        Err(QrMarkError::Forbidden(_))
    );
    assert_matches!(
        lists.create(list_request("ab"), organizer.id).await,
        Err(QrMarkError::InvalidInput(_))
    );

    let list = lists.create(list_request("Volunteers"), organizer.id).await.unwrap();
    assert!(lists.add_member(list.id, a.id, organizer.id).await.unwrap());
    assert!(!lists.add_member(list.id, a.id, organizer.id).await.unwrap());
    assert_eq!(lists.add_members(list.id, &[a.id, b.id, b.id], organizer.id).await.unwrap(), 1);
    assert_matches!(
        lists.add_member(list.id, 9_999, organizer.id).await,
        Err(QrMarkError::UserNotFound { .. })
    );

    assert_matches!(
        lists.add_member(list.id, moderator.id, rival.id).await,
        Err(QrMarkError::Forbidden(_))
    );

    let mut member_ids: Vec<i64> = lists.members(list.id).await.unwrap().iter().map(|u| u.id).collect();
    member_ids.sort();
    assert_eq!(member_ids, vec![a.id, b.id]);

    assert!(lists.remove_member(list.id, a.id, organizer.id).await.unwrap());
    assert!(!lists.remove_member(list.id, a.id, organizer.id).await.unwrap());

    let renamed = lists
        .update(
            list.id,
            UpdateDistributionListRequest { name: Some("Core volunteers".to_string()), description: None },
            organizer.id,
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Core volunteers");
    assert_eq!(lists.list_by_organizer(organizer.id).await.unwrap().len(), 1);
    assert!(lists.list_by_organizer(rival.id).await.unwrap().is_empty());

    lists.delete(list.id, organizer.id).await.unwrap();
    assert_matches!(lists.get(list.id).await, Err(QrMarkError::ListNotFound { .. }));
}
