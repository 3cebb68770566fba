//! Invitation workflow
//!
//! An invitation is created once per (event, user) and answered once.
//! Duplicate detection lives in the store's insert-if-absent operations, so
//! concurrent invites for the same pair cannot both succeed.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use crate::database::Store;
use crate::models::{Event, FanOutReport, Invitation, InvitationStatus, User};
use crate::services::authorization::{Action, AuthorizationPolicy};
use crate::services::event::EventLifecycle;
use crate::services::notification::NotificationService;
use crate::utils::clock::SharedClock;
use crate::utils::errors::{QrMarkError, Result};
use crate::utils::helpers::dedupe_ids;
use crate::utils::logging::log_invitation_action;

#[derive(Clone)]
pub struct InvitationWorkflow {
    store: Arc<dyn Store>,
    policy: AuthorizationPolicy,
    events: EventLifecycle,
    notifications: NotificationService,
    clock: SharedClock,
}

impl InvitationWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        policy: AuthorizationPolicy,
        events: EventLifecycle,
        notifications: NotificationService,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            policy,
            events,
            notifications,
            clock,
        }
    }

    /// Invite one user
    pub async fn invite(&self, event_id: i64, user_id: i64, sender_id: i64) -> Result<Invitation> {
        let event = self.invitable_event(event_id, sender_id).await?;
        let invitee = self.load_user(user_id).await?;

        let invitation = self.store
            .insert_invitation_if_absent(event_id, user_id, sender_id)
            .await?
            .ok_or(QrMarkError::DuplicateInvitation { event_id, user_id })?;

        log_invitation_action(event_id, "invite", sender_id, 1);
        self.notifications.notify_invitation(&invitee, &event);
        Ok(invitation)
    }

    /// Invite many users at once. Users that already hold an invitation, in
    /// any status, are skipped and not notified again.
    pub async fn bulk_invite(&self, event_id: i64, user_ids: &[i64], sender_id: i64) -> Result<FanOutReport> {
        let event = self.invitable_event(event_id, sender_id).await?;
        self.fan_out(&event, user_ids, sender_id, "bulk_invite").await
    }

    /// Invite every member of a distribution list the sender owns
    pub async fn invite_list(&self, event_id: i64, list_id: i64, sender_id: i64) -> Result<FanOutReport> {
        let event = self.invitable_event(event_id, sender_id).await?;

        let list = self.store
            .get_list(list_id)
            .await?
            .ok_or(QrMarkError::ListNotFound { list_id })?;
        if list.organizer_id != sender_id {
            return Err(QrMarkError::Forbidden(format!(
                "user {} does not own distribution list {}",
                sender_id, list_id
            )));
        }

        let member_ids: Vec<i64> = self.store.list_members(list_id).await?.into_iter().map(|u| u.id).collect();
        self.fan_out(&event, &member_ids, sender_id, "invite_list").await
    }

    async fn fan_out(&self, event: &Event, user_ids: &[i64], sender_id: i64, action: &str) -> Result<FanOutReport> {
        let requested = dedupe_ids(user_ids);
        let created = self.store.insert_invitations_if_absent(event.id, &requested, sender_id).await?;

        // Reconcile against what the store says it created; only those are new.
        let created_ids: HashSet<i64> = created.iter().map(|i| i.user_id).collect();
        let skipped: Vec<i64> = requested.iter().copied().filter(|id| !created_ids.contains(id)).collect();

        let mut invitees = Vec::with_capacity(created.len());
        for invitation in &created {
            if let Some(user) = self.store.get_user(invitation.user_id).await? {
                invitees.push(user);
            }
        }

        debug!(event_id = event.id, requested = requested.len(), created = created.len(), skipped = skipped.len(), "Invitation fan-out reconciled");
        log_invitation_action(event.id, action, sender_id, created.len());
        self.notifications.notify_invitations(&invitees, event);

        Ok(FanOutReport {
            requested: requested.len(),
            created,
            skipped,
        })
    }

    /// Accept or decline. Only the invitee, only once.
    pub async fn respond(&self, invitation_id: i64, status: InvitationStatus, user_id: i64) -> Result<Invitation> {
        if !status.is_response() {
            return Err(QrMarkError::InvalidInput(format!(
                "{} is not a valid response",
                status
            )));
        }

        let user = self.load_user(user_id).await?;
        self.policy.require(&user, Action::RespondToInvitation)?;

        let invitation = self.load_invitation(invitation_id).await?;
        if invitation.user_id != user_id {
            return Err(QrMarkError::Forbidden(format!(
                "invitation {} belongs to another user",
                invitation_id
            )));
        }

        let applied = self.store
            .set_invitation_status_if_pending(invitation_id, status, self.clock.now())
            .await?;
        let current = self.load_invitation(invitation_id).await?;
        if !applied {
            return Err(QrMarkError::InvitationNotPending {
                invitation_id,
                status: current.status.to_string(),
            });
        }

        log_invitation_action(invitation.event_id, &format!("respond:{}", status), user_id, 1);
        Ok(current)
    }

    /// Remove an invitation. Only the event's organizer may.
    pub async fn delete(&self, invitation_id: i64, by_user_id: i64) -> Result<()> {
        let invitation = self.load_invitation(invitation_id).await?;
        let actor = self.load_user(by_user_id).await?;
        self.policy.require(&actor, Action::ManageInvitations)?;

        let event = self.events.get(invitation.event_id).await?;
        if !event.is_owned_by(by_user_id) {
            return Err(QrMarkError::Forbidden(format!(
                "user {} does not own event {}",
                by_user_id, event.id
            )));
        }

        if !self.store.delete_invitation(invitation_id).await? {
            return Err(QrMarkError::InvitationNotFound { invitation_id });
        }
        log_invitation_action(event.id, "delete", by_user_id, 1);
        Ok(())
    }

    /// An invitation is visible to its invitee and to staff
    pub async fn get(&self, invitation_id: i64, viewer_id: i64) -> Result<Invitation> {
        let invitation = self.load_invitation(invitation_id).await?;
        let viewer = self.load_user(viewer_id).await?;
        if invitation.user_id != viewer_id {
            self.policy.require(&viewer, Action::ViewEventAttendance)?;
        }
        Ok(invitation)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Invitation>> {
        self.store.list_invitations_by_user(user_id, None).await
    }

    pub async fn list_pending_for_user(&self, user_id: i64) -> Result<Vec<Invitation>> {
        self.store.list_invitations_by_user(user_id, Some(InvitationStatus::Pending)).await
    }

    /// All invitations of an event, for its organizer or staff
    pub async fn list_for_event(&self, event_id: i64, viewer_id: i64) -> Result<Vec<Invitation>> {
        let viewer = self.load_user(viewer_id).await?;
        let event = self.events.get(event_id).await?;
        if !event.is_owned_by(viewer_id) {
            self.policy.require(&viewer, Action::ViewEventAttendance)?;
        }
        self.store.list_invitations_by_event(event_id).await
    }

    /// The event must exist, accept invitations, and belong to the sender
    async fn invitable_event(&self, event_id: i64, sender_id: i64) -> Result<Event> {
        let sender = self.load_user(sender_id).await?;
        self.policy.require(&sender, Action::ManageInvitations)?;

        let event = self.events.get(event_id).await?;
        if !event.is_owned_by(sender_id) {
            return Err(QrMarkError::Forbidden(format!(
                "user {} does not own event {}",
                sender_id, event_id
            )));
        }
        if event.status.is_terminal() {
            return Err(QrMarkError::InvalidStateTransition {
                from: event.status.to_string(),
                to: "INVITED".to_string(),
            });
        }
        Ok(event)
    }

    async fn load_invitation(&self, invitation_id: i64) -> Result<Invitation> {
        self.store
            .get_invitation_by_id(invitation_id)
            .await?
            .ok_or(QrMarkError::InvitationNotFound { invitation_id })
    }

    async fn load_user(&self, user_id: i64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id })
    }
}
