//! Storage abstraction consumed by the services.
//!
//! Every method is atomic at single-row grain. The conditional writes
//! (`*_if_absent`, `*_if_pending`, `set_event_status`, `set_user_role`,
//! `mark_reminder_sent`) resolve their precondition inside one store
//! operation and report through their return value whether they applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::models::*;
use crate::utils::errors::Result;

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    async fn create_user(&self, request: CreateUserRequest) -> Result<User>;

    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>>;

    async fn update_user(&self, id: i64, request: UpdateUserRequest) -> Result<Option<User>>;

    /// Set `role = to` only while the stored role equals `from`
    async fn set_user_role(&self, id: i64, from: Role, to: Role) -> Result<bool>;

    // Locations

    async fn create_location(&self, request: CreateLocationRequest) -> Result<Location>;

    async fn get_location(&self, id: i64) -> Result<Option<Location>>;

    async fn update_location(&self, id: i64, request: UpdateLocationRequest) -> Result<Option<Location>>;

    /// Delete a location; false if it is missing or an event still refers to it
    async fn delete_location(&self, id: i64) -> Result<bool>;

    async fn list_locations(&self) -> Result<Vec<Location>>;

    // Events

    async fn create_event(&self, request: CreateEventRequest, organizer_id: i64, status: EventStatus) -> Result<Event>;

    async fn get_event(&self, id: i64) -> Result<Option<Event>>;

    async fn update_event(&self, id: i64, request: UpdateEventRequest) -> Result<Option<Event>>;

    /// Delete an event together with its invitations and attendance rows
    async fn delete_event(&self, id: i64) -> Result<bool>;

    /// Set `is_published`; returns false if it was already published
    async fn publish_event(&self, id: i64) -> Result<bool>;

    /// Move the status to `to` only while it is one of `from`
    async fn set_event_status(&self, id: i64, from: &[EventStatus], to: EventStatus) -> Result<bool>;

    /// Stamp `reminder_sent_at` only if no reminder went out yet
    async fn mark_reminder_sent(&self, id: i64, now: DateTime<Utc>) -> Result<bool>;

    async fn list_events_by_organizer(&self, organizer_id: i64, status: Option<EventStatus>) -> Result<Vec<Event>>;

    async fn list_events_by_status(&self, statuses: &[EventStatus]) -> Result<Vec<Event>>;

    /// Events the user is invited to or has attendance for
    async fn list_events_for_user(&self, user_id: i64) -> Result<Vec<Event>>;

    // Invitations

    async fn get_invitation(&self, event_id: i64, user_id: i64) -> Result<Option<Invitation>>;

    async fn get_invitation_by_id(&self, id: i64) -> Result<Option<Invitation>>;

    /// Insert a PENDING invitation unless one exists for (event, user), whatever its status
    async fn insert_invitation_if_absent(&self, event_id: i64, user_id: i64, sender_id: i64) -> Result<Option<Invitation>>;

    /// Set-based variant; returns only the rows this call created
    async fn insert_invitations_if_absent(&self, event_id: i64, user_ids: &[i64], sender_id: i64) -> Result<Vec<Invitation>>;

    /// Move PENDING -> `status`; false if the invitation is no longer pending
    async fn set_invitation_status_if_pending(&self, id: i64, status: InvitationStatus, now: DateTime<Utc>) -> Result<bool>;

    async fn delete_invitation(&self, id: i64) -> Result<bool>;

    async fn list_invitations_by_event(&self, event_id: i64) -> Result<Vec<Invitation>>;

    async fn list_invitations_by_user(&self, user_id: i64, status: Option<InvitationStatus>) -> Result<Vec<Invitation>>;

    // Distribution lists

    async fn create_list(&self, request: CreateDistributionListRequest, organizer_id: i64) -> Result<DistributionList>;

    async fn get_list(&self, id: i64) -> Result<Option<DistributionList>>;

    async fn update_list(&self, id: i64, request: UpdateDistributionListRequest) -> Result<Option<DistributionList>>;

    async fn delete_list(&self, id: i64) -> Result<bool>;

    async fn list_lists_by_organizer(&self, organizer_id: i64) -> Result<Vec<DistributionList>>;

    /// Returns how many memberships were newly added
    async fn add_list_members(&self, list_id: i64, user_ids: &[i64]) -> Result<u64>;

    async fn remove_list_member(&self, list_id: i64, user_id: i64) -> Result<bool>;

    async fn list_members(&self, list_id: i64) -> Result<Vec<User>>;

    // Attendance

    /// Create the row with `check_in_time = now` unless one exists
    async fn create_attendance_if_absent(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool>;

    /// Set `check_out_time = now` only on a checked-in row whose check-out is still null
    async fn set_checkout_if_pending(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool>;

    async fn get_attendance(&self, event_id: i64, user_id: i64) -> Result<Option<Attendance>>;

    async fn list_attendances_by_event(&self, event_id: i64) -> Result<Vec<Attendance>>;

    async fn list_attendances_by_user(&self, user_id: i64) -> Result<Vec<Attendance>>;

    async fn attendance_stats(&self, event_id: i64) -> Result<AttendanceStats>;
}
