//! Database service layer
//! 
//! Postgres-backed [`Store`], delegating to one repository per table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::database::{
    DatabasePool, Store, UserRepository, LocationRepository, EventRepository, InvitationRepository,
    DistributionListRepository, AttendanceRepository,
};
use crate::models::*;
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub users: UserRepository,
    pub locations: LocationRepository,
    pub events: EventRepository,
    pub invitations: InvitationRepository,
    pub lists: DistributionListRepository,
    pub attendances: AttendanceRepository,
    pool: DatabasePool,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            locations: LocationRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            invitations: InvitationRepository::new(pool.clone()),
            lists: DistributionListRepository::new(pool.clone()),
            attendances: AttendanceRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl Store for DatabaseService {
    async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        self.users.create(request).await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.users.find_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users.find_by_email(email).await
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        self.users.list(role).await
    }

    async fn update_user(&self, id: i64, request: UpdateUserRequest) -> Result<Option<User>> {
        self.users.update(id, request).await
    }

    async fn set_user_role(&self, id: i64, from: Role, to: Role) -> Result<bool> {
        self.users.set_role(id, from, to).await
    }

    async fn create_location(&self, request: CreateLocationRequest) -> Result<Location> {
        self.locations.create(request).await
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>> {
        self.locations.find_by_id(id).await
    }

    async fn update_location(&self, id: i64, request: UpdateLocationRequest) -> Result<Option<Location>> {
        self.locations.update(id, request).await
    }

    async fn delete_location(&self, id: i64) -> Result<bool> {
        self.locations.delete_unused(id).await
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        self.locations.list_all().await
    }

    async fn create_event(&self, request: CreateEventRequest, organizer_id: i64, status: EventStatus) -> Result<Event> {
        self.events.create(request, organizer_id, status).await
    }

    async fn get_event(&self, id: i64) -> Result<Option<Event>> {
        self.events.find_by_id(id).await
    }

    async fn update_event(&self, id: i64, request: UpdateEventRequest) -> Result<Option<Event>> {
        self.events.update(id, request).await
    }

    async fn delete_event(&self, id: i64) -> Result<bool> {
        self.events.delete(id).await
    }

    async fn publish_event(&self, id: i64) -> Result<bool> {
        self.events.publish(id).await
    }

    async fn set_event_status(&self, id: i64, from: &[EventStatus], to: EventStatus) -> Result<bool> {
        self.events.set_status(id, from, to).await
    }

    async fn mark_reminder_sent(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.events.mark_reminder_sent(id, now).await
    }

    async fn list_events_by_organizer(&self, organizer_id: i64, status: Option<EventStatus>) -> Result<Vec<Event>> {
        self.events.list_by_organizer(organizer_id, status).await
    }

    async fn list_events_by_status(&self, statuses: &[EventStatus]) -> Result<Vec<Event>> {
        self.events.list_by_status(statuses).await
    }

    async fn list_events_for_user(&self, user_id: i64) -> Result<Vec<Event>> {
        self.events.list_for_user(user_id).await
    }

    async fn get_invitation(&self, event_id: i64, user_id: i64) -> Result<Option<Invitation>> {
        self.invitations.find(event_id, user_id).await
    }

    async fn get_invitation_by_id(&self, id: i64) -> Result<Option<Invitation>> {
        self.invitations.find_by_id(id).await
    }

    async fn insert_invitation_if_absent(&self, event_id: i64, user_id: i64, sender_id: i64) -> Result<Option<Invitation>> {
        self.invitations.insert_if_absent(event_id, user_id, sender_id).await
    }

    async fn insert_invitations_if_absent(&self, event_id: i64, user_ids: &[i64], sender_id: i64) -> Result<Vec<Invitation>> {
        self.invitations.insert_many_if_absent(event_id, user_ids, sender_id).await
    }

    async fn set_invitation_status_if_pending(&self, id: i64, status: InvitationStatus, now: DateTime<Utc>) -> Result<bool> {
        self.invitations.respond_if_pending(id, status, now).await
    }

    async fn delete_invitation(&self, id: i64) -> Result<bool> {
        self.invitations.delete(id).await
    }

    async fn list_invitations_by_event(&self, event_id: i64) -> Result<Vec<Invitation>> {
        self.invitations.list_by_event(event_id).await
    }

    async fn list_invitations_by_user(&self, user_id: i64, status: Option<InvitationStatus>) -> Result<Vec<Invitation>> {
        self.invitations.list_by_user(user_id, status).await
    }

    async fn create_list(&self, request: CreateDistributionListRequest, organizer_id: i64) -> Result<DistributionList> {
        self.lists.create(request, organizer_id).await
    }

    async fn get_list(&self, id: i64) -> Result<Option<DistributionList>> {
        self.lists.find_by_id(id).await
    }

    async fn update_list(&self, id: i64, request: UpdateDistributionListRequest) -> Result<Option<DistributionList>> {
        self.lists.update(id, request).await
    }

    async fn delete_list(&self, id: i64) -> Result<bool> {
        self.lists.delete(id).await
    }

    async fn list_lists_by_organizer(&self, organizer_id: i64) -> Result<Vec<DistributionList>> {
        self.lists.list_by_organizer(organizer_id).await
    }

    async fn add_list_members(&self, list_id: i64, user_ids: &[i64]) -> Result<u64> {
        self.lists.add_members(list_id, user_ids).await
    }

    async fn remove_list_member(&self, list_id: i64, user_id: i64) -> Result<bool> {
        self.lists.remove_member(list_id, user_id).await
    }

    async fn list_members(&self, list_id: i64) -> Result<Vec<User>> {
        self.lists.members(list_id).await
    }

    async fn create_attendance_if_absent(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.attendances.check_in_if_absent(event_id, user_id, scanner_id, now).await
    }

    async fn set_checkout_if_pending(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.attendances.check_out_if_pending(event_id, user_id, scanner_id, now).await
    }

    async fn get_attendance(&self, event_id: i64, user_id: i64) -> Result<Option<Attendance>> {
        self.attendances.find(event_id, user_id).await
    }

    async fn list_attendances_by_event(&self, event_id: i64) -> Result<Vec<Attendance>> {
        self.attendances.list_by_event(event_id).await
    }

    async fn list_attendances_by_user(&self, user_id: i64) -> Result<Vec<Attendance>> {
        self.attendances.list_by_user(user_id).await
    }

    async fn attendance_stats(&self, event_id: i64) -> Result<AttendanceStats> {
        self.attendances.stats(event_id).await
    }
}
