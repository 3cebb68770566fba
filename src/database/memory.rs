//! In-process [`Store`] used by tests and local runs without Postgres.
//!
//! All state sits behind one mutex. Every trait method takes the lock once,
//! so each conditional write is atomic, and the guard never lives across an
//! `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use crate::database::Store;
use std::sync::Arc;
use crate::models::*;
use crate::utils::clock::{SharedClock, SystemClock};
use crate::utils::errors::{QrMarkError, Result};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    locations: BTreeMap<i64, Location>,
    events: BTreeMap<i64, Event>,
    invitations: BTreeMap<i64, Invitation>,
    lists: BTreeMap<i64, DistributionList>,
    members: Vec<DistributionListMember>,
    attendances: BTreeMap<(i64, i64), Attendance>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn invitation_for(&self, event_id: i64, user_id: i64) -> Option<&Invitation> {
        self.invitations.values().find(|i| i.event_id == event_id && i.user_id == user_id)
    }

    fn insert_invitation(&mut self, event_id: i64, user_id: i64, sender_id: i64, now: DateTime<Utc>) -> Option<Invitation> {
        if !self.users.contains_key(&user_id) || self.invitation_for(event_id, user_id).is_some() {
            return None;
        }
        let invitation = Invitation {
            id: self.next_id(),
            event_id,
            user_id,
            sender_id,
            status: InvitationStatus::Pending,
            created_at: now,
            responded_at: None,
        };
        self.invitations.insert(invitation.id, invitation.clone());
        Some(invitation)
    }
}

/// Row timestamps come from the store's clock
pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: SharedClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self { tables: Mutex::new(Tables::default()), clock }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.email == request.email) {
            return Err(QrMarkError::InvalidInput(format!("email {} is already registered", request.email)));
        }
        let now = self.clock.now();
        let user = User {
            id: t.next_id(),
            email: request.email,
            full_name: request.full_name,
            role: request.role.unwrap_or(Role::User),
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        let t = self.tables.lock();
        Ok(t.users.values().filter(|u| role.map_or(true, |r| u.role == r)).cloned().collect())
    }

    async fn update_user(&self, id: i64, request: UpdateUserRequest) -> Result<Option<User>> {
        let mut t = self.tables.lock();
        Ok(t.users.get_mut(&id).map(|user| {
            if let Some(full_name) = request.full_name {
                user.full_name = full_name;
            }
            user.updated_at = self.clock.now();
            user.clone()
        }))
    }

    async fn set_user_role(&self, id: i64, from: Role, to: Role) -> Result<bool> {
        let mut t = self.tables.lock();
        match t.users.get_mut(&id) {
            Some(user) if user.role == from => {
                user.role = to;
                user.updated_at = self.clock.now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_location(&self, request: CreateLocationRequest) -> Result<Location> {
        let mut t = self.tables.lock();
        let now = self.clock.now();
        let location = Location {
            id: t.next_id(),
            name: request.name,
            address: request.address,
            maps_url: request.maps_url,
            created_at: now,
            updated_at: now,
        };
        t.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>> {
        Ok(self.tables.lock().locations.get(&id).cloned())
    }

    async fn update_location(&self, id: i64, request: UpdateLocationRequest) -> Result<Option<Location>> {
        let mut t = self.tables.lock();
        Ok(t.locations.get_mut(&id).map(|location| {
            if let Some(name) = request.name {
                location.name = name;
            }
            if let Some(address) = request.address {
                location.address = Some(address);
            }
            if let Some(maps_url) = request.maps_url {
                location.maps_url = Some(maps_url);
            }
            location.updated_at = self.clock.now();
            location.clone()
        }))
    }

    async fn delete_location(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock();
        if t.events.values().any(|e| e.location_id == id) {
            return Ok(false);
        }
        Ok(t.locations.remove(&id).is_some())
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        let t = self.tables.lock();
        let mut locations: Vec<Location> = t.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(locations)
    }

    async fn create_event(&self, request: CreateEventRequest, organizer_id: i64, status: EventStatus) -> Result<Event> {
        let mut t = self.tables.lock();
        let now = self.clock.now();
        let event = Event {
            id: t.next_id(),
            title: request.title,
            description: request.description,
            location_id: request.location_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status,
            is_published: request.is_published.unwrap_or(false),
            capacity: request.capacity,
            requires_checkout: request.requires_checkout.unwrap_or(false),
            checkout_tolerance_minutes: request.checkout_tolerance_minutes.unwrap_or(0),
            organizer_id,
            reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        t.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: i64) -> Result<Option<Event>> {
        Ok(self.tables.lock().events.get(&id).cloned())
    }

    async fn update_event(&self, id: i64, request: UpdateEventRequest) -> Result<Option<Event>> {
        let mut t = self.tables.lock();
        let Some(event) = t.events.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = request.title {
            event.title = title;
        }
        if let Some(description) = request.description {
            event.description = description;
        }
        if let Some(location_id) = request.location_id {
            event.location_id = location_id;
        }
        if let Some(start_time) = request.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = request.end_time {
            event.end_time = end_time;
        }
        if let Some(is_published) = request.is_published {
            event.is_published = is_published;
        }
        if let Some(capacity) = request.capacity {
            event.capacity = Some(capacity);
        }
        if let Some(requires_checkout) = request.requires_checkout {
            event.requires_checkout = requires_checkout;
        }
        if let Some(tolerance) = request.checkout_tolerance_minutes {
            event.checkout_tolerance_minutes = tolerance;
        }
        event.updated_at = self.clock.now();
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock();
        if t.events.remove(&id).is_none() {
            return Ok(false);
        }
        t.invitations.retain(|_, i| i.event_id != id);
        t.attendances.retain(|(event_id, _), _| *event_id != id);
        Ok(true)
    }

    async fn publish_event(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock();
        match t.events.get_mut(&id) {
            Some(event) if !event.is_published => {
                event.is_published = true;
                event.updated_at = self.clock.now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_event_status(&self, id: i64, from: &[EventStatus], to: EventStatus) -> Result<bool> {
        let mut t = self.tables.lock();
        match t.events.get_mut(&id) {
            Some(event) if from.contains(&event.status) => {
                event.status = to;
                event.updated_at = self.clock.now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_reminder_sent(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut t = self.tables.lock();
        match t.events.get_mut(&id) {
            Some(event) if event.reminder_sent_at.is_none() => {
                event.reminder_sent_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_events_by_organizer(&self, organizer_id: i64, status: Option<EventStatus>) -> Result<Vec<Event>> {
        let t = self.tables.lock();
        let mut events: Vec<Event> = t.events.values()
            .filter(|e| e.organizer_id == organizer_id && status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        Ok(events)
    }

    async fn list_events_by_status(&self, statuses: &[EventStatus]) -> Result<Vec<Event>> {
        let t = self.tables.lock();
        let mut events: Vec<Event> = t.events.values()
            .filter(|e| statuses.contains(&e.status))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        Ok(events)
    }

    async fn list_events_for_user(&self, user_id: i64) -> Result<Vec<Event>> {
        let t = self.tables.lock();
        let mut ids: HashSet<i64> = t.invitations.values()
            .filter(|i| i.user_id == user_id)
            .map(|i| i.event_id)
            .collect();
        ids.extend(t.attendances.keys().filter(|(_, u)| *u == user_id).map(|(e, _)| *e));
        let mut events: Vec<Event> = ids.iter().filter_map(|id| t.events.get(id).cloned()).collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        Ok(events)
    }

    async fn get_invitation(&self, event_id: i64, user_id: i64) -> Result<Option<Invitation>> {
        Ok(self.tables.lock().invitation_for(event_id, user_id).cloned())
    }

    async fn get_invitation_by_id(&self, id: i64) -> Result<Option<Invitation>> {
        Ok(self.tables.lock().invitations.get(&id).cloned())
    }

    async fn insert_invitation_if_absent(&self, event_id: i64, user_id: i64, sender_id: i64) -> Result<Option<Invitation>> {
        let now = self.clock.now();
        Ok(self.tables.lock().insert_invitation(event_id, user_id, sender_id, now))
    }

    async fn insert_invitations_if_absent(&self, event_id: i64, user_ids: &[i64], sender_id: i64) -> Result<Vec<Invitation>> {
        let now = self.clock.now();
        let mut t = self.tables.lock();
        Ok(user_ids.iter()
            .filter_map(|user_id| t.insert_invitation(event_id, *user_id, sender_id, now))
            .collect())
    }

    async fn set_invitation_status_if_pending(&self, id: i64, status: InvitationStatus, now: DateTime<Utc>) -> Result<bool> {
        let mut t = self.tables.lock();
        match t.invitations.get_mut(&id) {
            Some(invitation) if invitation.status == InvitationStatus::Pending => {
                invitation.status = status;
                invitation.responded_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_invitation(&self, id: i64) -> Result<bool> {
        Ok(self.tables.lock().invitations.remove(&id).is_some())
    }

    async fn list_invitations_by_event(&self, event_id: i64) -> Result<Vec<Invitation>> {
        let t = self.tables.lock();
        Ok(t.invitations.values().filter(|i| i.event_id == event_id).cloned().collect())
    }

    async fn list_invitations_by_user(&self, user_id: i64, status: Option<InvitationStatus>) -> Result<Vec<Invitation>> {
        let t = self.tables.lock();
        Ok(t.invitations.values()
            .rev()
            .filter(|i| i.user_id == user_id && status.map_or(true, |s| i.status == s))
            .cloned()
            .collect())
    }

    async fn create_list(&self, request: CreateDistributionListRequest, organizer_id: i64) -> Result<DistributionList> {
        let mut t = self.tables.lock();
        let now = self.clock.now();
        let list = DistributionList {
            id: t.next_id(),
            name: request.name,
            description: request.description,
            organizer_id,
            created_at: now,
            updated_at: now,
        };
        t.lists.insert(list.id, list.clone());
        Ok(list)
    }

    async fn get_list(&self, id: i64) -> Result<Option<DistributionList>> {
        Ok(self.tables.lock().lists.get(&id).cloned())
    }

    async fn update_list(&self, id: i64, request: UpdateDistributionListRequest) -> Result<Option<DistributionList>> {
        let mut t = self.tables.lock();
        Ok(t.lists.get_mut(&id).map(|list| {
            if let Some(name) = request.name {
                list.name = name;
            }
            if let Some(description) = request.description {
                list.description = Some(description);
            }
            list.updated_at = self.clock.now();
            list.clone()
        }))
    }

    async fn delete_list(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.lock();
        t.members.retain(|m| m.list_id != id);
        Ok(t.lists.remove(&id).is_some())
    }

    async fn list_lists_by_organizer(&self, organizer_id: i64) -> Result<Vec<DistributionList>> {
        let t = self.tables.lock();
        let mut lists: Vec<DistributionList> = t.lists.values()
            .filter(|l| l.organizer_id == organizer_id)
            .cloned()
            .collect();
        lists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lists)
    }

    async fn add_list_members(&self, list_id: i64, user_ids: &[i64]) -> Result<u64> {
        let now = self.clock.now();
        let mut t = self.tables.lock();
        let existing: BTreeSet<i64> = t.members.iter().filter(|m| m.list_id == list_id).map(|m| m.user_id).collect();
        let mut added = 0;
        let mut seen = BTreeSet::new();
        for user_id in user_ids {
            if existing.contains(user_id) || !t.users.contains_key(user_id) || !seen.insert(*user_id) {
                continue;
            }
            t.members.push(DistributionListMember { list_id, user_id: *user_id, added_at: now });
            added += 1;
        }
        Ok(added)
    }

    async fn remove_list_member(&self, list_id: i64, user_id: i64) -> Result<bool> {
        let mut t = self.tables.lock();
        let before = t.members.len();
        t.members.retain(|m| !(m.list_id == list_id && m.user_id == user_id));
        Ok(t.members.len() < before)
    }

    async fn list_members(&self, list_id: i64) -> Result<Vec<User>> {
        let t = self.tables.lock();
        Ok(t.members.iter()
            .filter(|m| m.list_id == list_id)
            .filter_map(|m| t.users.get(&m.user_id).cloned())
            .collect())
    }

    async fn create_attendance_if_absent(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut t = self.tables.lock();
        if t.attendances.contains_key(&(event_id, user_id)) {
            return Ok(false);
        }
        let attendance = Attendance {
            id: t.next_id(),
            event_id,
            user_id,
            check_in_time: Some(now),
            check_out_time: None,
            checked_in_by: Some(scanner_id),
            checked_out_by: None,
        };
        t.attendances.insert((event_id, user_id), attendance);
        Ok(true)
    }

    async fn set_checkout_if_pending(&self, event_id: i64, user_id: i64, scanner_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut t = self.tables.lock();
        match t.attendances.get_mut(&(event_id, user_id)) {
            Some(a) if a.is_checked_in() && !a.is_checked_out() => {
                a.check_out_time = Some(now);
                a.checked_out_by = Some(scanner_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_attendance(&self, event_id: i64, user_id: i64) -> Result<Option<Attendance>> {
        Ok(self.tables.lock().attendances.get(&(event_id, user_id)).cloned())
    }

    async fn list_attendances_by_event(&self, event_id: i64) -> Result<Vec<Attendance>> {
        let t = self.tables.lock();
        let mut rows: Vec<Attendance> = t.attendances.values().filter(|a| a.event_id == event_id).cloned().collect();
        rows.sort_by_key(|a| (a.check_in_time, a.id));
        Ok(rows)
    }

    async fn list_attendances_by_user(&self, user_id: i64) -> Result<Vec<Attendance>> {
        let t = self.tables.lock();
        let mut rows: Vec<Attendance> = t.attendances.values().filter(|a| a.user_id == user_id).cloned().collect();
        rows.sort_by_key(|a| std::cmp::Reverse((a.check_in_time, a.id)));
        Ok(rows)
    }

    async fn attendance_stats(&self, event_id: i64) -> Result<AttendanceStats> {
        let t = self.tables.lock();
        let mut stats = AttendanceStats {
            event_id,
            capacity: t.events.get(&event_id).and_then(|e| e.capacity),
            ..Default::default()
        };
        for invitation in t.invitations.values().filter(|i| i.event_id == event_id) {
            stats.invited += 1;
            match invitation.status {
                InvitationStatus::Pending => stats.pending += 1,
                InvitationStatus::Accepted => stats.accepted += 1,
                InvitationStatus::Declined => stats.declined += 1,
            }
        }
        for attendance in t.attendances.values().filter(|a| a.event_id == event_id) {
            if attendance.is_checked_in() {
                stats.checked_in += 1;
            }
            if attendance.is_checked_out() {
                stats.checked_out += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::{Clock, ManualClock};

    fn user_request(email: &str) -> CreateUserRequest {
        CreateUserRequest { email: email.to_string(), full_name: "Test User".to_string(), role: None }
    }

    #[tokio::test]
    async fn test_invitation_insert_is_unique_per_pair() {
        let store = MemoryStore::new();
        let user = store.create_user(user_request("a@example.com")).await.unwrap();

        let first = store.insert_invitation_if_absent(10, user.id, 1).await.unwrap();
        let second = store.insert_invitation_if_absent(10, user.id, 1).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.list_invitations_by_event(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_insert_skips_unknown_and_repeated_users() {
        let store = MemoryStore::new();
        let a = store.create_user(user_request("a@example.com")).await.unwrap();
        let b = store.create_user(user_request("b@example.com")).await.unwrap();

        let created = store.insert_invitations_if_absent(5, &[a.id, b.id, a.id, 9999], 1).await.unwrap();
        assert_eq!(created.len(), 2);

        let again = store.insert_invitations_if_absent(5, &[a.id, b.id], 1).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_requires_open_checkin() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert!(!store.set_checkout_if_pending(1, 2, 3, now).await.unwrap());
        assert!(store.create_attendance_if_absent(1, 2, 3, now).await.unwrap());
        assert!(!store.create_attendance_if_absent(1, 2, 3, now).await.unwrap());
        assert!(store.set_checkout_if_pending(1, 2, 3, now).await.unwrap());
        assert!(!store.set_checkout_if_pending(1, 2, 3, now).await.unwrap());
    }

    fn event_request(location_id: i64, start: DateTime<Utc>) -> CreateEventRequest {
        CreateEventRequest {
            title: "Standup".to_string(),
            description: String::new(),
            location_id,
            start_time: start,
            end_time: start + chrono::Duration::hours(1),
            is_published: Some(true),
            capacity: None,
            requires_checkout: None,
            checkout_tolerance_minutes: None,
        }
    }

    fn location_request() -> CreateLocationRequest {
        CreateLocationRequest { name: "Main hall".to_string(), address: None, maps_url: None }
    }

    #[tokio::test]
    async fn test_rows_are_stamped_by_store_clock() {
        let start = Utc::now() - chrono::Duration::days(30);
        let clock = ManualClock::new(start);
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));

        let user = store.create_user(user_request("a@example.com")).await.unwrap();
        assert_eq!(user.created_at, start);

        clock.advance(chrono::Duration::minutes(3));
        let invitation = store.insert_invitation_if_absent(10, user.id, 1).await.unwrap().unwrap();
        assert_eq!(invitation.created_at, clock.now());

        clock.advance(chrono::Duration::minutes(3));
        let updated = store.update_user(user.id, UpdateUserRequest::default()).await.unwrap().unwrap();
        assert_eq!(updated.updated_at, clock.now());
        assert_eq!(updated.created_at, start);
    }

    #[tokio::test]
    async fn test_delete_event_takes_its_rows_along() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.create_user(user_request("a@example.com")).await.unwrap();
        let location = store.create_location(location_request()).await.unwrap();
        let event = store.create_event(event_request(location.id, now), user.id, EventStatus::InProgress).await.unwrap();
        store.insert_invitation_if_absent(event.id, user.id, user.id).await.unwrap();
        store.create_attendance_if_absent(event.id, user.id, user.id, now).await.unwrap();

        assert!(!store.delete_location(location.id).await.unwrap());
        assert!(store.delete_event(event.id).await.unwrap());
        assert!(!store.delete_event(event.id).await.unwrap());
        assert!(store.list_invitations_by_event(event.id).await.unwrap().is_empty());
        assert!(store.get_attendance(event.id, user.id).await.unwrap().is_none());
        assert!(store.delete_location(location.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create_user(user_request("dup@example.com")).await.unwrap();
        let err = store.create_user(user_request("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, QrMarkError::InvalidInput(_)));
    }
}
