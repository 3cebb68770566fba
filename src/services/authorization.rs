//! Role x action capability table.
//!
//! Every capability check in the services goes through [`AuthorizationPolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::models::{Role, User};
use crate::utils::errors::{QrMarkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    ViewOwnData,
    RespondToInvitation,
    RequestToken,
    ScanAttendance,
    ViewEventAttendance,
    ManageEvents,
    ManageInvitations,
    ManageDistributionLists,
    ManageRoles,
    ViewAllUsers,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::ViewOwnData,
        Action::RespondToInvitation,
        Action::RequestToken,
        Action::ScanAttendance,
        Action::ViewEventAttendance,
        Action::ManageEvents,
        Action::ManageInvitations,
        Action::ManageDistributionLists,
        Action::ManageRoles,
        Action::ViewAllUsers,
    ];

    /// Least privileged role that holds this action. Roles are ordered, so
    /// every role above it holds the action too.
    fn minimum_role(&self) -> Role {
        match self {
            Action::ViewOwnData | Action::RespondToInvitation | Action::RequestToken => Role::User,
            Action::ScanAttendance | Action::ViewEventAttendance => Role::Moderator,
            Action::ManageEvents
            | Action::ManageInvitations
            | Action::ManageDistributionLists
            | Action::ManageRoles
            | Action::ViewAllUsers => Role::Organizer,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn rank(role: Role) -> u8 {
    match role {
        Role::User => 0,
        Role::Moderator => 1,
        Role::Organizer => 2,
    }
}

/// Static, stateless policy
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, role: Role, action: Action) -> bool {
        rank(role) >= rank(action.minimum_role())
    }

    pub fn require(&self, user: &User, action: Action) -> Result<()> {
        if self.check(user.role, action) {
            Ok(())
        } else {
            Err(QrMarkError::Forbidden(format!(
                "role {} may not perform {}",
                user.role, action
            )))
        }
    }

    pub fn allowed_actions(&self, role: Role) -> Vec<Action> {
        Action::ALL.into_iter().filter(|a| self.check(role, *a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            id: 1,
            email: "someone@example.com".to_string(),
            full_name: "Someone".to_string(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_table() {
        use Action::*;
        let policy = AuthorizationPolicy::new();
        let expected: [(Action, [bool; 3]); 10] = [
            (ViewOwnData, [true, true, true]),
            (RespondToInvitation, [true, true, true]),
            (RequestToken, [true, true, true]),
            (ScanAttendance, [false, true, true]),
            (ViewEventAttendance, [false, true, true]),
            (ManageEvents, [false, false, true]),
            (ManageInvitations, [false, false, true]),
            (ManageDistributionLists, [false, false, true]),
            (ManageRoles, [false, false, true]),
            (ViewAllUsers, [false, false, true]),
        ];

        for (action, row) in expected {
            for (role, allowed) in Role::ALL.into_iter().zip(row) {
                assert_eq!(policy.check(role, action), allowed, "{:?} / {:?}", role, action);
            }
        }
    }

    #[test]
    fn test_require_reports_forbidden() {
        let policy = AuthorizationPolicy::new();
        assert!(policy.require(&user(Role::Moderator), Action::ScanAttendance).is_ok());

        let err = policy.require(&user(Role::User), Action::ScanAttendance).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn test_allowed_actions_grow_with_role() {
        let policy = AuthorizationPolicy::new();
        assert_eq!(policy.allowed_actions(Role::User).len(), 3);
        assert_eq!(policy.allowed_actions(Role::Moderator).len(), 5);
        assert_eq!(policy.allowed_actions(Role::Organizer).len(), Action::ALL.len());
    }
}
