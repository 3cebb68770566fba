//! User service implementation
//!
//! This service handles user registration, profile updates, listings and
//! role elevation between USER and MODERATOR.

use std::sync::Arc;
use tracing::{info, debug};
use crate::database::Store;
use crate::models::user::{User, Role, CreateUserRequest, UpdateUserRequest};
use crate::services::authorization::{Action, AuthorizationPolicy};
use crate::services::notification::NotificationService;
use crate::utils::errors::{QrMarkError, Result};
use crate::utils::helpers::{is_valid_email, normalize_email};
use crate::utils::logging::log_role_change;

const MIN_NAME_LEN: usize = 3;

/// User service for managing user operations
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    policy: AuthorizationPolicy,
    notifications: NotificationService,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(store: Arc<dyn Store>, policy: AuthorizationPolicy, notifications: NotificationService) -> Self {
        Self {
            store,
            policy,
            notifications,
        }
    }

    /// Register a new user. Email is stored normalized and must be unique.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let email = normalize_email(&request.email);
        debug!(email = %email, "Registering user");

        if !is_valid_email(&email) {
            return Err(QrMarkError::InvalidInput(format!("Invalid email address: {}", request.email)));
        }
        let full_name = request.full_name.trim().to_string();
        if full_name.chars().count() < MIN_NAME_LEN {
            return Err(QrMarkError::InvalidInput(format!(
                "Name must be at least {} characters",
                MIN_NAME_LEN
            )));
        }
        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(QrMarkError::InvalidInput(format!("Email {} is already registered", email)));
        }

        let user = self.store.create_user(CreateUserRequest {
            email,
            full_name,
            role: request.role,
        }).await?;

        info!(user_id = user.id, role = %user.role, "New user registered successfully");
        Ok(user)
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id })
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.get_user_by_email(&normalize_email(email)).await
    }

    /// List users, optionally by role. Organizers only.
    pub async fn list_users(&self, role: Option<Role>, viewer_id: i64) -> Result<Vec<User>> {
        let viewer = self.get_user(viewer_id).await?;
        self.policy.require(&viewer, Action::ViewAllUsers)?;
        self.store.list_users(role).await
    }

    /// Update user profile
    pub async fn update_profile(&self, user_id: i64, request: UpdateUserRequest) -> Result<User> {
        if let Some(ref name) = request.full_name {
            if name.trim().chars().count() < MIN_NAME_LEN {
                return Err(QrMarkError::InvalidInput(format!(
                    "Name must be at least {} characters",
                    MIN_NAME_LEN
                )));
            }
        }

        let request = UpdateUserRequest {
            full_name: request.full_name.map(|n| n.trim().to_string()),
        };
        let user = self.store
            .update_user(user_id, request)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id })?;

        info!(user_id = user_id, "User profile updated successfully");
        Ok(user)
    }

    /// USER -> MODERATOR
    pub async fn promote(&self, target_id: i64, organizer_id: i64) -> Result<User> {
        self.change_role(target_id, Role::User, Role::Moderator, organizer_id).await
    }

    /// MODERATOR -> USER
    pub async fn demote(&self, target_id: i64, organizer_id: i64) -> Result<User> {
        self.change_role(target_id, Role::Moderator, Role::User, organizer_id).await
    }

    async fn change_role(&self, target_id: i64, from: Role, to: Role, organizer_id: i64) -> Result<User> {
        let organizer = self.get_user(organizer_id).await?;
        self.policy.require(&organizer, Action::ManageRoles)?;

        let target = self.get_user(target_id).await?;
        if target.role != from {
            return Err(QrMarkError::InvalidStateTransition {
                from: target.role.to_string(),
                to: to.to_string(),
            });
        }

        if !self.store.set_user_role(target_id, from, to).await? {
            let current = self.get_user(target_id).await?;
            return Err(QrMarkError::InvalidStateTransition {
                from: current.role.to_string(),
                to: to.to_string(),
            });
        }

        let user = self.get_user(target_id).await?;
        log_role_change(target_id, from, to, organizer_id);
        self.notifications.notify_role_change(&user, to);
        Ok(user)
    }
}
