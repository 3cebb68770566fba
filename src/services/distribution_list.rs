//! Distribution lists: named sets of users an organizer invites together

use std::sync::Arc;
use tracing::info;
use crate::database::Store;
use crate::models::{CreateDistributionListRequest, DistributionList, UpdateDistributionListRequest, User};
use crate::services::authorization::{Action, AuthorizationPolicy};
use crate::utils::errors::{QrMarkError, Result};
use crate::utils::helpers::dedupe_ids;

const MIN_NAME_LEN: usize = 3;

fn validate_name(name: &str) -> Result<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(QrMarkError::InvalidInput(format!(
            "List name must be at least {} characters",
            MIN_NAME_LEN
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DistributionListService {
    store: Arc<dyn Store>,
    policy: AuthorizationPolicy,
}

impl DistributionListService {
    pub fn new(store: Arc<dyn Store>, policy: AuthorizationPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn create(&self, request: CreateDistributionListRequest, organizer_id: i64) -> Result<DistributionList> {
        self.require_organizer(organizer_id).await?;
        validate_name(&request.name)?;

        let list = self.store.create_list(request, organizer_id).await?;
        info!(list_id = list.id, organizer_id, "Distribution list created");
        Ok(list)
    }

    pub async fn get(&self, list_id: i64) -> Result<DistributionList> {
        self.store
            .get_list(list_id)
            .await?
            .ok_or(QrMarkError::ListNotFound { list_id })
    }

    pub async fn list_by_organizer(&self, organizer_id: i64) -> Result<Vec<DistributionList>> {
        self.store.list_lists_by_organizer(organizer_id).await
    }

    pub async fn update(&self, list_id: i64, request: UpdateDistributionListRequest, organizer_id: i64) -> Result<DistributionList> {
        self.owned_list(list_id, organizer_id).await?;
        if let Some(ref name) = request.name {
            validate_name(name)?;
        }

        self.store
            .update_list(list_id, request)
            .await?
            .ok_or(QrMarkError::ListNotFound { list_id })
    }

    pub async fn delete(&self, list_id: i64, organizer_id: i64) -> Result<()> {
        self.owned_list(list_id, organizer_id).await?;
        if !self.store.delete_list(list_id).await? {
            return Err(QrMarkError::ListNotFound { list_id });
        }
        info!(list_id, organizer_id, "Distribution list deleted");
        Ok(())
    }

    pub async fn add_member(&self, list_id: i64, user_id: i64, organizer_id: i64) -> Result<bool> {
        self.owned_list(list_id, organizer_id).await?;
        if self.store.get_user(user_id).await?.is_none() {
            return Err(QrMarkError::UserNotFound { user_id });
        }
        Ok(self.store.add_list_members(list_id, &[user_id]).await? == 1)
    }

    /// Add several users; existing members and unknown ids are ignored.
    /// Returns how many were added.
    pub async fn add_members(&self, list_id: i64, user_ids: &[i64], organizer_id: i64) -> Result<u64> {
        self.owned_list(list_id, organizer_id).await?;
        let added = self.store.add_list_members(list_id, &dedupe_ids(user_ids)).await?;
        info!(list_id, requested = user_ids.len(), added, "Distribution list members added");
        Ok(added)
    }

    pub async fn remove_member(&self, list_id: i64, user_id: i64, organizer_id: i64) -> Result<bool> {
        self.owned_list(list_id, organizer_id).await?;
        self.store.remove_list_member(list_id, user_id).await
    }

    pub async fn members(&self, list_id: i64) -> Result<Vec<User>> {
        self.get(list_id).await?;
        self.store.list_members(list_id).await
    }

    async fn require_organizer(&self, organizer_id: i64) -> Result<User> {
        let organizer = self.store
            .get_user(organizer_id)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id: organizer_id })?;
        self.policy.require(&organizer, Action::ManageDistributionLists)?;
        Ok(organizer)
    }

    async fn owned_list(&self, list_id: i64, organizer_id: i64) -> Result<DistributionList> {
        self.require_organizer(organizer_id).await?;
        let list = self.get(list_id).await?;
        if list.organizer_id != organizer_id {
            return Err(QrMarkError::Forbidden(format!(
                "user {} does not own distribution list {}",
                organizer_id, list_id
            )));
        }
        Ok(list)
    }
}
