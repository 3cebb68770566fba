//! Venues events are held at. Anyone may read them; organizers manage them.

use std::sync::Arc;
use tracing::info;
use crate::database::Store;
use crate::models::{CreateLocationRequest, Location, UpdateLocationRequest, User};
use crate::services::authorization::{Action, AuthorizationPolicy};
use crate::utils::errors::{QrMarkError, Result};

const MIN_NAME_LEN: usize = 3;

fn validate_name(name: &str) -> Result<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(QrMarkError::InvalidInput(format!(
            "Location name must be at least {} characters",
            MIN_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_maps_url(maps_url: Option<&str>) -> Result<()> {
    match maps_url {
        Some(raw) if url::Url::parse(raw).is_err() => {
            Err(QrMarkError::InvalidInput(format!("Invalid maps URL: {}", raw)))
        }
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn Store>,
    policy: AuthorizationPolicy,
}

impl LocationService {
    pub fn new(store: Arc<dyn Store>, policy: AuthorizationPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn get(&self, location_id: i64) -> Result<Location> {
        self.store
            .get_location(location_id)
            .await?
            .ok_or(QrMarkError::LocationNotFound { location_id })
    }

    pub async fn list_all(&self) -> Result<Vec<Location>> {
        self.store.list_locations().await
    }

    pub async fn create(&self, request: CreateLocationRequest, organizer_id: i64) -> Result<Location> {
        self.require_organizer(organizer_id).await?;
        validate_name(&request.name)?;
        validate_maps_url(request.maps_url.as_deref())?;

        let location = self.store.create_location(request).await?;
        info!(location_id = location.id, organizer_id, "Location created");
        Ok(location)
    }

    pub async fn update(&self, location_id: i64, request: UpdateLocationRequest, organizer_id: i64) -> Result<Location> {
        self.require_organizer(organizer_id).await?;
        if let Some(ref name) = request.name {
            validate_name(name)?;
        }
        validate_maps_url(request.maps_url.as_deref())?;

        self.store
            .update_location(location_id, request)
            .await?
            .ok_or(QrMarkError::LocationNotFound { location_id })
    }

    /// Events keep their location, so one still in use cannot be deleted
    pub async fn delete(&self, location_id: i64, organizer_id: i64) -> Result<()> {
        self.require_organizer(organizer_id).await?;
        self.get(location_id).await?;

        if !self.store.delete_location(location_id).await? {
            return Err(QrMarkError::InvalidInput(format!(
                "Location {} is still used by events",
                location_id
            )));
        }
        info!(location_id, organizer_id, "Location deleted");
        Ok(())
    }

    async fn require_organizer(&self, organizer_id: i64) -> Result<User> {
        let organizer = self.store
            .get_user(organizer_id)
            .await?
            .ok_or(QrMarkError::UserNotFound { user_id: organizer_id })?;
        self.policy.require(&organizer, Action::ManageEvents)?;
        Ok(organizer)
    }
}
