//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{QrMarkError, Result};
use super::Settings;

/// Minimum HMAC key length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_token_config(&settings.tokens)?;
    validate_attendance_config(&settings.attendance)?;
    validate_notification_config(&settings.notifications)?;
    validate_scheduler_config(&settings.scheduler)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(QrMarkError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(QrMarkError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(QrMarkError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate token configuration
pub(crate) fn validate_token_config(config: &super::TokenConfig) -> Result<()> {
    if config.secret.len() < MIN_SECRET_LEN {
        return Err(QrMarkError::Config(
            format!("Token secret must be at least {} bytes", MIN_SECRET_LEN)
        ));
    }

    if config.ttl_seconds == 0 {
        return Err(QrMarkError::Config(
            "Token TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate attendance configuration
fn validate_attendance_config(config: &super::AttendanceConfig) -> Result<()> {
    if config.checkin_grace_minutes < 0 {
        return Err(QrMarkError::Config(
            "Check-in grace period cannot be negative".to_string()
        ));
    }

    Ok(())
}

/// Validate notification configuration
fn validate_notification_config(config: &super::NotificationConfig) -> Result<()> {
    if let Some(ref webhook_url) = config.webhook_url {
        let parsed = url::Url::parse(webhook_url)
            .map_err(|e| QrMarkError::Config(format!("Invalid webhook URL {}: {}", webhook_url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(QrMarkError::Config(
                format!("Webhook URL must use http or https, got {}", parsed.scheme())
            ));
        }
    }

    if config.timeout_seconds == 0 {
        return Err(QrMarkError::Config(
            "Notification timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate scheduler configuration
fn validate_scheduler_config(config: &super::SchedulerConfig) -> Result<()> {
    if config.status_refresh_seconds == 0 {
        return Err(QrMarkError::Config(
            "Status refresh interval must be greater than 0".to_string()
        ));
    }

    if config.reminder_lead_minutes < 0 {
        return Err(QrMarkError::Config(
            "Reminder lead time cannot be negative".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(QrMarkError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(QrMarkError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
