//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub tokens: TokenConfig,
    pub attendance: AttendanceConfig,
    pub notifications: NotificationConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Proof-of-presence token configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Process-wide HMAC key; never embedded in tokens
    pub secret: String,
    pub ttl_seconds: u64,
    /// Tolerated drift for tokens stamped slightly in the future
    pub max_clock_skew_seconds: u64,
}

/// Attendance scan policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttendanceConfig {
    /// How long before `start_time` check-in opens
    pub checkin_grace_minutes: i64,
}

/// Outbound notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

/// Background scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub status_refresh_seconds: u64,
    pub reminder_lead_minutes: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(config::File::with_name("config").required(false))
    }

    /// Load settings from an explicit file, still honouring environment overrides
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        Self::load(config::File::with_name(path).required(true))
    }

    fn load<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = config::Config::try_from(&Settings::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("QRMARK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::QrMarkError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/qrmark".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            tokens: TokenConfig {
                secret: String::new(),
                ttl_seconds: 600,
                max_clock_skew_seconds: 30,
            },
            attendance: AttendanceConfig {
                checkin_grace_minutes: 30,
            },
            notifications: NotificationConfig {
                enabled: true,
                webhook_url: None,
                timeout_seconds: 5,
            },
            scheduler: SchedulerConfig {
                status_refresh_seconds: 60,
                reminder_lead_minutes: 24 * 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                json: false,
            },
        }
    }
}
