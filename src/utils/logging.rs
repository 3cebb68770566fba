//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the QrMark engine.

use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::models::{Role, ScanAction};
use crate::utils::errors::{QrMarkError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .map_err(|e| QrMarkError::Config(format!("Invalid log filter {}: {}", config.level, e)))?;

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match config.file_path {
        Some(ref dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "qrmark.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| QrMarkError::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log the outcome of a token scan
pub fn log_scan(event_id: i64, user_id: i64, scanner_id: i64, action: ScanAction, outcome: &str) {
    info!(
        event_id = event_id,
        user_id = user_id,
        scanner_id = scanner_id,
        action = %action,
        outcome = outcome,
        "Attendance scan processed"
    );
}

/// Log invitation workflow actions
pub fn log_invitation_action(event_id: i64, action: &str, actor_id: i64, affected: usize) {
    info!(
        event_id = event_id,
        action = action,
        actor_id = actor_id,
        affected = affected,
        "Invitation action performed"
    );
}

/// Log event management actions
pub fn log_event_action(event_id: i64, action: &str, user_id: i64, details: Option<&str>) {
    info!(
        event_id = event_id,
        action = action,
        user_id = user_id,
        details = details,
        "Event action performed"
    );
}

/// Log role changes, which are privileged
pub fn log_role_change(target_id: i64, from: Role, to: Role, changed_by: i64) {
    warn!(
        target_id = target_id,
        from = %from,
        to = %to,
        changed_by = changed_by,
        "User role changed"
    );
}

/// Log a notification that could not be delivered
pub fn log_notification_failure(recipient: &str, kind: &str, error: &str) {
    warn!(
        recipient = recipient,
        kind = kind,
        error = error,
        "Notification delivery failed"
    );
}

/// Log database operations
pub fn log_database_operation(operation: &str, table: &str, affected: u64) {
    debug!(
        operation = operation,
        table = table,
        affected = affected,
        "Database operation completed"
    );
}
