//! Error handling for QrMark
//!
//! This module defines the main error types used throughout the engine.
//! Business outcomes (a token that fails verification, a duplicate check-in,
//! a forbidden action) and infrastructure failures (database, HTTP, I/O)
//! share one enum, and every variant carries a stable machine-readable code.

use thiserror::Error;

/// Main error type for QrMark
#[derive(Error, Debug)]
pub enum QrMarkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("Location not found: {location_id}")]
    LocationNotFound { location_id: i64 },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Invitation not found: {invitation_id}")]
    InvitationNotFound { invitation_id: i64 },

    #[error("Distribution list not found: {list_id}")]
    ListNotFound { list_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Event {event_id} is not scannable: {reason}")]
    EventNotScannable { event_id: i64, reason: String },

    #[error("User {user_id} is already checked in to event {event_id}")]
    AlreadyCheckedIn { event_id: i64, user_id: i64 },

    #[error("User {user_id} is not checked in to event {event_id}")]
    NotCheckedIn { event_id: i64, user_id: i64 },

    #[error("User {user_id} is already checked out of event {event_id}")]
    AlreadyCheckedOut { event_id: i64, user_id: i64 },

    #[error("Event {event_id} does not require check-out")]
    CheckoutNotRequired { event_id: i64 },

    #[error("User {user_id} is already invited to event {event_id}")]
    DuplicateInvitation { event_id: i64, user_id: i64 },

    #[error("Invitation {invitation_id} is not pending (current status: {status})")]
    InvitationNotPending { invitation_id: i64, status: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Proof-of-presence token failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token could not be decoded: {0}")]
    Malformed(String),

    #[error("token signature does not match its payload")]
    InvalidSignature,

    #[error("token expired {age_seconds}s after issue (ttl {ttl_seconds}s)")]
    Expired { age_seconds: i64, ttl_seconds: i64 },
}

/// Notification delivery failures
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Notification gateway timeout")]
    Timeout,

    #[error("Notification gateway rejected request with status {0}")]
    Rejected(u16),
}

/// Result type alias for QrMark operations
pub type Result<T> = std::result::Result<T, QrMarkError>;

/// Result type alias for token operations
pub type TokenResult<T> = std::result::Result<T, TokenError>;

/// Result type alias for notification delivery
pub type NotificationResult<T> = std::result::Result<T, NotificationError>;

impl TokenError {
    /// Stable code for this token failure
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "MALFORMED",
            TokenError::InvalidSignature => "INVALID_SIGNATURE",
            TokenError::Expired { .. } => "EXPIRED",
        }
    }
}

impl QrMarkError {
    /// Stable code surfaced to callers alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            QrMarkError::Database(_) => "DATABASE",
            QrMarkError::Migration(_) => "MIGRATION",
            QrMarkError::Token(e) => e.code(),
            QrMarkError::Notification(_) => "NOTIFICATION",
            QrMarkError::Config(_) => "CONFIG",
            QrMarkError::Forbidden(_) => "FORBIDDEN",
            QrMarkError::UserNotFound { .. } => "USER_NOT_FOUND",
            QrMarkError::LocationNotFound { .. } => "LOCATION_NOT_FOUND",
            QrMarkError::EventNotFound { .. } => "EVENT_NOT_FOUND",
            QrMarkError::InvitationNotFound { .. } => "INVITATION_NOT_FOUND",
            QrMarkError::ListNotFound { .. } => "LIST_NOT_FOUND",
            QrMarkError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            QrMarkError::EventNotScannable { .. } => "EVENT_NOT_SCANNABLE",
            QrMarkError::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            // A repeat check-out shares the not-checked-in code; only the message differs
            QrMarkError::NotCheckedIn { .. } | QrMarkError::AlreadyCheckedOut { .. } => "NOT_CHECKED_IN",
            QrMarkError::CheckoutNotRequired { .. } => "CHECKOUT_NOT_REQUIRED",
            QrMarkError::DuplicateInvitation { .. } => "DUPLICATE_INVITATION",
            QrMarkError::InvitationNotPending { .. } => "INVITATION_NOT_PENDING",
            QrMarkError::Http(_) => "HTTP",
            QrMarkError::Serialization(_) => "SERIALIZATION",
            QrMarkError::Io(_) => "IO",
            QrMarkError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Business outcomes are reported to the caller; everything else is infrastructure
    pub fn is_business(&self) -> bool {
        !matches!(
            self,
            QrMarkError::Database(_)
                | QrMarkError::Migration(_)
                | QrMarkError::Notification(_)
                | QrMarkError::Config(_)
                | QrMarkError::Http(_)
                | QrMarkError::Serialization(_)
                | QrMarkError::Io(_)
        )
    }

    /// Check if the error is worth retrying at a layer above the engine
    pub fn is_recoverable(&self) -> bool {
        match self {
            QrMarkError::Database(_) => true,
            QrMarkError::Migration(_) => false,
            QrMarkError::Notification(_) => true,
            QrMarkError::Config(_) => false,
            QrMarkError::Http(_) => true,
            QrMarkError::Io(_) => true,
            QrMarkError::Serialization(_) => false,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            QrMarkError::Database(_) => ErrorSeverity::Critical,
            QrMarkError::Migration(_) => ErrorSeverity::Critical,
            QrMarkError::Config(_) => ErrorSeverity::Critical,
            QrMarkError::Forbidden(_) => ErrorSeverity::Warning,
            QrMarkError::Token(TokenError::InvalidSignature) => ErrorSeverity::Warning,
            QrMarkError::InvalidInput(_) => ErrorSeverity::Info,
            e if e.is_business() => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
