//! Invitation model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Declined => "DECLINED",
        }
    }

    /// Statuses an invitee may answer with
    pub fn is_response(&self) -> bool {
        matches!(self, InvitationStatus::Accepted | InvitationStatus::Declined)
    }
}

text_enum!(InvitationStatus, "invitation status", [Pending, Accepted, Declined]);

/// One invitation per (event, user)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub sender_id: i64,
    #[sqlx(try_from = "String")]
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Result of a bulk or list invitation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanOutReport {
    /// Distinct user ids that were asked for
    pub requested: usize,
    /// Invitations this request created, and the only ones notified
    pub created: Vec<Invitation>,
    /// Requested users that already had an invitation or do not exist
    pub skipped: Vec<i64>,
}

impl FanOutReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}
