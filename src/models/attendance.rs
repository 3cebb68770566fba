//! Attendance model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use super::text_enum;

/// What a proof-of-presence token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanAction {
    #[serde(rename = "CHECKIN")]
    CheckIn,
    #[serde(rename = "CHECKOUT")]
    CheckOut,
}

impl ScanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanAction::CheckIn => "CHECKIN",
            ScanAction::CheckOut => "CHECKOUT",
        }
    }
}

text_enum!(ScanAction, "scan action", [CheckIn, CheckOut]);

/// At most one row per (event, user). Created by the first check-in.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub checked_in_by: Option<i64>,
    pub checked_out_by: Option<i64>,
}

impl Attendance {
    pub fn is_checked_in(&self) -> bool {
        self.check_in_time.is_some()
    }

    pub fn is_checked_out(&self) -> bool {
        self.check_out_time.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AttendanceStats {
    pub event_id: i64,
    pub capacity: Option<i32>,
    pub invited: i64,
    pub accepted: i64,
    pub declined: i64,
    pub pending: i64,
    pub checked_in: i64,
    pub checked_out: i64,
}
