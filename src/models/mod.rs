//! Data models module
//!
//! This module contains all data structures used throughout the engine

use thiserror::Error;

/// A stored enum column held a value this build does not know
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `Display`, `FromStr` and `TryFrom<String>` for a text-backed enum
/// from its `as_str` mapping, so rows can decode it with `#[sqlx(try_from = "String")]`.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($ty::$variant.as_str()) {
                        return Ok($ty::$variant);
                    }
                )+
                Err($crate::models::UnknownVariant { kind: $kind, value: s.to_string() })
            }
        }

        impl TryFrom<String> for $ty {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub(crate) use text_enum;

pub mod user;
pub mod location;
pub mod event;
pub mod invitation;
pub mod distribution_list;
pub mod attendance;

// Re-export commonly used models
pub use user::{User, Role, CreateUserRequest, UpdateUserRequest};
pub use location::{Location, CreateLocationRequest, UpdateLocationRequest};
pub use event::{Event, EventStatus, CreateEventRequest, UpdateEventRequest};
pub use invitation::{Invitation, InvitationStatus, FanOutReport};
pub use distribution_list::{DistributionList, DistributionListMember, CreateDistributionListRequest, UpdateDistributionListRequest};
pub use attendance::{Attendance, AttendanceStats, ScanAction};
