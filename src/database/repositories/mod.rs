//! Database repositories module
//! 
//! This module contains all repository implementations for data access

pub mod user;
pub mod location;
pub mod event;
pub mod invitation;
pub mod distribution_list;
pub mod attendance;

// Re-export repositories
pub use user::UserRepository;
pub use location::LocationRepository;
pub use event::EventRepository;
pub use invitation::InvitationRepository;
pub use distribution_list::DistributionListRepository;
pub use attendance::AttendanceRepository;
