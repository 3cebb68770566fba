//! Database module
//!
//! This module handles database connections and operations

pub mod connection;
pub mod repositories;
pub mod service;
pub mod store;
pub mod memory;

// Re-export commonly used database components
pub use connection::{DatabasePool, PoolConfig, create_pool, run_migrations, health_check};
pub use repositories::{UserRepository, LocationRepository, EventRepository, InvitationRepository, DistributionListRepository, AttendanceRepository};
pub use service::DatabaseService;
pub use store::Store;
pub use memory::MemoryStore;
