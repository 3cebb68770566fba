//! QrMark attendance engine
//!
//! Events, invitations and check-in/check-out attendance, with signed
//! single-use QR tokens as proof of presence. The services talk to an
//! abstract [`database::Store`]; Postgres and in-memory stores are provided.

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{QrMarkError, Result};

// Re-export main components for easy access
pub use database::{DatabaseService, MemoryStore, Store};
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
