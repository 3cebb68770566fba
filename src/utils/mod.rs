//! Utility modules
//!
//! This module contains common utilities used throughout the engine,
//! including error handling, logging setup, time sources and helper functions.

pub mod errors;
pub mod logging;
pub mod helpers;
pub mod clock;

pub use errors::{QrMarkError, Result};
pub use clock::{Clock, SystemClock, ManualClock, SharedClock};
