//! Service configuration
//!
//! Database settings, environment variables and booking policy.

pub mod database;
pub mod environment;

pub use environment::*;
