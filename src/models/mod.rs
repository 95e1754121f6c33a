//! Domain models
//!
//! Structs mapping the PostgreSQL tables used by the booking engine plus the
//! value types shared by services and controllers.

pub mod agency;
pub mod auth;
pub mod booking;
pub mod earnings;
pub mod payment;
pub mod vehicle;
