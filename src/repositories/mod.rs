//! Persistence
//!
//! Store traits with their PostgreSQL and in-memory implementations.

pub mod booking_repository;
pub mod catalog_repository;
pub mod in_memory;

pub use booking_repository::{BookingChange, BookingStore, PgBookingStore, TransitionOutcome};
pub use catalog_repository::{CatalogLookup, PgCatalog};
pub use in_memory::InMemoryStore;
