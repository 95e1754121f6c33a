//! Agency model
//!
//! Read-only view of `agencies`. The stats columns are denormalised and may
//! be stale; reports recompute them from bookings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agency {
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    pub agency_name: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub total_vehicles: i32,
    pub total_bookings: i32,
    pub total_earnings: Decimal,
    pub rating: Decimal,
    pub created_at: DateTime<Utc>,
}
