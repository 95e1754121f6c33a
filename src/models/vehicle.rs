//! Vehicle model
//!
//! Read-only view of the catalog table `vehicles`. The catalog is owned by
//! another service; the booking engine only needs identity, type and rates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Vehicle status - maps to the `vehicle_status` ENUM
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "vehicle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Booked,
    Maintenance,
}

/// Broad vehicle family used for earnings breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleCategory {
    TwoWheeler,
    FourWheeler,
    Other,
}

impl VehicleCategory {
    pub fn from_vehicle_type(vehicle_type: &str) -> Self {
        match vehicle_type.trim().to_ascii_lowercase().as_str() {
            "bike" | "scooter" => VehicleCategory::TwoWheeler,
            "car" => VehicleCategory::FourWheeler,
            _ => VehicleCategory::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VehicleCategory::TwoWheeler => "2 Wheelers",
            VehicleCategory::FourWheeler => "4 Wheelers",
            VehicleCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub agency_id: Option<Uuid>,
    pub make: String,
    pub model: String,
    pub vehicle_type: String,
    pub daily_rate: Decimal,
    pub weekly_rate: Option<Decimal>,
    pub monthly_rate: Option<Decimal>,
    /// Advisory only, conflicts are decided by booking overlap
    pub is_available: bool,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// "make model" as shown in listings and reports
    pub fn display_name(&self) -> String {
        format!("{} {}", self.make, self.model).trim().to_string()
    }

    pub fn category(&self) -> VehicleCategory {
        VehicleCategory::from_vehicle_type(&self.vehicle_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_vehicle_type() {
        assert_eq!(VehicleCategory::from_vehicle_type("bike"), VehicleCategory::TwoWheeler);
        assert_eq!(VehicleCategory::from_vehicle_type("Scooter"), VehicleCategory::TwoWheeler);
        assert_eq!(VehicleCategory::from_vehicle_type("car"), VehicleCategory::FourWheeler);
        assert_eq!(VehicleCategory::from_vehicle_type("truck"), VehicleCategory::Other);
    }
}
