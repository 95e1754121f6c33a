//! Booking model
//!
//! A booking is the aggregate root of a reservation. Status fields only move
//! through `services::booking_state_machine`; rows are never deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status - maps to the `booking_status` ENUM
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Confirmed and active bookings hold the vehicle for their window
    pub fn holds_vehicle(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Active)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "active" => Ok(BookingStatus::Active),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Payment axis of a booking - maps to the `booking_payment_status` ENUM
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "booking_payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Booking row - maps to the `bookings` table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub agency_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub daily_rate: Decimal,
    pub number_of_days: i32,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub security_deposit: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub odometer_start: Option<i32>,
    pub odometer_end: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Half-open `[start, end)` overlap with another window
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date < end && self.end_date > start
    }
}

/// Pricing fields resolved by the pricing service
#[derive(Debug, Clone, PartialEq)]
pub struct PricingBreakdown {
    pub daily_rate: Decimal,
    pub number_of_days: i32,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub security_deposit: Decimal,
}

/// Everything needed to persist a new pending booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub agency_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub pricing: PricingBreakdown,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn into_booking(self, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            vehicle_id: self.vehicle_id,
            agency_id: self.agency_id,
            start_date: self.start_date,
            end_date: self.end_date,
            pickup_location: self.pickup_location,
            dropoff_location: self.dropoff_location,
            daily_rate: self.pricing.daily_rate,
            number_of_days: self.pricing.number_of_days,
            subtotal: self.pricing.subtotal,
            tax_amount: self.pricing.tax_amount,
            discount_amount: self.pricing.discount_amount,
            total_amount: self.pricing.total_amount,
            security_deposit: self.pricing.security_deposit,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            odometer_start: None,
            odometer_end: None,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Who may see a booking in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingScope {
    pub customer_id: Uuid,
    /// Agency owned by the caller, if any
    pub agency_id: Option<Uuid>,
}

impl BookingScope {
    pub fn contains(&self, booking: &Booking) -> bool {
        booking.customer_id == self.customer_id || Some(booking.agency_id) == self.agency_id
    }
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct BookingFilters {
    pub status: Option<BookingStatus>,
    pub vehicle_type: Option<String>,
    pub search: Option<String>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    pub limit: i64,
}
