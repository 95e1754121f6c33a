//! Booking request/response bodies
//!
//! Wire format is camelCase with money as JSON numbers, except the listing
//! and availability query strings which keep snake_case parameters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::booking::{Booking, BookingStatus, PaymentStatus};
use crate::models::payment::{Payment, PaymentRecordStatus};
use crate::models::vehicle::Vehicle;
use crate::services::availability_service::AvailabilityReport;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

/// Every field is optional so absent ones can be reported together
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub vehicle_id: Option<String>,
    pub agency_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[validate(length(max = 255))]
    pub pickup_location: Option<String>,
    #[validate(length(max = 255))]
    pub dropoff_location: Option<String>,
    pub daily_rate: Option<Decimal>,
    pub number_of_days: Option<i32>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub security_deposit: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_name: String,
    pub vehicle_type: Option<String>,
    pub customer_id: Uuid,
    pub agency_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_location: String,
    pub dropoff_location: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub daily_rate: Decimal,
    pub number_of_days: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub security_deposit: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub odometer_start: Option<i32>,
    pub odometer_end: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingResponse {
    pub fn from_booking(booking: Booking, vehicle: Option<&Vehicle>) -> Self {
        Self {
            id: booking.id,
            vehicle_id: booking.vehicle_id,
            vehicle_name: vehicle.map(Vehicle::display_name).unwrap_or_default(),
            vehicle_type: vehicle.map(|v| v.vehicle_type.clone()),
            customer_id: booking.customer_id,
            agency_id: booking.agency_id,
            start_date: booking.start_date,
            end_date: booking.end_date,
            pickup_location: booking.pickup_location,
            dropoff_location: booking.dropoff_location,
            daily_rate: booking.daily_rate,
            number_of_days: booking.number_of_days,
            subtotal: booking.subtotal,
            tax: booking.tax_amount,
            discount: booking.discount_amount,
            total_amount: booking.total_amount,
            security_deposit: booking.security_deposit,
            status: booking.status,
            payment_status: booking.payment_status,
            notes: booking.notes,
            odometer_start: booking.odometer_start,
            odometer_end: booking.odometer_end,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

/// One gateway order attempt as shown in booking detail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttemptResponse {
    pub id: Uuid,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentAttemptResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            order_id: p.gateway_order_id,
            payment_id: p.gateway_payment_id,
            amount_minor: p.amount_minor,
            currency: p.currency,
            status: p.status,
            method: p.method,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetailResponse {
    #[serde(flatten)]
    pub booking: BookingResponse,
    pub payments: Vec<PaymentAttemptResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub vehicle_type: Option<String>,
    pub q: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub vehicle_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// `strict` (default) or `listing`
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingSummary {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            start_date: b.start_date,
            end_date: b.end_date,
            status: b.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub vehicle_id: Uuid,
    pub requested_start_date: DateTime<Utc>,
    pub requested_end_date: DateTime<Utc>,
    pub is_booked: bool,
    pub conflicts: Vec<BookingSummary>,
}

impl AvailabilityResponse {
    pub fn from_report(report: &AvailabilityReport, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: report.vehicle_id,
            requested_start_date: start,
            requested_end_date: end,
            is_booked: report.is_booked,
            conflicts: report.conflicts.iter().map(BookingSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySearchRequest {
    #[validate(length(min = 1, max = 200))]
    pub vehicle_ids: Vec<Uuid>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySearchResponse {
    pub available_vehicle_ids: Vec<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: Option<String>,
}
