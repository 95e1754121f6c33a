//! Payment model
//!
//! One row per gateway order attempt. A booking may have several attempts
//! but at most one with status `paid`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Gateway-side status - maps to the `payment_record_status` ENUM
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_record_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Created,
    Paid,
    Failed,
}

impl PaymentRecordStatus {
    /// Map the status string returned by the gateway on order creation
    pub fn from_gateway(status: Option<&str>) -> Self {
        match status.map(|s| s.to_ascii_lowercase()) {
            Some(s) if s == "paid" => PaymentRecordStatus::Paid,
            Some(s) if s == "failed" => PaymentRecordStatus::Failed,
            _ => PaymentRecordStatus::Created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    /// Minor units (paise for INR)
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub method: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub notes: Option<serde_json::Value>,
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment write applied together with a booking transition.
///
/// The row is located by `gateway_order_id`; when absent a new row is
/// inserted with `amount_minor` and `currency`.
#[derive(Debug, Clone)]
pub struct PaymentWrite {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub method: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub notes: Option<serde_json::Value>,
    pub raw_response: Option<serde_json::Value>,
}

impl PaymentWrite {
    pub fn new(gateway_order_id: impl Into<String>, status: PaymentRecordStatus) -> Self {
        Self {
            gateway_order_id: gateway_order_id.into(),
            amount_minor: 0,
            currency: "INR".to_string(),
            status,
            gateway_payment_id: None,
            gateway_signature: None,
            method: None,
            email: None,
            contact: None,
            notes: None,
            raw_response: None,
        }
    }

    /// Fresh row for this write
    pub fn into_payment(self, booking_id: Uuid, now: DateTime<Utc>) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            booking_id,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            gateway_signature: self.gateway_signature,
            amount_minor: self.amount_minor,
            currency: self.currency,
            status: self.status,
            method: self.method,
            email: self.email,
            contact: self.contact,
            notes: self.notes,
            raw_response: self.raw_response,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamp this write onto an existing row. Unset optional fields keep the
    /// stored value.
    pub fn apply_to(self, payment: &mut Payment, now: DateTime<Utc>) {
        payment.status = self.status;
        if self.gateway_payment_id.is_some() {
            payment.gateway_payment_id = self.gateway_payment_id;
        }
        if self.gateway_signature.is_some() {
            payment.gateway_signature = self.gateway_signature;
        }
        if self.method.is_some() {
            payment.method = self.method;
        }
        if self.email.is_some() {
            payment.email = self.email;
        }
        if self.contact.is_some() {
            payment.contact = self.contact;
        }
        if self.notes.is_some() {
            payment.notes = self.notes;
        }
        if self.raw_response.is_some() {
            payment.raw_response = self.raw_response;
        }
        payment.updated_at = now;
    }
}
