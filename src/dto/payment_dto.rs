//! Payment order bodies
//!
//! Verify/fail callbacks carry the checkout widget's `razorpay_*` field
//! names; the shorter `orderId`/`paymentId`/`signature` are accepted too.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentOrderRequest {
    pub booking_id: Option<String>,
    /// Minor units; overrides the booking total
    #[serde(alias = "amount_paise")]
    pub amount_paise: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderResponse {
    pub key_id: String,
    /// Gateway order as returned by the gateway
    pub order: serde_json::Value,
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "bookingId")]
    pub booking_id: Option<String>,
    #[serde(alias = "orderId")]
    pub razorpay_order_id: Option<String>,
    #[serde(alias = "paymentId")]
    pub razorpay_payment_id: Option<String>,
    #[serde(alias = "signature")]
    pub razorpay_signature: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub contact: Option<String>,
    #[validate(length(max = 32))]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FailPaymentRequest {
    #[serde(rename = "bookingId")]
    pub booking_id: Option<String>,
    #[serde(alias = "orderId")]
    pub razorpay_order_id: Option<String>,
    #[serde(alias = "paymentId")]
    pub razorpay_payment_id: Option<String>,
    #[serde(alias = "signature")]
    pub razorpay_signature: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub contact: Option<String>,
    #[validate(length(max = 32))]
    pub method: Option<String>,
    /// Gateway error description, stored with the attempt
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}
