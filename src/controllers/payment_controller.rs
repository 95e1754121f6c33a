//! Payment order coordinator
//!
//! Gateway order creation plus the signed verify and fail callbacks. The
//! gateway is called before any local write; the payment row and booking
//! status then change together in one store transition.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::cache::{IdempotencyGuard, IdempotencyStore};
use crate::dto::booking_dto::BookingResponse;
use crate::dto::payment_dto::{
    CreatePaymentOrderRequest, FailPaymentRequest, PaymentOrderResponse, VerifyPaymentRequest,
};
use crate::dto::ApiResponse;
use crate::models::auth::AuthenticatedUser;
use crate::models::booking::Booking;
use crate::models::payment::{PaymentRecordStatus, PaymentWrite};
use crate::repositories::booking_repository::overlap_conflict;
use crate::repositories::{BookingChange, BookingStore, CatalogLookup};
use crate::services::availability_service::holding_conflicts;
use crate::services::booking_state_machine::{self, Actor, BookingState, Transition};
use crate::services::payment_gateway::{OrderRequest, PaymentGateway};
use crate::services::payment_signature::PaymentSignatureVerifier;
use crate::services::pricing_service::to_minor_units;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::{parse_uuid, RequiredFields};

const RECEIPT_MAX_LEN: usize = 40;

/// `b_<booking id>`, cut to the gateway's receipt limit
pub fn receipt_for(booking_id: Uuid) -> String {
    let mut receipt = format!("b_{}", booking_id);
    receipt.truncate(RECEIPT_MAX_LEN);
    receipt
}

pub struct PaymentController {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogLookup>,
    gateway: Arc<dyn PaymentGateway>,
    signatures: PaymentSignatureVerifier,
    currency: String,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    idempotency_ttl: u64,
}

impl PaymentController {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            catalog: state.catalog.clone(),
            gateway: state.gateway.clone(),
            signatures: state.signatures.clone(),
            currency: state.config.booking.currency.clone(),
            idempotency: state.idempotency.clone(),
            idempotency_ttl: state.config.idempotency_ttl,
        }
    }

    /// Booking owned by `customer_id`, checked for `transition` rights
    async fn owned_booking(
        &self,
        customer_id: Uuid,
        booking_id: Uuid,
        transition: &Transition,
    ) -> AppResult<Booking> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        booking_state_machine::authorize(&booking, &Actor::Customer(customer_id), transition)?;
        Ok(booking)
    }

    pub async fn create_order(
        &self,
        user: AuthenticatedUser,
        request: CreatePaymentOrderRequest,
        idempotency_key: Option<String>,
    ) -> AppResult<PaymentOrderResponse> {
        let guard = match (&self.idempotency, idempotency_key) {
            (Some(store), Some(key)) => Some(IdempotencyGuard::new(
                store.clone(),
                user.user_id,
                "payment-orders",
                &key,
                &request,
                self.idempotency_ttl,
            )?),
            _ => None,
        };
        let Some(guard) = guard else {
            return self.open_order(user, &request).await;
        };
        if let Some(previous) = guard.begin::<PaymentOrderResponse>().await? {
            return Ok(previous);
        }

        match self.open_order(user, &request).await {
            Ok(response) => {
                if let Err(e) = guard.record(&response).await {
                    warn!("⚠️ Order created but idempotency record failed: {}", e);
                }
                Ok(response)
            }
            Err(err) => {
                if let Err(e) = guard.release().await {
                    warn!("⚠️ Could not release idempotency key after failed order: {}", e);
                }
                Err(err)
            }
        }
    }

    async fn open_order(
        &self,
        user: AuthenticatedUser,
        request: &CreatePaymentOrderRequest,
    ) -> AppResult<PaymentOrderResponse> {
        RequiredFields::new()
            .check_text("bookingId", &request.booking_id)
            .validation_result()?;
        let booking_id = parse_uuid("bookingId", request.booking_id.as_deref().unwrap_or_default())?;

        let transition = Transition::OpenPaymentOrder;
        let booking = self.owned_booking(user.user_id, booking_id, &transition).await?;

        let amount = match request.amount_paise {
            Some(amount) => amount,
            None => to_minor_units(booking.total_amount)?,
        };
        if amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "Order amount must be positive, got {}",
                amount
            )));
        }

        // Refuse before creating an order the booking could never accept
        booking_state_machine::next_state(BookingState::from(&booking), &transition)?;
        let held = holding_conflicts(
            &booking,
            self.store
                .find_overlapping(booking.vehicle_id, booking.start_date, booking.end_date)
                .await?,
        );
        if !held.is_empty() {
            return Err(overlap_conflict(booking.vehicle_id, &held));
        }

        let order = self
            .gateway
            .create_order(&OrderRequest {
                amount,
                currency: self.currency.clone(),
                receipt: receipt_for(booking.id),
                payment_capture: 1,
                notes: json!({
                    "booking_id": booking.id,
                    "vehicle_id": booking.vehicle_id,
                    "customer_id": booking.customer_id,
                }),
            })
            .await?;

        info!("🧾 Gateway order {} created for booking {} ({} {})", order.id, booking.id, amount, order.currency);

        let raw = if order.raw.is_null() {
            serde_json::to_value(&order)
                .map_err(|e| AppError::Internal(format!("Could not serialize order: {}", e)))?
        } else {
            order.raw.clone()
        };

        let mut write = PaymentWrite::new(
            order.id.clone(),
            PaymentRecordStatus::from_gateway(order.status.as_deref()),
        );
        write.amount_minor = amount;
        write.currency = order.currency.clone();
        write.notes = Some(order.notes.clone());
        write.raw_response = Some(raw.clone());

        self.store
            .apply_transition(
                booking.id,
                BookingChange {
                    actor: Actor::Customer(user.user_id),
                    transition,
                    payment: Some(write),
                    now: Utc::now(),
                },
            )
            .await?;

        Ok(PaymentOrderResponse {
            key_id: self.gateway.key_id().to_string(),
            order: raw,
            booking_id: booking.id,
        })
    }

    pub async fn verify(
        &self,
        user: AuthenticatedUser,
        request: VerifyPaymentRequest,
    ) -> AppResult<ApiResponse<BookingResponse>> {
        RequiredFields::new()
            .check_text("bookingId", &request.booking_id)
            .check_text("razorpay_order_id", &request.razorpay_order_id)
            .check_text("razorpay_payment_id", &request.razorpay_payment_id)
            .check_text("razorpay_signature", &request.razorpay_signature)
            .missing_fields_result()?;
        request.validate()?;

        let booking_id = parse_uuid("bookingId", request.booking_id.as_deref().unwrap_or_default())?;
        let order_id = request.razorpay_order_id.clone().unwrap_or_default();
        let payment_id = request.razorpay_payment_id.clone().unwrap_or_default();
        let signature = request.razorpay_signature.clone().unwrap_or_default();

        let transition = Transition::ConfirmPayment;
        let booking = self.owned_booking(user.user_id, booking_id, &transition).await?;

        if !self.signatures.verify(&order_id, &payment_id, &signature) {
            warn!(
                "🚨 Invalid payment signature for booking {} order {} from user {}",
                booking.id, order_id, user.user_id
            );
            return Err(AppError::InvalidSignature);
        }

        let raw = serde_json::to_value(&request)
            .map_err(|e| AppError::Internal(format!("Could not serialize payload: {}", e)))?;

        let mut write = PaymentWrite::new(order_id.clone(), PaymentRecordStatus::Paid);
        write.amount_minor = to_minor_units(booking.total_amount)?;
        write.currency = self.currency.clone();
        write.gateway_payment_id = Some(payment_id);
        write.gateway_signature = Some(signature);
        write.method = request.method;
        write.email = request.email;
        write.contact = request.contact;
        write.raw_response = Some(raw);

        let outcome = self
            .store
            .apply_transition(
                booking.id,
                BookingChange {
                    actor: Actor::Customer(user.user_id),
                    transition,
                    payment: Some(write),
                    now: Utc::now(),
                },
            )
            .await
            .map_err(|e| {
                if let AppError::Conflict(reason) = &e {
                    warn!(
                        "⚠️ Payment {} captured for booking {} but not applied, refund required: {}",
                        order_id, booking.id, reason
                    );
                }
                e
            })?;

        info!("✅ Payment verified for booking {} (order {})", booking.id, order_id);
        self.respond(outcome.booking, "Payment verified successfully").await
    }

    pub async fn fail(
        &self,
        user: AuthenticatedUser,
        request: FailPaymentRequest,
    ) -> AppResult<ApiResponse<BookingResponse>> {
        RequiredFields::new()
            .check_text("bookingId", &request.booking_id)
            .validation_result()?;
        request.validate()?;
        let booking_id = parse_uuid("bookingId", request.booking_id.as_deref().unwrap_or_default())?;

        let transition = Transition::FailPayment;
        let booking = self.owned_booking(user.user_id, booking_id, &transition).await?;

        let order_id = request
            .razorpay_order_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("failed_{}", booking.id));

        let raw = serde_json::to_value(&request)
            .map_err(|e| AppError::Internal(format!("Could not serialize payload: {}", e)))?;

        let mut write = PaymentWrite::new(order_id.clone(), PaymentRecordStatus::Failed);
        write.amount_minor = to_minor_units(booking.total_amount)?;
        write.currency = self.currency.clone();
        write.gateway_payment_id = request.razorpay_payment_id;
        write.gateway_signature = request.razorpay_signature;
        write.method = request.method;
        write.email = request.email;
        write.contact = request.contact;
        write.notes = request.reason.map(|reason| json!({ "reason": reason }));
        write.raw_response = Some(raw);

        let outcome = self
            .store
            .apply_transition(
                booking.id,
                BookingChange {
                    actor: Actor::Customer(user.user_id),
                    transition,
                    payment: Some(write),
                    now: Utc::now(),
                },
            )
            .await?;

        info!("❌ Payment failed for booking {} (order {}), booking cancelled", booking.id, order_id);
        self.respond(outcome.booking, "Payment marked as failed; booking cancelled")
            .await
    }

    async fn respond(&self, booking: Booking, message: &str) -> AppResult<ApiResponse<BookingResponse>> {
        let vehicle = self.catalog.find_vehicle(booking.vehicle_id).await?;
        Ok(ApiResponse::success_with_message(
            BookingResponse::from_booking(booking, vehicle.as_ref()),
            message,
        ))
    }
}
