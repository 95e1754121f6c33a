use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Extension, Json, Router,
};

use crate::cache::idempotency::key_from_headers;
use crate::controllers::payment_controller::PaymentController;
use crate::dto::booking_dto::BookingResponse;
use crate::dto::payment_dto::{
    CreatePaymentOrderRequest, FailPaymentRequest, PaymentOrderResponse, VerifyPaymentRequest,
};
use crate::dto::ApiResponse;
use crate::models::auth::AuthenticatedUser;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Mounted under `/api/bookings/payment`
pub fn create_payment_router() -> Router<AppState> {
    Router::new()
        .route("/order", post(create_order))
        .route("/verify", post(verify_payment))
        .route("/fail", post(fail_payment))
}

async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<Json<PaymentOrderResponse>, AppError> {
    let key = key_from_headers(&headers)?;
    let controller = PaymentController::new(&state);
    let response = controller.create_order(user, request, key).await?;
    Ok(Json(response))
}

async fn verify_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let controller = PaymentController::new(&state);
    let response = controller.verify(user, request).await?;
    Ok(Json(response))
}

async fn fail_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<FailPaymentRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let controller = PaymentController::new(&state);
    let response = controller.fail(user, request).await?;
    Ok(Json(response))
}
