use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::cache::idempotency::key_from_headers;
use crate::controllers::booking_controller::{BookingController, CreateBookingResponse};
use crate::dto::booking_dto::{
    AvailabilityQuery, AvailabilityResponse, AvailabilitySearchRequest, AvailabilitySearchResponse,
    BookingDetailResponse, BookingListQuery, BookingListResponse, BookingResponse,
    CreateBookingRequest, UpdatePaymentStatusRequest, UpdateStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::auth::AuthenticatedUser;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_booking_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/availability", get(check_availability))
        .route("/availability/search", post(search_availability))
        .route("/:id", get(get_booking))
        .route("/:id/status", put(update_status))
        .route("/:id/payment-status", put(update_payment_status))
        .route("/:id/cancel", put(cancel_booking))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<BookingListResponse>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.list(user, query).await?;
    Ok(Json(response))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let key = key_from_headers(&headers)?;
    let controller = BookingController::new(&state);
    let response = controller.create(user, request, key).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetailResponse>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.get(user, id).await?;
    Ok(Json(response))
}

async fn check_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.check_availability(query).await?;
    Ok(Json(response))
}

async fn search_availability(
    State(state): State<AppState>,
    Json(request): Json<AvailabilitySearchRequest>,
) -> Result<Json<AvailabilitySearchResponse>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.search_availability(request).await?;
    Ok(Json(response))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.update_status(user, id, request).await?;
    Ok(Json(response))
}

async fn update_payment_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.update_payment_status(user, id, request).await?;
    Ok(Json(response))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let controller = BookingController::new(&state);
    let response = controller.cancel(user, id).await?;
    Ok(Json(response))
}
