pub mod agency_routes;
pub mod booking_routes;
pub mod payment_routes;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer, middleware, response::Json, routing::get, BoxError, Router,
};
use serde_json::json;
use tower::{limit::GlobalConcurrencyLimitLayer, timeout::error::Elapsed, ServiceBuilder};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::{auth_middleware, cors_middleware_with_origins};
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Upper bound for one request, gateway calls included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests served at once; the rest wait for a slot
pub const MAX_IN_FLIGHT: usize = 1024;

/// Full application router. Everything under `/api` requires a bearer token.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .nest(
            "/bookings",
            booking_routes::create_booking_router()
                .nest("/payment", payment_routes::create_payment_router()),
        )
        .nest("/agencies", agency_routes::create_agency_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_middleware_with_origins(&state.config.cors_origins);

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api", api);

    with_request_limits(router, REQUEST_TIMEOUT, MAX_IN_FLIGHT)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "rental-bookings",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Time out slow requests and cap how many run concurrently
pub fn with_request_limits<S>(router: Router<S>, timeout: Duration, max_in_flight: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(timeout)
            .layer(GlobalConcurrencyLimitLayer::new(max_in_flight)),
    )
}

async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        AppError::Timeout("Request took too long to complete".to_string())
    } else {
        AppError::Internal(format!("Unhandled middleware error: {}", err))
    }
}
