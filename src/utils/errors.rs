//! Error handling
//!
//! Every failure of the booking engine is an `AppError`. Each variant maps to
//! an HTTP status and a stable machine-readable code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Main application errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code returned in every error body
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DB_ERROR",
            AppError::Validation(_) | AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::MissingFields(_) => "MISSING_FIELDS",
            AppError::InvalidRange(_) => "INVALID_RANGE",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::Unauthenticated(_) | AppError::Jwt(_) => "UNAUTHENTICATED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::GatewayRejected(_) => "GATEWAY_REJECTED",
            AppError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            AppError::Timeout(_) => "REQUEST_TIMEOUT",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::MissingFields(_)
            | AppError::InvalidRange(_)
            | AppError::InvalidAmount(_)
            | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database Error",
            AppError::Validation(_) | AppError::InvalidInput(_) | AppError::MissingFields(_) => {
                "Validation Error"
            }
            AppError::InvalidRange(_) => "Invalid Range",
            AppError::InvalidAmount(_) => "Invalid Amount",
            AppError::InvalidSignature => "Invalid Signature",
            AppError::Unauthenticated(_) | AppError::Jwt(_) => "Unauthenticated",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::NotFound(_) => "Not Found",
            AppError::Conflict(_) => "Conflict",
            AppError::InvalidTransition(_) => "Invalid Transition",
            AppError::GatewayRejected(_) => "Gateway Rejected",
            AppError::GatewayUnavailable(_) => "Gateway Unavailable",
            AppError::Timeout(_) => "Request Timeout",
            AppError::Cache(_) => "Cache Error",
            AppError::Internal(_) => "Internal Server Error",
        }
    }
}

/// API error body
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let error = self.title().to_string();

        let (message, details) = match &self {
            AppError::Database(e) => {
                error!("❌ Database error: {}", e);
                (
                    "An error occurred while accessing the database".to_string(),
                    None,
                )
            }
            AppError::InvalidInput(e) => (
                "The provided data is invalid".to_string(),
                Some(json!(e)),
            ),
            AppError::MissingFields(fields) => (
                self.to_string(),
                Some(json!({ "fields": fields })),
            ),
            AppError::InvalidSignature => {
                warn!("🚨 Payment signature mismatch, possible tampering");
                ("Payment signature verification failed".to_string(), None)
            }
            AppError::Unauthorized(msg) => {
                warn!("🚫 Forbidden access: {}", msg);
                (msg.clone(), None)
            }
            AppError::GatewayRejected(msg) | AppError::GatewayUnavailable(msg) => {
                error!("❌ Payment gateway error: {}", msg);
                (msg.clone(), None)
            }
            AppError::Cache(msg) | AppError::Internal(msg) => {
                error!("❌ {}: {}", error, msg);
                ("An internal error occurred".to_string(), None)
            }
            AppError::Validation(msg)
            | AppError::InvalidRange(msg)
            | AppError::InvalidAmount(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Jwt(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidTransition(msg) => (msg.clone(), None),
            AppError::Timeout(msg) => {
                warn!("⏱️ {}", msg);
                (msg.clone(), None)
            }
        };

        let body = ErrorResponse {
            error,
            message,
            details,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for the application
pub type AppResult<T> = Result<T, AppError>;
