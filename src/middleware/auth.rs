//! JWT authentication middleware
//!
//! Verifies the bearer token and injects the `AuthenticatedUser` into the
//! request extensions. Handlers read it with `Extension<AuthenticatedUser>`.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{
    state::AppState,
    utils::{
        errors::AppError,
        jwt::{extract_token_from_header, principal_from_claims, verify_token, JwtConfig},
    },
};

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("Authorization token required".to_string()))?;

    let token = extract_token_from_header(auth_header)?;
    let claims = verify_token(token, &JwtConfig::from(state.config.as_ref()))?;
    let user = principal_from_claims(&claims)?;

    debug!("🔐 Authenticated {} as {}", user.user_id, user.role.as_str());
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
