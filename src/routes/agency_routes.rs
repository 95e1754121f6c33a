use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};

use crate::controllers::earnings_controller::EarningsController;
use crate::dto::earnings_dto::EarningsQuery;
use crate::models::auth::AuthenticatedUser;
use crate::models::earnings::EarningsReport;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_agency_router() -> Router<AppState> {
    Router::new().route("/earnings", get(get_earnings))
}

async fn get_earnings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<EarningsQuery>,
) -> Result<Json<EarningsReport>, AppError> {
    let controller = EarningsController::new(&state);
    let report = controller.report(user, query).await?;
    Ok(Json(report))
}
