use chrono::Utc;

use crate::dto::earnings_dto::EarningsQuery;
use crate::models::auth::AuthenticatedUser;
use crate::models::earnings::{EarningsRange, EarningsReport};
use crate::services::earnings_service::EarningsService;
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};

pub struct EarningsController {
    service: EarningsService,
}

impl EarningsController {
    pub fn new(state: &AppState) -> Self {
        Self {
            service: EarningsService::new(state.store.clone(), state.catalog.clone()),
        }
    }

    pub async fn report(&self, user: AuthenticatedUser, query: EarningsQuery) -> AppResult<EarningsReport> {
        let range = match query.range.as_deref().map(str::trim) {
            None | Some("") => EarningsRange::default(),
            Some(raw) => raw.parse().map_err(AppError::Validation)?,
        };
        self.service.report(user.user_id, range, Utc::now()).await
    }
}
