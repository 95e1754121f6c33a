//! Catalog lookups
//!
//! Read-only access to vehicles and agencies, owned by the catalog service.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::agency::Agency;
use crate::models::vehicle::Vehicle;
use crate::utils::errors::AppResult;

#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn find_vehicles(&self, ids: &[Uuid]) -> AppResult<Vec<Vehicle>>;

    async fn find_agency(&self, id: Uuid) -> AppResult<Option<Agency>>;

    /// Agency owned by a user, if any
    async fn find_agency_by_owner(&self, user_id: Uuid) -> AppResult<Option<Agency>>;

    async fn count_agency_vehicles(&self, agency_id: Uuid) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogLookup for PgCatalog {
    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vehicle)
    }

    async fn find_vehicles(&self, ids: &[Uuid]) -> AppResult<Vec<Vehicle>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let vehicles = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(vehicles)
    }

    async fn find_agency(&self, id: Uuid) -> AppResult<Option<Agency>> {
        let agency = sqlx::query_as::<_, Agency>("SELECT * FROM agencies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agency)
    }

    async fn find_agency_by_owner(&self, user_id: Uuid) -> AppResult<Option<Agency>> {
        let agency = sqlx::query_as::<_, Agency>("SELECT * FROM agencies WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(agency)
    }

    async fn count_agency_vehicles(&self, agency_id: Uuid) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles WHERE agency_id = $1")
            .bind(agency_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
