//! In-memory store
//!
//! Implements both `BookingStore` and `CatalogLookup` over a single
//! `RwLock`, so every write is serialised the way row and advisory locks
//! serialise them in PostgreSQL. Used by tests and local demos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::agency::Agency;
use crate::models::booking::{Booking, BookingFilters, BookingScope, BookingStatus, PaymentStatus};
use crate::models::payment::Payment;
use crate::models::vehicle::Vehicle;
use crate::repositories::booking_repository::{
    ensure_single_paid, foreign_order, overlap_conflict, BookingChange, BookingStore,
    TransitionOutcome,
};
use crate::repositories::catalog_repository::CatalogLookup;
use crate::services::availability_service::{blocking_bookings, holding_conflicts, BlockingPolicy};
use crate::services::booking_state_machine;
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    payments: Vec<Payment>,
    vehicles: HashMap<Uuid, Vehicle>,
    agencies: HashMap<Uuid, Agency>,
}

#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_vehicle(&self, vehicle: Vehicle) {
        self.tables.write().await.vehicles.insert(vehicle.id, vehicle);
    }

    pub async fn add_agency(&self, agency: Agency) {
        self.tables.write().await.agencies.insert(agency.id, agency);
    }

    /// Store a booking as-is, bypassing overlap checks
    pub async fn put_booking(&self, booking: Booking) {
        self.tables.write().await.bookings.insert(booking.id, booking);
    }

    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.tables.read().await.bookings.values().cloned().collect()
    }
}

fn matches_search(booking: &Booking, vehicle: Option<&Vehicle>, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let mut haystacks = vec![
        booking.id.to_string(),
        booking.pickup_location.to_lowercase(),
        booking.dropoff_location.to_lowercase(),
    ];
    if let Some(vehicle) = vehicle {
        haystacks.push(vehicle.make.to_lowercase());
        haystacks.push(vehicle.model.to_lowercase());
    }
    haystacks.iter().any(|h| h.contains(&needle))
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(
        &self,
        booking: Booking,
        policy: BlockingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tables = self.tables.write().await;

        let candidates: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.vehicle_id == booking.vehicle_id && b.status != BookingStatus::Cancelled)
            .cloned()
            .collect();
        let conflicts = blocking_bookings(candidates, booking.start_date, booking.end_date, policy, now);
        if !conflicts.is_empty() {
            return Err(overlap_conflict(booking.vehicle_id, &conflicts));
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        vehicle_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| {
                b.vehicle_id == vehicle_id
                    && b.status != BookingStatus::Cancelled
                    && b.overlaps(start, end)
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_date);
        Ok(bookings)
    }

    async fn list_bookings(
        &self,
        scope: &BookingScope,
        filters: &BookingFilters,
    ) -> AppResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| scope.contains(b))
            .filter(|b| filters.status.map_or(true, |s| b.status == s))
            .filter(|b| {
                let vehicle = tables.vehicles.get(&b.vehicle_id);
                let type_ok = filters.vehicle_type.as_deref().map_or(true, |t| {
                    vehicle.map_or(false, |v| v.vehicle_type.eq_ignore_ascii_case(t))
                });
                let search_ok = filters
                    .search
                    .as_deref()
                    .map_or(true, |q| matches_search(b, vehicle, q));
                type_ok && search_ok
            })
            .filter(|b| filters.start_from.map_or(true, |from| b.start_date >= from))
            .filter(|b| filters.start_to.map_or(true, |to| b.start_date <= to))
            .cloned()
            .collect();

        bookings.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        bookings.truncate(filters.limit.max(0) as usize);
        Ok(bookings)
    }

    async fn paid_bookings_for_agency(&self, agency_id: Uuid) -> AppResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.agency_id == agency_id && b.payment_status == PaymentStatus::Completed)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_date);
        Ok(bookings)
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn stale_pending(&self, created_before: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        let mut stale: Vec<&Booking> = tables
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::Pending
                    && matches!(b.payment_status, PaymentStatus::Pending | PaymentStatus::Failed)
                    && b.created_at < created_before
            })
            .collect();
        stale.sort_by_key(|b| b.created_at);
        Ok(stale.into_iter().map(|b| b.id).collect())
    }

    async fn apply_transition(
        &self,
        booking_id: Uuid,
        change: BookingChange,
    ) -> AppResult<TransitionOutcome> {
        let mut tables = self.tables.write().await;

        let booking = tables
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        let next = booking_state_machine::plan(&booking, &change.actor, &change.transition)?;

        if booking_state_machine::claims_window(&booking, &next, &change.transition) {
            let candidates: Vec<Booking> = tables
                .bookings
                .values()
                .filter(|b| b.vehicle_id == booking.vehicle_id)
                .cloned()
                .collect();
            let held = holding_conflicts(&booking, candidates);
            if !held.is_empty() {
                return Err(overlap_conflict(booking.vehicle_id, &held));
            }
        }

        // Validate the payment write before touching anything
        let payment = match change.payment {
            Some(write) => {
                ensure_single_paid(&tables.payments, booking_id, &write)?;
                let position = tables
                    .payments
                    .iter()
                    .position(|p| p.gateway_order_id == write.gateway_order_id);
                match position {
                    Some(index) => {
                        let existing = &mut tables.payments[index];
                        if existing.booking_id != booking_id {
                            return Err(foreign_order(&existing.gateway_order_id));
                        }
                        write.apply_to(existing, change.now);
                        Some(existing.clone())
                    }
                    None => {
                        let payment = write.into_payment(booking_id, change.now);
                        tables.payments.push(payment.clone());
                        Some(payment)
                    }
                }
            }
            None => None,
        };

        let stored = tables
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;
        stored.status = next.status;
        stored.payment_status = next.payment_status;
        stored.updated_at = change.now;

        Ok(TransitionOutcome {
            booking: stored.clone(),
            payment,
        })
    }
}

#[async_trait]
impl CatalogLookup for InMemoryStore {
    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.tables.read().await.vehicles.get(&id).cloned())
    }

    async fn find_vehicles(&self, ids: &[Uuid]) -> AppResult<Vec<Vehicle>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.vehicles.get(id).cloned()).collect())
    }

    async fn find_agency(&self, id: Uuid) -> AppResult<Option<Agency>> {
        Ok(self.tables.read().await.agencies.get(&id).cloned())
    }

    async fn find_agency_by_owner(&self, user_id: Uuid) -> AppResult<Option<Agency>> {
        let tables = self.tables.read().await;
        Ok(tables.agencies.values().find(|a| a.user_id == user_id).cloned())
    }

    async fn count_agency_vehicles(&self, agency_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .vehicles
            .values()
            .filter(|v| v.agency_id == Some(agency_id))
            .count() as i64)
    }
}
