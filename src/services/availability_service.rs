//! Availability checker
//!
//! Decides whether a vehicle is free for a window. Candidates come from the
//! store (non-cancelled bookings overlapping the half-open window); the
//! blocking policy then decides which of them actually block.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::booking::{Booking, BookingStatus};
use crate::repositories::booking_repository::BookingStore;
use crate::utils::errors::{AppError, AppResult};

/// Which overlapping bookings count as conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingPolicy {
    /// Every non-cancelled booking blocks
    AllActive,
    /// Confirmed and active bookings block; pending ones only while younger
    /// than the grace window
    GraceWindow(Duration),
}

impl BlockingPolicy {
    pub fn blocks(&self, booking: &Booking, now: DateTime<Utc>) -> bool {
        match self {
            BlockingPolicy::AllActive => booking.status != BookingStatus::Cancelled,
            BlockingPolicy::GraceWindow(grace) => match booking.status {
                BookingStatus::Confirmed | BookingStatus::Active => true,
                BookingStatus::Pending => now - booking.created_at < *grace,
                BookingStatus::Completed | BookingStatus::Cancelled => false,
            },
        }
    }
}

/// Half-open `[start, end)` overlap test; touching windows do not overlap
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

pub fn ensure_valid_range(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if end <= start {
        return Err(AppError::InvalidRange(
            "End date must be after start date".to_string(),
        ));
    }
    Ok(())
}

/// Bookings among `candidates` that block `[start, end)` under `policy`
pub fn blocking_bookings(
    candidates: Vec<Booking>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    policy: BlockingPolicy,
    now: DateTime<Utc>,
) -> Vec<Booking> {
    candidates
        .into_iter()
        .filter(|b| b.overlaps(start, end) && policy.blocks(b, now))
        .collect()
}

/// Bookings other than `booking` that already hold its vehicle over its
/// window. A booking may only start holding the vehicle when this is empty.
pub fn holding_conflicts(booking: &Booking, candidates: Vec<Booking>) -> Vec<Booking> {
    candidates
        .into_iter()
        .filter(|b| {
            b.id != booking.id
                && b.vehicle_id == booking.vehicle_id
                && b.status.holds_vehicle()
                && b.overlaps(booking.start_date, booking.end_date)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AvailabilityReport {
    pub vehicle_id: Uuid,
    pub is_booked: bool,
    pub conflicts: Vec<Booking>,
}

pub struct AvailabilityService {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Snapshot check, no locks taken
    pub async fn check(
        &self,
        vehicle_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        policy: BlockingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<AvailabilityReport> {
        ensure_valid_range(start, end)?;

        let candidates = self.store.find_overlapping(vehicle_id, start, end).await?;
        let conflicts = blocking_bookings(candidates, start, end, policy, now);

        debug!(
            "🔍 Availability {} [{} - {}): {} conflict(s)",
            vehicle_id,
            start,
            end,
            conflicts.len()
        );

        Ok(AvailabilityReport {
            vehicle_id,
            is_booked: !conflicts.is_empty(),
            conflicts,
        })
    }

    /// Listing/search helper: the subset of `vehicle_ids` free for the window
    pub async fn available_vehicles(
        &self,
        vehicle_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        ensure_valid_range(start, end)?;

        let mut available = Vec::with_capacity(vehicle_ids.len());
        for vehicle_id in vehicle_ids {
            let report = self
                .check(*vehicle_id, start, end, BlockingPolicy::GraceWindow(grace), now)
                .await?;
            if !report.is_booked && !available.contains(vehicle_id) {
                available.push(*vehicle_id);
            }
        }
        Ok(available)
    }
}
