//! Pending booking reaper
//!
//! Abandoned checkouts leave unpaid pending bookings behind. They stop
//! blocking availability after the grace window; when a TTL is configured
//! this job also cancels them so listings stay clean.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::repositories::{BookingChange, BookingStore};
use crate::services::booking_state_machine::{Actor, Transition};
use crate::utils::errors::{AppError, AppResult};

pub struct PendingReaper {
    store: Arc<dyn BookingStore>,
    ttl: Duration,
    interval: std::time::Duration,
}

impl PendingReaper {
    pub fn new(store: Arc<dyn BookingStore>, ttl: Duration, interval: std::time::Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
        }
    }

    /// Cancel every unpaid pending booking older than the TTL. Returns how
    /// many were cancelled.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let stale = self.store.stale_pending(now - self.ttl).await?;
        let mut cancelled = 0;

        for booking_id in stale {
            let change = BookingChange {
                actor: Actor::System,
                transition: Transition::Expire,
                payment: None,
                now,
            };
            match self.store.apply_transition(booking_id, change).await {
                Ok(_) => cancelled += 1,
                // Paid or cancelled since the scan
                Err(AppError::InvalidTransition(_)) | Err(AppError::NotFound(_)) => {
                    debug!("⏭️ Booking {} changed before expiry, skipped", booking_id);
                }
                Err(e) => warn!("⚠️ Could not expire booking {}: {}", booking_id, e),
            }
        }

        if cancelled > 0 {
            info!("🧹 Expired {} stale pending booking(s)", cancelled);
        }
        Ok(cancelled)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "⏱️ Pending reaper started (ttl {} min, every {:?})",
            self.ttl.num_minutes(),
            self.interval
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    error!("❌ Pending reaper pass failed: {}", e);
                }
            }
        })
    }
}
