//! Booking store
//!
//! `BookingStore` is the persistence port of the engine. `PgBookingStore`
//! keeps each mutating operation in one transaction: inserts serialise per
//! vehicle with a transactional advisory lock, transitions per booking with
//! `SELECT ... FOR UPDATE`. A transition that makes a booking hold its
//! vehicle also takes the vehicle lock and re-checks the window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::booking::{Booking, BookingFilters, BookingScope, BookingStatus, PaymentStatus};
use crate::models::payment::{Payment, PaymentRecordStatus, PaymentWrite};
use crate::services::availability_service::{blocking_bookings, holding_conflicts, BlockingPolicy};
use crate::services::booking_state_machine::{self, Actor, Transition};
use crate::utils::errors::{AppError, AppResult};

/// A state machine transition plus the payment row written with it
#[derive(Debug, Clone)]
pub struct BookingChange {
    pub actor: Actor,
    pub transition: Transition,
    pub payment: Option<PaymentWrite>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub payment: Option<Payment>,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a pending booking unless a booking blocking its window exists
    /// under `policy`. Check and insert are atomic per vehicle.
    async fn insert_booking(
        &self,
        booking: Booking,
        policy: BlockingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Booking>;

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<Booking>>;

    /// Non-cancelled bookings of a vehicle overlapping `[start, end)`
    async fn find_overlapping(
        &self,
        vehicle_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>>;

    async fn list_bookings(
        &self,
        scope: &BookingScope,
        filters: &BookingFilters,
    ) -> AppResult<Vec<Booking>>;

    /// Bookings of an agency whose payment completed
    async fn paid_bookings_for_agency(&self, agency_id: Uuid) -> AppResult<Vec<Booking>>;

    async fn payments_for_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>>;

    /// Unpaid pending bookings created before `created_before`
    async fn stale_pending(&self, created_before: DateTime<Utc>) -> AppResult<Vec<Uuid>>;

    /// Lock the booking, run the state machine and persist the new state
    /// together with the optional payment write. Refused with `Conflict` when
    /// the booking would start holding a window another booking holds.
    async fn apply_transition(
        &self,
        booking_id: Uuid,
        change: BookingChange,
    ) -> AppResult<TransitionOutcome>;
}

pub(crate) fn overlap_conflict(vehicle_id: Uuid, conflicts: &[Booking]) -> AppError {
    let ids: Vec<String> = conflicts.iter().map(|b| b.id.to_string()).collect();
    AppError::Conflict(format!(
        "Vehicle {} is already booked for the requested window (bookings: {})",
        vehicle_id,
        ids.join(", ")
    ))
}

pub(crate) fn foreign_order(order_id: &str) -> AppError {
    AppError::Conflict(format!("Order {} belongs to a different booking", order_id))
}

/// Unique violations become conflicts
fn map_write_error(e: sqlx::Error) -> AppError {
    match e.as_database_error().and_then(|db| db.code()) {
        Some(code) if code == "23505" => {
            AppError::Conflict("A conflicting record already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_payment(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        write: PaymentWrite,
        now: DateTime<Utc>,
    ) -> AppResult<Payment> {
        let existing = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE gateway_order_id = $1 FOR UPDATE",
        )
        .bind(&write.gateway_order_id)
        .fetch_optional(&mut **tx)
        .await?;

        let payment = match existing {
            Some(mut payment) => {
                if payment.booking_id != booking.id {
                    return Err(foreign_order(&payment.gateway_order_id));
                }
                write.apply_to(&mut payment, now);
                sqlx::query_as::<_, Payment>(
                    r#"
                    UPDATE payments
                    SET gateway_payment_id = $2, gateway_signature = $3, status = $4,
                        method = $5, email = $6, contact = $7, notes = $8,
                        raw_response = $9, updated_at = $10
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(payment.id)
                .bind(&payment.gateway_payment_id)
                .bind(&payment.gateway_signature)
                .bind(payment.status)
                .bind(&payment.method)
                .bind(&payment.email)
                .bind(&payment.contact)
                .bind(&payment.notes)
                .bind(&payment.raw_response)
                .bind(payment.updated_at)
                .fetch_one(&mut **tx)
                .await
                .map_err(map_write_error)?
            }
            None => {
                let payment = write.into_payment(booking.id, now);
                sqlx::query_as::<_, Payment>(
                    r#"
                    INSERT INTO payments (
                        id, booking_id, gateway_order_id, gateway_payment_id, gateway_signature,
                        amount_minor, currency, status, method, email, contact, notes,
                        raw_response, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                    RETURNING *
                    "#,
                )
                .bind(payment.id)
                .bind(payment.booking_id)
                .bind(&payment.gateway_order_id)
                .bind(&payment.gateway_payment_id)
                .bind(&payment.gateway_signature)
                .bind(payment.amount_minor)
                .bind(&payment.currency)
                .bind(payment.status)
                .bind(&payment.method)
                .bind(&payment.email)
                .bind(&payment.contact)
                .bind(&payment.notes)
                .bind(&payment.raw_response)
                .bind(payment.created_at)
                .bind(payment.updated_at)
                .fetch_one(&mut **tx)
                .await
                .map_err(map_write_error)?
            }
        };

        Ok(payment)
    }
}

/// Transactional per-vehicle lock, released at commit or rollback
async fn lock_vehicle(tx: &mut Transaction<'_, Postgres>, vehicle_id: Uuid) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(vehicle_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

const OVERLAP_SQL: &str = r#"
    SELECT * FROM bookings
    WHERE vehicle_id = $1
      AND status <> 'cancelled'
      AND start_date < $3
      AND end_date > $2
    ORDER BY start_date
"#;

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert_booking(
        &self,
        booking: Booking,
        policy: BlockingPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        lock_vehicle(&mut tx, booking.vehicle_id).await?;

        let candidates = sqlx::query_as::<_, Booking>(OVERLAP_SQL)
            .bind(booking.vehicle_id)
            .bind(booking.start_date)
            .bind(booking.end_date)
            .fetch_all(&mut *tx)
            .await?;

        let conflicts = blocking_bookings(candidates, booking.start_date, booking.end_date, policy, now);
        if !conflicts.is_empty() {
            tx.rollback().await?;
            return Err(overlap_conflict(booking.vehicle_id, &conflicts));
        }

        let inserted = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, customer_id, vehicle_id, agency_id, start_date, end_date,
                pickup_location, dropoff_location, daily_rate, number_of_days,
                subtotal, tax_amount, discount_amount, total_amount, security_deposit,
                status, payment_status, odometer_start, odometer_end, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21, $22)
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(booking.customer_id)
        .bind(booking.vehicle_id)
        .bind(booking.agency_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(&booking.pickup_location)
        .bind(&booking.dropoff_location)
        .bind(booking.daily_rate)
        .bind(booking.number_of_days)
        .bind(booking.subtotal)
        .bind(booking.tax_amount)
        .bind(booking.discount_amount)
        .bind(booking.total_amount)
        .bind(booking.security_deposit)
        .bind(booking.status)
        .bind(booking.payment_status)
        .bind(booking.odometer_start)
        .bind(booking.odometer_end)
        .bind(&booking.notes)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;

        info!("✅ Booking {} created for vehicle {}", inserted.id, inserted.vehicle_id);
        Ok(inserted)
    }

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn find_overlapping(
        &self,
        vehicle_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(OVERLAP_SQL)
            .bind(vehicle_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(bookings)
    }

    async fn list_bookings(
        &self,
        scope: &BookingScope,
        filters: &BookingFilters,
    ) -> AppResult<Vec<Booking>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT b.* FROM bookings b LEFT JOIN vehicles v ON v.id = b.vehicle_id WHERE (b.customer_id = ",
        );
        qb.push_bind(scope.customer_id);
        if let Some(agency_id) = scope.agency_id {
            qb.push(" OR b.agency_id = ").push_bind(agency_id);
        }
        qb.push(")");

        if let Some(status) = filters.status {
            qb.push(" AND b.status = ").push_bind(status);
        }
        if let Some(vehicle_type) = &filters.vehicle_type {
            qb.push(" AND LOWER(v.vehicle_type) = LOWER(")
                .push_bind(vehicle_type.clone())
                .push(")");
        }
        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (b.id::text ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.pickup_location ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.dropoff_location ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR v.make ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR v.model ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(from) = filters.start_from {
            qb.push(" AND b.start_date >= ").push_bind(from);
        }
        if let Some(to) = filters.start_to {
            qb.push(" AND b.start_date <= ").push_bind(to);
        }
        qb.push(" ORDER BY b.start_date DESC LIMIT ")
            .push_bind(filters.limit);

        let bookings = qb.build_query_as::<Booking>().fetch_all(&self.pool).await?;
        Ok(bookings)
    }

    async fn paid_bookings_for_agency(&self, agency_id: Uuid) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE agency_id = $1 AND payment_status = $2 ORDER BY start_date",
        )
        .bind(agency_id)
        .bind(PaymentStatus::Completed)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn stale_pending(&self, created_before: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM bookings
            WHERE status = $1
              AND payment_status IN ('pending', 'failed')
              AND created_at < $2
            ORDER BY created_at
            "#,
        )
        .bind(BookingStatus::Pending)
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn apply_transition(
        &self,
        booking_id: Uuid,
        change: BookingChange,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        let next = booking_state_machine::plan(&booking, &change.actor, &change.transition)?;

        if booking_state_machine::claims_window(&booking, &next, &change.transition) {
            lock_vehicle(&mut tx, booking.vehicle_id).await?;
            let candidates = sqlx::query_as::<_, Booking>(OVERLAP_SQL)
                .bind(booking.vehicle_id)
                .bind(booking.start_date)
                .bind(booking.end_date)
                .fetch_all(&mut *tx)
                .await?;
            let held = holding_conflicts(&booking, candidates);
            if !held.is_empty() {
                tx.rollback().await?;
                return Err(overlap_conflict(booking.vehicle_id, &held));
            }
        }

        let payment = match change.payment {
            Some(write) => Some(Self::upsert_payment(&mut tx, &booking, write, change.now).await?),
            None => None,
        };

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2, payment_status = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(next.status)
        .bind(next.payment_status)
        .bind(change.now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "🔄 Booking {} {}: {}/{} -> {}/{}",
            booking_id,
            change.transition.name(),
            booking.status,
            booking.payment_status,
            updated.status,
            updated.payment_status
        );

        Ok(TransitionOutcome {
            booking: updated,
            payment,
        })
    }
}

/// Reject a second `paid` attempt on the same booking
pub(crate) fn ensure_single_paid(
    payments: &[Payment],
    booking_id: Uuid,
    write: &PaymentWrite,
) -> AppResult<()> {
    if write.status != PaymentRecordStatus::Paid {
        return Ok(());
    }
    let already_paid = payments.iter().any(|p| {
        p.booking_id == booking_id
            && p.status == PaymentRecordStatus::Paid
            && p.gateway_order_id != write.gateway_order_id
    });
    if already_paid {
        return Err(AppError::Conflict(format!(
            "Booking {} already has a paid payment",
            booking_id
        )));
    }
    Ok(())
}
