//! Earnings aggregator
//!
//! Revenue analytics for an agency, computed on read from bookings whose
//! payment completed. Bookings are bucketed by their start date.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::models::agency::Agency;
use crate::models::booking::Booking;
use crate::models::earnings::{
    month_start, next_month, previous_month, AgencyStats, CategoryShare, EarningsRange,
    EarningsReport, EarningsSummary, MonthlyPoint, VehiclePerformance,
};
use crate::models::vehicle::{Vehicle, VehicleCategory};
use crate::repositories::{BookingStore, CatalogLookup};
use crate::utils::errors::{AppError, AppResult};

const TREND_MONTHS: u32 = 6;

/// `(current - previous) / previous * 100`, 100 when growing from zero
pub fn growth_rate(current: Decimal, previous: Decimal) -> f64 {
    if previous.is_zero() {
        return if current > Decimal::ZERO { 100.0 } else { 0.0 };
    }
    let rate = (current - previous) / previous * Decimal::ONE_HUNDRED;
    rate.round_dp(1).to_f64().unwrap_or(0.0)
}

fn money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

fn average(total: Decimal, count: i64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        money(total / Decimal::from(count))
    }
}

fn sum(bookings: &[&Booking]) -> Decimal {
    bookings.iter().map(|b| b.total_amount).sum()
}

fn in_window(booking: &Booking, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    booking.start_date >= start && booking.start_date < end
}

fn categories(current: &[&Booking], vehicles: &HashMap<Uuid, Vehicle>, total: Decimal) -> Vec<CategoryShare> {
    let mut two_wheelers = Decimal::ZERO;
    let mut four_wheelers = Decimal::ZERO;
    for booking in current {
        match vehicles.get(&booking.vehicle_id).map(Vehicle::category) {
            Some(VehicleCategory::TwoWheeler) => two_wheelers += booking.total_amount,
            Some(VehicleCategory::FourWheeler) => four_wheelers += booking.total_amount,
            _ => {}
        }
    }
    let other = total - two_wheelers - four_wheelers;
    let share_base = if total.is_zero() { Decimal::ONE } else { total };

    [
        (VehicleCategory::TwoWheeler, "bike", two_wheelers),
        (VehicleCategory::FourWheeler, "car", four_wheelers),
        (VehicleCategory::Other, "other", other),
    ]
    .into_iter()
    .map(|(category, kind, amount)| CategoryShare {
        name: category.label().to_string(),
        kind: kind.to_string(),
        earnings: money(amount),
        percentage: (amount / share_base * Decimal::ONE_HUNDRED)
            .round_dp(1)
            .to_f64()
            .unwrap_or(0.0),
    })
    .collect()
}

/// Six calendar months ending with the month of `now`, over every paid booking
fn monthly_trend(all: &[Booking], now: DateTime<Utc>) -> Vec<MonthlyPoint> {
    let (mut year, mut month) = (now.year(), now.month());
    for _ in 1..TREND_MONTHS {
        (year, month) = previous_month(year, month);
    }

    let mut points = Vec::with_capacity(TREND_MONTHS as usize);
    for _ in 0..TREND_MONTHS {
        let start = month_start(year, month);
        let (ny, nm) = next_month(year, month);
        let end = month_start(ny, nm);
        let bucket: Vec<&Booking> = all.iter().filter(|b| in_window(b, start, end)).collect();
        points.push(MonthlyPoint {
            month: start.format("%b").to_string(),
            earnings: money(sum(&bucket)),
            bookings: bucket.len() as i64,
        });
        (year, month) = (ny, nm);
    }
    points
}

fn vehicle_performance(current: &[&Booking], vehicles: &HashMap<Uuid, Vehicle>) -> Vec<VehiclePerformance> {
    let mut stats: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
    for booking in current {
        let entry = stats.entry(booking.vehicle_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += booking.total_amount;
    }

    let mut performance: Vec<VehiclePerformance> = stats
        .into_iter()
        .map(|(vehicle_id, (bookings, earnings))| {
            let vehicle = vehicles.get(&vehicle_id);
            VehiclePerformance {
                vehicle_id,
                name: vehicle
                    .map(Vehicle::display_name)
                    .unwrap_or_else(|| "Unknown Vehicle".to_string()),
                vehicle_type: vehicle
                    .map(|v| v.vehicle_type.to_lowercase())
                    .unwrap_or_else(|| "other".to_string()),
                bookings,
                earnings: money(earnings),
                avg_per_booking: average(earnings, bookings),
            }
        })
        .collect();

    performance.sort_by(|a, b| b.earnings.cmp(&a.earnings).then_with(|| a.name.cmp(&b.name)));
    performance
}

/// Build the report from the agency's paid bookings
pub fn build_report(
    range: EarningsRange,
    now: DateTime<Utc>,
    paid: &[Booking],
    vehicles: &HashMap<Uuid, Vehicle>,
    agency: &Agency,
    vehicle_count: i64,
) -> EarningsReport {
    let windows = range.windows(now);

    let current: Vec<&Booking> = paid
        .iter()
        .filter(|b| in_window(b, windows.current_start, windows.now))
        .collect();
    let previous: Vec<&Booking> = paid
        .iter()
        .filter(|b| in_window(b, windows.previous_start, windows.previous_end))
        .collect();

    let total = sum(&current);
    let previous_total = sum(&previous);
    let total_bookings = current.len() as i64;
    let performance = vehicle_performance(&current, vehicles);

    EarningsReport {
        range,
        summary: EarningsSummary {
            total_earnings: money(total),
            total_bookings,
            average_per_booking: average(total, total_bookings),
            growth_rate: growth_rate(total, previous_total),
            previous_earnings: money(previous_total),
            top_vehicle: performance.first().cloned(),
        },
        categories: categories(&current, vehicles, total),
        monthly_trend: monthly_trend(paid, now),
        vehicle_performance: performance,
        agency_stats: AgencyStats {
            total_vehicles: vehicle_count,
            total_bookings: paid.len() as i64,
            total_earnings: money(paid.iter().map(|b| b.total_amount).sum()),
            rating: agency.rating,
        },
    }
}

pub struct EarningsService {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogLookup>,
}

impl EarningsService {
    pub fn new(store: Arc<dyn BookingStore>, catalog: Arc<dyn CatalogLookup>) -> Self {
        Self { store, catalog }
    }

    /// Report for the agency owned by `owner_id`
    pub async fn report(
        &self,
        owner_id: Uuid,
        range: EarningsRange,
        now: DateTime<Utc>,
    ) -> AppResult<EarningsReport> {
        let agency = self
            .catalog
            .find_agency_by_owner(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agency not found for user".to_string()))?;

        let paid = self.store.paid_bookings_for_agency(agency.id).await?;

        let mut vehicle_ids: Vec<Uuid> = paid.iter().map(|b| b.vehicle_id).collect();
        vehicle_ids.sort();
        vehicle_ids.dedup();
        let vehicles: HashMap<Uuid, Vehicle> = self
            .catalog
            .find_vehicles(&vehicle_ids)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();
        let vehicle_count = self.catalog.count_agency_vehicles(agency.id).await?;

        let report = build_report(range, now, &paid, &vehicles, &agency, vehicle_count);
        info!(
            "📊 Earnings for agency {} ({:?}): {} over {} booking(s)",
            agency.id, range, report.summary.total_earnings, report.summary.total_bookings
        );
        Ok(report)
    }
}
