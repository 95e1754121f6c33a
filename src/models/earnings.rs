//! Earnings report types

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EarningsRange {
    Week,
    #[default]
    Month,
    Year,
}

impl FromStr for EarningsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(EarningsRange::Week),
            "month" => Ok(EarningsRange::Month),
            "year" => Ok(EarningsRange::Year),
            other => Err(format!("unknown range '{}'", other)),
        }
    }
}

/// Current window `[current_start, now)` and the previous comparable window
/// `[previous_start, previous_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsWindows {
    pub current_start: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    pub previous_end: DateTime<Utc>,
}

impl EarningsRange {
    pub fn windows(&self, now: DateTime<Utc>) -> EarningsWindows {
        match self {
            EarningsRange::Week => EarningsWindows {
                current_start: now - Duration::days(7),
                now,
                previous_start: now - Duration::days(14),
                previous_end: now - Duration::days(7),
            },
            EarningsRange::Month => {
                let current_start = month_start(now.year(), now.month());
                let (py, pm) = previous_month(now.year(), now.month());
                EarningsWindows {
                    current_start,
                    now,
                    previous_start: month_start(py, pm),
                    previous_end: current_start,
                }
            }
            EarningsRange::Year => {
                let current_start = month_start(now.year(), 1);
                EarningsWindows {
                    current_start,
                    now,
                    previous_start: month_start(now.year() - 1, 1),
                    previous_end: current_start,
                }
            }
        }
    }
}

/// First instant of a calendar month in UTC
pub fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earnings: Decimal,
    pub total_bookings: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_per_booking: Decimal,
    pub growth_rate: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_earnings: Decimal,
    pub top_vehicle: Option<VehiclePerformance>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub name: String,
    /// `bike`, `car` or `other`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub earnings: Decimal,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub month: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub earnings: Decimal,
    pub bookings: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePerformance {
    pub vehicle_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub bookings: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub earnings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_per_booking: Decimal,
}

/// Lifetime stats recomputed on read
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgencyStats {
    pub total_vehicles: i64,
    pub total_bookings: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_earnings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub rating: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarningsReport {
    pub range: EarningsRange,
    pub summary: EarningsSummary,
    pub categories: Vec<CategoryShare>,
    pub monthly_trend: Vec<MonthlyPoint>,
    pub vehicle_performance: Vec<VehiclePerformance>,
    pub agency_stats: AgencyStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_windows_wrap_year() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let w = EarningsRange::Month.windows(now);
        assert_eq!(w.current_start, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.previous_start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(w.previous_end, w.current_start);
    }

    #[test]
    fn test_week_windows() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let w = EarningsRange::Week.windows(now);
        assert_eq!(w.current_start, Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap());
        assert_eq!(w.previous_start, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_range_parse_defaults() {
        assert_eq!("YEAR".parse::<EarningsRange>(), Ok(EarningsRange::Year));
        assert!("decade".parse::<EarningsRange>().is_err());
        assert_eq!(EarningsRange::default(), EarningsRange::Month);
    }
}
