//! Booking pricing
//!
//! Resolves the pricing breakdown of a new booking and converts amounts to
//! gateway minor units.

use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::models::booking::PricingBreakdown;
use crate::utils::errors::{AppError, AppResult};

/// Amounts supplied by the client
#[derive(Debug, Clone, Default)]
pub struct PricingInput {
    pub daily_rate: Decimal,
    pub total_amount: Decimal,
    pub number_of_days: Option<i32>,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub security_deposit: Option<Decimal>,
}

/// Whole days between start and end, at least one
pub fn billable_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let days = (end - start).num_days();
    days.clamp(1, i32::MAX as i64) as i32
}

/// `round_half_even(amount * 100)`
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .ok_or_else(|| AppError::InvalidAmount(format!("Amount {} is out of range", amount)))
}

fn non_negative(field: &str, value: Decimal) -> AppResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::InvalidAmount(format!("{} cannot be negative", field)));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy)]
pub struct PricingService {
    enforce_server_pricing: bool,
}

impl PricingService {
    pub fn new(enforce_server_pricing: bool) -> Self {
        Self {
            enforce_server_pricing,
        }
    }

    pub fn resolve(
        &self,
        input: &PricingInput,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<PricingBreakdown> {
        let daily_rate = non_negative("dailyRate", input.daily_rate)?;
        let total_amount = non_negative("totalAmount", input.total_amount)?;
        let tax_amount = non_negative("tax", input.tax_amount.unwrap_or_default())?;
        let discount_amount = non_negative("discount", input.discount_amount.unwrap_or_default())?;
        let security_deposit = non_negative("securityDeposit", input.security_deposit.unwrap_or_default())?;

        let number_of_days = match input.number_of_days {
            Some(days) if days > 0 => days,
            _ => billable_days(start, end),
        };

        let subtotal = if self.enforce_server_pricing {
            let subtotal = daily_rate * Decimal::from(number_of_days);
            let expected = subtotal + tax_amount - discount_amount;
            if expected != total_amount {
                return Err(AppError::Validation(format!(
                    "totalAmount {} does not match the computed total {}",
                    total_amount, expected
                )));
            }
            subtotal
        } else {
            let subtotal = non_negative("subtotal", input.subtotal.unwrap_or(total_amount))?;
            if subtotal + tax_amount - discount_amount != total_amount {
                warn!(
                    "⚠️ Client pricing is inconsistent: subtotal {} + tax {} - discount {} != total {}",
                    subtotal, tax_amount, discount_amount, total_amount
                );
            }
            subtotal
        };

        Ok(PricingBreakdown {
            daily_rate,
            number_of_days,
            subtotal,
            tax_amount,
            discount_amount,
            total_amount,
            security_deposit,
        })
    }
}
