//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts are carried at full precision through sums and only rounded to
//! cents when an aggregate is produced, so rounding error never compounds
//! per transaction.

use crate::error::{EngineError, EngineResult};
use rust_decimal::prelude::*;

/// Rounding precision for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed amount for a single posting
const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Round an aggregate to cents
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum then round once
pub fn sum_money<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_money(values.into_iter().sum())
}

/// Equality within [`MONEY_TOLERANCE`] (strictly less than one cent apart)
#[inline]
pub fn money_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < MONEY_TOLERANCE
}

/// Zero within [`MONEY_TOLERANCE`]
#[inline]
pub fn is_zero(value: Decimal) -> bool {
    value.abs() < MONEY_TOLERANCE
}

/// `value × percent / 100`
#[inline]
pub fn percent_of(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

/// Validate a percentage rate (rakeback or fee) is within `[0, 100]`
pub fn validate_rate(rate: Decimal, field_name: &str) -> EngineResult<()> {
    if rate < Decimal::ZERO {
        return Err(EngineError::OutOfRange(format!(
            "{} must be non-negative, got {}",
            field_name, rate
        )));
    }
    if rate > Decimal::ONE_HUNDRED {
        return Err(EngineError::OutOfRange(format!(
            "{} must be between 0 and 100, got {}",
            field_name, rate
        )));
    }
    Ok(())
}

/// Validate an amount to be posted is positive and within bounds
pub fn validate_amount(amount: Decimal) -> EngineResult<()> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(EngineError::InvalidAmount(format!(
            "amount exceeds maximum allowed ({}), got {}",
            MAX_AMOUNT, amount
        )));
    }
    Ok(())
}
