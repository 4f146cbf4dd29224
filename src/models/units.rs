//! Exact decimal arithmetic for usage and money
//!
//! All quantities the engine charges are [`rust_decimal::Decimal`]; binary
//! floats only exist at the API boundary and are converted on ingest. The one
//! precision-critical rule of the whole system lives here: usage is rounded
//! *down* to a whole number of cost increments before anything is charged.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ChargingError;
use crate::ChargingResult;

/// Rounds `usage` down to the nearest whole multiple of `increment`.
///
/// `rounded = trunc(usage / increment) * increment`, computed exactly.
/// Usage beyond a whole increment is deferred, never charged fractionally.
pub fn round_units_to_increment(usage: Decimal, increment: Decimal) -> ChargingResult<Decimal> {
    let whole = whole_increments(usage, increment)?;
    whole
        .checked_mul(increment)
        .map(|d| d.normalize())
        .ok_or_else(|| ChargingError::Numeric(format!("overflow rounding {} by {}", usage, increment)))
}

/// Number of whole increments contained in `usage` (truncating, toward zero).
pub fn whole_increments(usage: Decimal, increment: Decimal) -> ChargingResult<Decimal> {
    if increment <= Decimal::ZERO {
        return Err(ChargingError::Numeric(format!(
            "non-positive increment: {}",
            increment
        )));
    }
    usage
        .checked_div(increment)
        .map(|q| q.trunc())
        .ok_or_else(|| ChargingError::Numeric(format!("overflow dividing {} by {}", usage, increment)))
}

/// Division with a bounded scale, truncating toward zero.
///
/// Used where the quotient may not terminate (inverse unit factors,
/// proportional funding splits). Truncation never over-reports consumption.
pub fn div_units(num: Decimal, den: Decimal, scale: u32) -> ChargingResult<Decimal> {
    if den.is_zero() {
        return Err(ChargingError::Numeric(format!("division of {} by zero", num)));
    }
    num.checked_div(den)
        .map(|q| q.round_dp_with_strategy(scale, RoundingStrategy::ToZero).normalize())
        .ok_or_else(|| ChargingError::Numeric(format!("overflow dividing {} by {}", num, den)))
}

/// Exact multiplication with overflow reported as an error.
pub fn mul_units(lhs: Decimal, rhs: Decimal) -> ChargingResult<Decimal> {
    lhs.checked_mul(rhs)
        .ok_or_else(|| ChargingError::Numeric(format!("overflow multiplying {} by {}", lhs, rhs)))
}

/// Converts an external float quantity into the internal decimal form.
///
/// The shortest decimal representation of the float is taken, so every value
/// that fits the supported scale round-trips exactly (`14` stays `14`,
/// `1.3` stays `1.3`).
pub fn units_from_f64(value: f64) -> ChargingResult<Decimal> {
    if !value.is_finite() {
        return Err(ChargingError::InvalidUnits(format!(
            "non-finite units: {}",
            value
        )));
    }
    Decimal::from_f64(value)
        .map(|d| d.normalize())
        .ok_or_else(|| ChargingError::InvalidUnits(format!("unrepresentable units: {}", value)))
}

/// Converts an internal decimal back to the external float representation.
pub fn units_to_f64(value: Decimal) -> ChargingResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| ChargingError::InvalidUnits(format!("units out of f64 range: {}", value)))
}
