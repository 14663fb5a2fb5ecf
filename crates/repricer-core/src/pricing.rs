//! Price computation: USD base times rate times margin, snapped to a
//! rounding step in the local currency. Local prices are integers
//! (guaraní); base prices are two-decimal USD values.
//!
//! All rounding is half-away-from-zero, matching `f64::round`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Snap `x` to the nearest multiple of `step`.
///
/// A step of 1 or less means plain integer rounding.
#[must_use]
pub fn round_to_step(x: f64, step: f64) -> f64 {
    if step <= 1.0 {
        x.round()
    } else {
        (x / step).round() * step
    }
}

/// Compute the local sale price for a USD base price.
///
/// `compute_price(10.00, 7200, 1.25, 100)` is `90_000`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compute_price(base_usd: Decimal, rate: f64, margin: f64, round_step: f64) -> i64 {
    let base = base_usd.to_f64().unwrap_or(0.0);
    round_to_step(base * rate * margin, round_step) as i64
}

/// Derive the stored USD base from a local sale price by dividing out the
/// rate and rounding to two decimals.
///
/// `None` when the division is not finite or the rounded result is not
/// positive (a sub-cent base is indistinguishable from no base).
#[must_use]
pub fn derive_base_usd(local_price: f64, rate: f64) -> Option<Decimal> {
    if !local_price.is_finite() || !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    to_money(local_price / rate).filter(|base| *base > Decimal::ZERO)
}

/// Convert a float into a two-decimal money value, half-away-from-zero.
#[must_use]
pub fn to_money(x: f64) -> Option<Decimal> {
    if !x.is_finite() {
        return None;
    }
    let mut money =
        Decimal::from_f64(x)?.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    money.rescale(2);
    Some(money)
}
