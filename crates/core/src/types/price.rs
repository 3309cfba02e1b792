//! Decimal price arithmetic.
//!
//! Prices are plain [`Decimal`] amounts in the shop's single currency.
//! Currency formatting is left to the presentation layer.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept on computed amounts.
const MONEY_SCALE: u32 = 2;

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Total for `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// The amount taken off `amount` by a percentage discount.
///
/// `percent` is clamped to `[0, 100]` so a bad coupon can never produce a
/// negative total.
#[must_use]
pub fn apply_discount(amount: Decimal, percent: Decimal) -> Decimal {
    let percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}
