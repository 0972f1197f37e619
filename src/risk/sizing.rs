use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Calculate how much base asset the whole quote balance buys at `price`
///
/// The quantity is truncated (never rounded up) to `decimals` fractional
/// digits, so `quantity * price <= balance` always holds. Returns zero when
/// either input is not positive.
pub fn calculate_position_size(balance: Decimal, price: f64, decimals: u32) -> Decimal {
    let price = match Decimal::from_f64(price) {
        Some(p) if p > Decimal::ZERO => p,
        _ => return Decimal::ZERO,
    };
    if balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    // Ratio beyond the Decimal range: nothing sensible to buy
    let mut quantity = match balance.checked_div(price) {
        Some(ratio) => ratio.round_dp_with_strategy(decimals, RoundingStrategy::ToZero),
        None => return Decimal::ZERO,
    };

    // Division is exact to 28 digits; step down once if its last digit rounded up
    match quantity.checked_mul(price) {
        Some(cost) if cost <= balance => {}
        _ => quantity -= Decimal::new(1, decimals),
    }

    quantity.max(Decimal::ZERO)
}
