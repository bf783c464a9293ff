//! Fee and bootstrap-grant constants
//!
//! Paper trading charges a flat 0.1% of trade value on both sides.
//! Every account receives a one-time initial grant of 1,000,000,000 VND.

use rust_decimal::Decimal;

/// Flat trading fee rate: 0.1% of trade value
pub fn fee_rate() -> Decimal {
    Decimal::new(1, 3)
}

/// One-time initial cash grant (VND)
pub fn initial_cash() -> Decimal {
    Decimal::from(1_000_000_000u64)
}

/// Fee charged for a trade of the given value
pub fn trade_fee(trade_value: Decimal) -> Decimal {
    trade_value * fee_rate()
}

/// Conservative cost estimate used for BUY fund reservation:
/// quantity × reference price × (1 + fee rate)
pub fn estimated_cost(quantity: u64, reference_price: Decimal) -> Decimal {
    Decimal::from(quantity) * reference_price * (Decimal::ONE + fee_rate())
}
