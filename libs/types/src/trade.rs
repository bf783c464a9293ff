//! Trade (fill) records
//!
//! A Trade is the immutable settlement record of one order. With
//! full-fill-on-trigger semantics there is exactly one Trade per
//! FILLED order.

use crate::ids::{OrderId, Symbol, TradeId, UserId};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub price: Decimal,
    pub fee: Decimal,
    /// Unix nanoseconds
    pub executed_at: i64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        quantity: u64,
        price: Decimal,
        fee: Decimal,
        executed_at: i64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            order_id,
            user_id,
            symbol,
            side,
            quantity,
            price,
            fee,
            executed_at,
        }
    }

    /// Trade value (price × quantity), before fees
    pub fn value(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_value() {
        let trade = Trade::new(
            OrderId::new(),
            UserId::new(),
            Symbol::new("VNM"),
            Side::Buy,
            100,
            Decimal::from(75_000),
            Decimal::from(7_500),
            1_700_000_000_000_000_000,
        );
        assert_eq!(trade.value(), Decimal::from(7_500_000));
    }

    #[test]
    fn test_trade_serialization() {
        let trade = Trade::new(
            OrderId::new(),
            UserId::new(),
            Symbol::new("FPT"),
            Side::Sell,
            50,
            Decimal::from(120_000),
            Decimal::from(6_000),
            1_700_000_000_000_000_000,
        );
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
