//! Position tracking: per-symbol holdings with average cost
//!
//! Positions are mutated only by fills. Quantity never goes negative
//! (no short-selling).

use crate::ids::{Symbol, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub quantity: u64,
    /// Volume-weighted average acquisition price
    pub avg_cost: Decimal,
}

impl Position {
    pub fn new(user_id: UserId, symbol: Symbol) -> Self {
        Self {
            user_id,
            symbol,
            quantity: 0,
            avg_cost: Decimal::ZERO,
        }
    }

    /// Apply a buy fill, updating the weighted average cost
    pub fn apply_buy(&mut self, quantity: u64, price: Decimal) {
        assert!(quantity > 0, "Fill quantity must be positive");

        if self.quantity == 0 {
            self.quantity = quantity;
            self.avg_cost = price;
        } else {
            let old_value = Decimal::from(self.quantity) * self.avg_cost;
            let new_value = Decimal::from(quantity) * price;
            self.quantity += quantity;
            self.avg_cost = (old_value + new_value) / Decimal::from(self.quantity);
        }
    }

    /// Apply a sell fill
    ///
    /// # Panics
    /// Panics if quantity exceeds the held amount. Callers validate
    /// coverage first and surface `InsufficientPosition`.
    pub fn apply_sell(&mut self, quantity: u64) {
        assert!(quantity > 0, "Fill quantity must be positive");
        assert!(quantity <= self.quantity, "Sell exceeds held quantity");

        self.quantity -= quantity;
        if self.quantity == 0 {
            self.avg_cost = Decimal::ZERO;
        }
    }

    /// Current market value at the given price
    pub fn market_value(&self, price: Decimal) -> Decimal {
        Decimal::from(self.quantity) * price
    }

    /// Unrealized profit/loss at the given price
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        self.market_value(price) - Decimal::from(self.quantity) * self.avg_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::new(UserId::new(), Symbol::new("VNM"))
    }

    #[test]
    fn test_first_buy_sets_avg_cost() {
        let mut pos = position();
        pos.apply_buy(100, Decimal::from(75_000));
        assert_eq!(pos.quantity, 100);
        assert_eq!(pos.avg_cost, Decimal::from(75_000));
    }

    #[test]
    fn test_weighted_average_cost() {
        let mut pos = position();
        pos.apply_buy(100, Decimal::from(70_000));
        pos.apply_buy(100, Decimal::from(80_000));
        assert_eq!(pos.quantity, 200);
        assert_eq!(pos.avg_cost, Decimal::from(75_000));
    }

    #[test]
    fn test_sell_reduces_quantity() {
        let mut pos = position();
        pos.apply_buy(100, Decimal::from(75_000));
        pos.apply_sell(40);
        assert_eq!(pos.quantity, 60);
        // Average cost unchanged by sells
        assert_eq!(pos.avg_cost, Decimal::from(75_000));
    }

    #[test]
    fn test_full_sell_resets_avg_cost() {
        let mut pos = position();
        pos.apply_buy(100, Decimal::from(75_000));
        pos.apply_sell(100);
        assert_eq!(pos.quantity, 0);
        assert_eq!(pos.avg_cost, Decimal::ZERO);
    }

    #[test]
    #[should_panic(expected = "Sell exceeds held quantity")]
    fn test_oversell_panics() {
        let mut pos = position();
        pos.apply_buy(50, Decimal::from(75_000));
        pos.apply_sell(51);
    }

    #[test]
    fn test_unrealized_pnl() {
        let mut pos = position();
        pos.apply_buy(100, Decimal::from(70_000));
        assert_eq!(
            pos.unrealized_pnl(Decimal::from(75_000)),
            Decimal::from(500_000)
        );
        assert_eq!(
            pos.unrealized_pnl(Decimal::from(65_000)),
            Decimal::from(-500_000)
        );
    }
}
