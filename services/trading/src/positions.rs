//! Position book: per-user per-symbol holdings
//!
//! Mutations arrive only from fills, which the engine already
//! serializes per symbol; the map provides lookup and listing.

use dashmap::DashMap;
use rust_decimal::Decimal;

use types::ids::{Symbol, UserId};
use types::position::Position;

#[derive(Default)]
pub struct PositionBook {
    positions: DashMap<(UserId, Symbol), Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares currently held; zero when no position exists.
    pub fn quantity(&self, user_id: UserId, symbol: &Symbol) -> u64 {
        self.positions
            .get(&(user_id, symbol.clone()))
            .map_or(0, |entry| entry.quantity)
    }

    pub fn get(&self, user_id: UserId, symbol: &Symbol) -> Option<Position> {
        self.positions
            .get(&(user_id, symbol.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn apply_buy(&self, user_id: UserId, symbol: &Symbol, quantity: u64, price: Decimal) {
        self.positions
            .entry((user_id, symbol.clone()))
            .or_insert_with(|| Position::new(user_id, symbol.clone()))
            .apply_buy(quantity, price);
    }

    /// # Panics
    /// Panics if quantity exceeds the held amount; callers check
    /// coverage first.
    pub fn apply_sell(&self, user_id: UserId, symbol: &Symbol, quantity: u64) {
        let mut entry = self
            .positions
            .get_mut(&(user_id, symbol.clone()))
            .expect("sell against missing position");
        entry.apply_sell(quantity);
    }

    /// All non-empty positions for a user, sorted by symbol.
    pub fn list(&self, user_id: UserId) -> Vec<Position> {
        let mut out: Vec<Position> = self
            .positions
            .iter()
            .filter(|entry| entry.key().0 == user_id && entry.value().quantity > 0)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }
}
