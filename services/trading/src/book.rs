//! Per-symbol resting order books
//!
//! Each symbol owns one async lock; a tick evaluation, a new limit
//! insert and a cancel for the same symbol serialize on it. That lock
//! is the exactly-once guarantee: removal from the book and the order
//! status flip happen inside the same critical section, so a resting
//! order leaves the book exactly once.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

use types::ids::{OrderId, Symbol, UserId};
use types::order::Side;

/// The slice of an order the trigger scan needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub quantity: u64,
    pub limit_price: Decimal,
}

/// Trigger rule: BUY fills when the tick trades at or below the limit,
/// SELL when at or above.
pub fn is_triggered(side: Side, limit_price: Decimal, tick_price: Decimal) -> bool {
    match side {
        Side::Buy => tick_price <= limit_price,
        Side::Sell => tick_price >= limit_price,
    }
}

/// Resting limit orders for one symbol. Always accessed under the
/// symbol's lock.
#[derive(Default)]
pub struct SymbolBook {
    resting: Vec<RestingOrder>,
}

impl SymbolBook {
    pub fn insert(&mut self, order: RestingOrder) {
        self.resting.push(order);
    }

    /// Remove one order; `None` means it already left the book.
    pub fn remove(&mut self, order_id: OrderId) -> Option<RestingOrder> {
        let idx = self.resting.iter().position(|r| r.order_id == order_id)?;
        Some(self.resting.swap_remove(idx))
    }

    /// Drain every order the tick price triggers, in insertion order.
    pub fn take_triggered(&mut self, tick_price: Decimal) -> Vec<RestingOrder> {
        let mut triggered = Vec::new();
        self.resting.retain(|r| {
            if is_triggered(r.side, r.limit_price, tick_price) {
                triggered.push(r.clone());
                false
            } else {
                true
            }
        });
        triggered
    }

    pub fn len(&self) -> usize {
        self.resting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resting.is_empty()
    }
}

/// All per-symbol books. Distinct symbols proceed in parallel.
#[derive(Default)]
pub struct RestingIndex {
    books: DashMap<Symbol, Arc<Mutex<SymbolBook>>>,
}

impl RestingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a symbol, created on first use.
    pub fn book(&self, symbol: &Symbol) -> Arc<Mutex<SymbolBook>> {
        self.books
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SymbolBook::default())))
            .clone()
    }

    /// The lock for a symbol if any order ever rested there.
    pub fn existing_book(&self, symbol: &Symbol) -> Option<Arc<Mutex<SymbolBook>>> {
        self.books.get(symbol).map(|entry| entry.value().clone())
    }

    pub async fn resting_count(&self) -> usize {
        let mut total = 0;
        for entry in self.books.iter() {
            total += entry.value().lock().await.len();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resting(side: Side, limit: i64) -> RestingOrder {
        RestingOrder {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            side,
            quantity: 100,
            limit_price: Decimal::from(limit),
        }
    }

    #[test]
    fn test_trigger_rule() {
        // BUY 74,000: fills at or below the limit
        assert!(is_triggered(Side::Buy, Decimal::from(74_000), Decimal::from(73_900)));
        assert!(is_triggered(Side::Buy, Decimal::from(74_000), Decimal::from(74_000)));
        assert!(!is_triggered(Side::Buy, Decimal::from(74_000), Decimal::from(74_100)));

        // SELL 120,000: fills at or above the limit
        assert!(is_triggered(Side::Sell, Decimal::from(120_000), Decimal::from(121_000)));
        assert!(is_triggered(Side::Sell, Decimal::from(120_000), Decimal::from(120_000)));
        assert!(!is_triggered(Side::Sell, Decimal::from(120_000), Decimal::from(119_000)));
    }

    #[test]
    fn test_take_triggered_drains_matching() {
        let mut book = SymbolBook::default();
        let buy_low = resting(Side::Buy, 74_000);
        let buy_lower = resting(Side::Buy, 70_000);
        let sell_high = resting(Side::Sell, 80_000);
        book.insert(buy_low.clone());
        book.insert(buy_lower.clone());
        book.insert(sell_high.clone());

        let fired = book.take_triggered(Decimal::from(73_000));
        assert_eq!(fired, vec![buy_low]);
        assert_eq!(book.len(), 2);

        // Same tick evaluated again triggers nothing new
        assert!(book.take_triggered(Decimal::from(73_000)).is_empty());
    }

    #[test]
    fn test_remove_is_single_shot() {
        let mut book = SymbolBook::default();
        let order = resting(Side::Sell, 120_000);
        book.insert(order.clone());

        assert_eq!(book.remove(order.order_id), Some(order.clone()));
        assert_eq!(book.remove(order.order_id), None);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_index_creates_books_on_demand() {
        let index = RestingIndex::new();
        let vnm = Symbol::new("VNM");
        assert!(index.existing_book(&vnm).is_none());

        let book = index.book(&vnm);
        book.lock().await.insert(resting(Side::Buy, 74_000));
        assert_eq!(index.resting_count().await, 1);
        assert!(index.existing_book(&vnm).is_some());
    }
}
