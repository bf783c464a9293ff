//! Append-only wallet transaction log
//!
//! Auditability invariant: the sum of balance-affecting deltas for a
//! wallet equals its current balance. LOCK/RELEASE entries record fund
//! reservation movement but do not change the balance, so they are
//! excluded from the audit sum.

use crate::ids::{OrderId, TradeId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason a ledger entry was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// One-time initial cash grant
    Grant,
    /// Funds reserved for a pending BUY order
    Lock,
    /// Reservation released (cancel or settlement)
    Release,
    /// Trade value debited on a BUY fill
    Buy,
    /// Trade value credited on a SELL fill
    Sell,
    /// Trading fee debited on any fill
    Fee,
}

impl LedgerEntryType {
    /// Whether entries of this type change the wallet balance.
    ///
    /// LOCK/RELEASE move funds between available and locked without
    /// changing the balance itself.
    pub fn affects_balance(&self) -> bool {
        !matches!(self, LedgerEntryType::Lock | LedgerEntryType::Release)
    }
}

/// Immutable ledger record.
///
/// `amount` is the signed delta applied to the wallet balance for
/// balance-affecting types, and the reservation amount moved for
/// LOCK/RELEASE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub user_id: UserId,
    pub entry_type: LedgerEntryType,
    pub amount: Decimal,
    /// Wallet balance after this entry was applied
    pub balance_after: Decimal,
    pub order_ref: Option<OrderId>,
    pub trade_ref: Option<TradeId>,
    /// Unix nanoseconds
    pub timestamp: i64,
}

impl LedgerEntry {
    pub fn new(
        user_id: UserId,
        entry_type: LedgerEntryType,
        amount: Decimal,
        balance_after: Decimal,
        timestamp: i64,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            user_id,
            entry_type,
            amount,
            balance_after,
            order_ref: None,
            trade_ref: None,
            timestamp,
        }
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_ref = Some(order_id);
        self
    }

    pub fn with_trade(mut self, trade_id: TradeId) -> Self {
        self.trade_ref = Some(trade_id);
        self
    }
}

/// Sum the balance-affecting deltas of a wallet's entries.
///
/// For a consistent ledger this equals the wallet's current balance.
pub fn balance_sum(entries: &[LedgerEntry]) -> Decimal {
    entries
        .iter()
        .filter(|e| e.entry_type.affects_balance())
        .map(|e| e.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affects_balance() {
        assert!(LedgerEntryType::Grant.affects_balance());
        assert!(LedgerEntryType::Buy.affects_balance());
        assert!(LedgerEntryType::Sell.affects_balance());
        assert!(LedgerEntryType::Fee.affects_balance());
        assert!(!LedgerEntryType::Lock.affects_balance());
        assert!(!LedgerEntryType::Release.affects_balance());
    }

    #[test]
    fn test_balance_sum_skips_reservations() {
        let user = UserId::new();
        let entries = vec![
            LedgerEntry::new(
                user,
                LedgerEntryType::Grant,
                Decimal::from(1_000_000),
                Decimal::from(1_000_000),
                1,
            ),
            LedgerEntry::new(
                user,
                LedgerEntryType::Lock,
                Decimal::from(500_000),
                Decimal::from(1_000_000),
                2,
            ),
            LedgerEntry::new(
                user,
                LedgerEntryType::Release,
                Decimal::from(500_000),
                Decimal::from(1_000_000),
                3,
            ),
            LedgerEntry::new(
                user,
                LedgerEntryType::Buy,
                Decimal::from(-400_000),
                Decimal::from(600_000),
                3,
            ),
            LedgerEntry::new(
                user,
                LedgerEntryType::Fee,
                Decimal::from(-400),
                Decimal::from(599_600),
                3,
            ),
        ];

        assert_eq!(balance_sum(&entries), Decimal::from(599_600));
    }

    #[test]
    fn test_entry_refs() {
        let order_id = OrderId::new();
        let trade_id = TradeId::new();
        let entry = LedgerEntry::new(
            UserId::new(),
            LedgerEntryType::Sell,
            Decimal::from(100),
            Decimal::from(100),
            1,
        )
        .with_order(order_id)
        .with_trade(trade_id);

        assert_eq!(entry.order_ref, Some(order_id));
        assert_eq!(entry.trade_ref, Some(trade_id));
    }
}
