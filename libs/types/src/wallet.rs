//! Wallet: per-user cash balance with fund reservation
//!
//! Invariant: `0 <= locked <= balance` after every operation;
//! `available = balance - locked`.

use crate::ids::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Decimal,
    pub locked: Decimal,
    /// Set once when the initial cash grant is applied; the grant is
    /// idempotent on this flag, never on balance inspection.
    pub granted_at: Option<i64>,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            locked: Decimal::ZERO,
            granted_at: None,
        }
    }

    /// Funds not currently reserved by pending orders
    pub fn available(&self) -> Decimal {
        self.balance - self.locked
    }

    /// Check wallet invariant: 0 <= locked <= balance
    pub fn check_invariant(&self) -> bool {
        self.locked >= Decimal::ZERO && self.locked <= self.balance
    }

    /// Whether the one-time initial grant has been applied
    pub fn has_grant(&self) -> bool {
        self.granted_at.is_some()
    }

    /// Apply the one-time initial cash grant
    ///
    /// # Panics
    /// Panics if the grant was already applied.
    pub fn grant(&mut self, amount: Decimal, timestamp: i64) {
        assert!(self.granted_at.is_none(), "Grant already applied");
        assert!(amount >= Decimal::ZERO, "Grant amount must be non-negative");

        self.balance += amount;
        self.granted_at = Some(timestamp);

        assert!(self.check_invariant(), "Invariant violated after grant");
    }

    /// Reserve funds for a pending BUY order
    ///
    /// # Panics
    /// Panics if amount exceeds available funds. Callers validate
    /// availability first and surface `InsufficientFunds`.
    pub fn lock(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "Lock amount must be non-negative");
        assert!(amount <= self.available(), "Insufficient available funds");

        self.locked += amount;

        assert!(self.check_invariant(), "Invariant violated after lock");
    }

    /// Release a reservation (cancel, or settlement step one)
    ///
    /// # Panics
    /// Panics if amount exceeds the locked total.
    pub fn unlock(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "Unlock amount must be non-negative");
        assert!(amount <= self.locked, "Insufficient locked funds");

        self.locked -= amount;

        assert!(self.check_invariant(), "Invariant violated after unlock");
    }

    /// Debit settled funds from the balance
    ///
    /// # Panics
    /// Panics if amount exceeds available funds.
    pub fn debit(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "Debit amount must be non-negative");
        assert!(amount <= self.available(), "Insufficient available funds");

        self.balance -= amount;

        assert!(self.check_invariant(), "Invariant violated after debit");
    }

    /// Credit settled proceeds to the balance
    pub fn credit(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "Credit amount must be non-negative");

        self.balance += amount;

        assert!(self.check_invariant(), "Invariant violated after credit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn funded_wallet(amount: u64) -> Wallet {
        let mut w = Wallet::new(UserId::new());
        w.grant(Decimal::from(amount), 1);
        w
    }

    #[test]
    fn test_new_wallet_is_empty() {
        let w = Wallet::new(UserId::new());
        assert_eq!(w.balance, Decimal::ZERO);
        assert_eq!(w.available(), Decimal::ZERO);
        assert!(!w.has_grant());
        assert!(w.check_invariant());
    }

    #[test]
    fn test_grant_sets_flag() {
        let w = funded_wallet(1_000_000_000);
        assert!(w.has_grant());
        assert_eq!(w.balance, Decimal::from(1_000_000_000u64));
    }

    #[test]
    #[should_panic(expected = "Grant already applied")]
    fn test_double_grant_panics() {
        let mut w = funded_wallet(1_000_000);
        w.grant(Decimal::from(1_000_000), 2);
    }

    #[test]
    fn test_lock_unlock_cycle() {
        let mut w = funded_wallet(10_000);
        w.lock(Decimal::from(4_000));
        assert_eq!(w.available(), Decimal::from(6_000));
        assert_eq!(w.balance, Decimal::from(10_000));

        w.unlock(Decimal::from(4_000));
        assert_eq!(w.available(), Decimal::from(10_000));
        assert!(w.check_invariant());
    }

    #[test]
    fn test_settlement_debit() {
        let mut w = funded_wallet(10_000);
        w.lock(Decimal::from(4_000));
        // Settlement releases the reservation then debits the actual cost
        w.unlock(Decimal::from(4_000));
        w.debit(Decimal::from(3_500));

        assert_eq!(w.balance, Decimal::from(6_500));
        assert_eq!(w.locked, Decimal::ZERO);
        assert!(w.check_invariant());
    }

    #[test]
    #[should_panic(expected = "Insufficient available funds")]
    fn test_overlock_panics() {
        let mut w = funded_wallet(1_000);
        w.lock(Decimal::from(2_000));
    }

    #[test]
    #[should_panic(expected = "Insufficient available funds")]
    fn test_lock_is_not_spendable() {
        let mut w = funded_wallet(1_000);
        w.lock(Decimal::from(800));
        w.debit(Decimal::from(500));
    }

    proptest! {
        /// For any sequence of valid lock/unlock/debit/credit operations,
        /// the invariant 0 <= locked <= balance holds after each step.
        #[test]
        fn prop_wallet_invariant_holds(ops in proptest::collection::vec((0u8..4, 1u64..10_000), 0..50)) {
            let mut w = funded_wallet(1_000_000);
            for (op, raw_amount) in ops {
                let amount = Decimal::from(raw_amount);
                match op {
                    0 => {
                        if amount <= w.available() {
                            w.lock(amount);
                        }
                    }
                    1 => {
                        if amount <= w.locked {
                            w.unlock(amount);
                        }
                    }
                    2 => {
                        if amount <= w.available() {
                            w.debit(amount);
                        }
                    }
                    _ => w.credit(amount),
                }
                prop_assert!(w.check_invariant());
                prop_assert_eq!(w.available(), w.balance - w.locked);
            }
        }
    }
}
