//! Wallet ledger: cash accounts with an append-only audit log
//!
//! Every wallet mutation happens under the wallet's own async lock and
//! appends a ledger entry in the same critical section. An audit that
//! finds the entry sum diverging from the recorded balance halts the
//! wallet: every further mutation fails with `LedgerInconsistency`.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{error, info};

use types::errors::TradingError;
use types::fee::initial_cash;
use types::ids::{OrderId, TradeId, UserId};
use types::ledger::{balance_sum, LedgerEntry, LedgerEntryType};
use types::wallet::Wallet;

struct WalletAccount {
    wallet: Wallet,
    entries: Vec<LedgerEntry>,
    /// Set on audit failure with (recorded, computed)
    halted: Option<(Decimal, Decimal)>,
}

impl WalletAccount {
    fn new(user_id: UserId) -> Self {
        Self {
            wallet: Wallet::new(user_id),
            entries: Vec::new(),
            halted: None,
        }
    }

    fn check_halted(&self) -> Result<(), TradingError> {
        match self.halted {
            Some((recorded, computed)) => Err(TradingError::LedgerInconsistency {
                recorded,
                computed,
            }),
            None => Ok(()),
        }
    }

    /// Entry snapshotting the balance as it stands; callers mutate the
    /// wallet first, then attach order/trade refs and append.
    fn entry(&self, entry_type: LedgerEntryType, amount: Decimal, timestamp: i64) -> LedgerEntry {
        LedgerEntry::new(
            self.wallet.user_id,
            entry_type,
            amount,
            self.wallet.balance,
            timestamp,
        )
    }

    fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }
}

/// All wallets, keyed by user. One async lock per wallet.
#[derive(Default)]
pub struct WalletLedger {
    accounts: DashMap<UserId, Arc<Mutex<WalletAccount>>>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn account(&self, user_id: UserId) -> Arc<Mutex<WalletAccount>> {
        self.accounts
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(WalletAccount::new(user_id))))
            .clone()
    }

    pub async fn wallet(&self, user_id: UserId) -> Wallet {
        self.account(user_id).lock().await.wallet.clone()
    }

    pub async fn entries(&self, user_id: UserId) -> Vec<LedgerEntry> {
        self.account(user_id).lock().await.entries.clone()
    }

    /// Apply the one-time initial cash grant. Idempotent on the grant
    /// flag: a second call returns the wallet unchanged.
    pub async fn grant_initial_cash(
        &self,
        user_id: UserId,
        timestamp: i64,
    ) -> Result<Wallet, TradingError> {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.check_halted()?;

        if account.wallet.has_grant() {
            return Ok(account.wallet.clone());
        }

        let amount = initial_cash();
        account.wallet.grant(amount, timestamp);
        let entry = account.entry(LedgerEntryType::Grant, amount, timestamp);
        account.append(entry);
        info!(user_id = %user_id, amount = %amount, "initial cash granted");
        Ok(account.wallet.clone())
    }

    /// Reserve funds for a pending BUY order. The availability check
    /// and the lock are one critical section.
    pub async fn reserve(
        &self,
        user_id: UserId,
        amount: Decimal,
        order_id: OrderId,
        timestamp: i64,
    ) -> Result<(), TradingError> {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.check_halted()?;

        if amount > account.wallet.available() {
            return Err(TradingError::InsufficientFunds {
                required: amount,
                available: account.wallet.available(),
            });
        }

        account.wallet.lock(amount);
        let entry = account
            .entry(LedgerEntryType::Lock, amount, timestamp)
            .with_order(order_id);
        account.append(entry);
        Ok(())
    }

    /// Release a reservation without settling (cancel path).
    pub async fn release(
        &self,
        user_id: UserId,
        amount: Decimal,
        order_id: OrderId,
        timestamp: i64,
    ) -> Result<(), TradingError> {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.check_halted()?;

        account.wallet.unlock(amount);
        let entry = account
            .entry(LedgerEntryType::Release, amount, timestamp)
            .with_order(order_id);
        account.append(entry);
        Ok(())
    }

    /// Settle a BUY fill: consume the reservation, debit trade value
    /// and fee. Appends RELEASE, BUY and FEE entries.
    pub async fn settle_buy(
        &self,
        user_id: UserId,
        reserved: Decimal,
        value: Decimal,
        fee: Decimal,
        order_id: OrderId,
        trade_id: TradeId,
        timestamp: i64,
    ) -> Result<Wallet, TradingError> {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.check_halted()?;

        account.wallet.unlock(reserved);
        let entry = account
            .entry(LedgerEntryType::Release, reserved, timestamp)
            .with_order(order_id);
        account.append(entry);

        account.wallet.debit(value);
        let entry = account
            .entry(LedgerEntryType::Buy, -value, timestamp)
            .with_order(order_id)
            .with_trade(trade_id);
        account.append(entry);

        account.wallet.debit(fee);
        let entry = account
            .entry(LedgerEntryType::Fee, -fee, timestamp)
            .with_order(order_id)
            .with_trade(trade_id);
        account.append(entry);

        Ok(account.wallet.clone())
    }

    /// Settle a SELL fill: credit trade value, debit fee. Appends SELL
    /// and FEE entries.
    pub async fn settle_sell(
        &self,
        user_id: UserId,
        value: Decimal,
        fee: Decimal,
        order_id: OrderId,
        trade_id: TradeId,
        timestamp: i64,
    ) -> Result<Wallet, TradingError> {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.check_halted()?;

        account.wallet.credit(value);
        let entry = account
            .entry(LedgerEntryType::Sell, value, timestamp)
            .with_order(order_id)
            .with_trade(trade_id);
        account.append(entry);

        account.wallet.debit(fee);
        let entry = account
            .entry(LedgerEntryType::Fee, -fee, timestamp)
            .with_order(order_id)
            .with_trade(trade_id);
        account.append(entry);

        Ok(account.wallet.clone())
    }

    /// Skew the recorded balance without a ledger entry, so the next
    /// audit halts the wallet.
    #[cfg(test)]
    pub(crate) async fn corrupt_balance(&self, user_id: UserId, delta: Decimal) {
        self.account(user_id).lock().await.wallet.balance += delta;
    }

    /// Recompute the balance from the ledger. A mismatch halts the
    /// wallet permanently.
    pub async fn audit(&self, user_id: UserId) -> Result<Decimal, TradingError> {
        let account = self.account(user_id);
        let mut account = account.lock().await;
        account.check_halted()?;

        let computed = balance_sum(&account.entries);
        let recorded = account.wallet.balance;
        if computed != recorded {
            error!(
                user_id = %user_id,
                recorded = %recorded,
                computed = %computed,
                "ledger audit mismatch, wallet halted"
            );
            account.halted = Some((recorded, computed));
            return Err(TradingError::LedgerInconsistency { recorded, computed });
        }
        Ok(recorded)
    }
}
