//! Error taxonomy for the trading core
//!
//! All variants except `LedgerInconsistency` are recoverable and are
//! reported to the caller with a specific reason. `LedgerInconsistency`
//! is fatal for the affected wallet: further writes are rejected
//! pending investigation.

use crate::ids::{OrderId, Symbol};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient position in {symbol}: requested {requested}, held {held}")]
    InsufficientPosition {
        symbol: Symbol,
        requested: u64,
        held: u64,
    },

    #[error("Symbol not tradable: {0} (no live or closing price)")]
    SymbolNotTradable(Symbol),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order already filled: {0}")]
    OrderAlreadyFilled(OrderId),

    #[error("Order already cancelled: {0}")]
    OrderAlreadyCancelled(OrderId),

    #[error("Duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    #[error("Ledger inconsistency for wallet: recorded {recorded}, computed {computed}")]
    LedgerInconsistency {
        recorded: Decimal,
        computed: Decimal,
    },
}

impl TradingError {
    /// Fatal errors halt further writes to the affected wallet.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TradingError::LedgerInconsistency { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TradingError::InsufficientFunds {
            required: Decimal::from(7_507_500),
            available: Decimal::from(1_000_000),
        };
        assert!(err.to_string().contains("7507500"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_ledger_inconsistency_is_fatal() {
        let err = TradingError::LedgerInconsistency {
            recorded: Decimal::from(100),
            computed: Decimal::from(99),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn test_symbol_not_tradable_display() {
        let err = TradingError::SymbolNotTradable(Symbol::new("XYZ"));
        assert!(err.to_string().contains("XYZ"));
    }
}
