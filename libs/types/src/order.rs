//! Order lifecycle types
//!
//! Status machine:
//!
//! ```text
//! PENDING --(market: immediate resolution)--> FILLED
//! PENDING --(tick satisfies limit trigger)--> FILLED
//! PENDING --(user cancel, no concurrent fill)--> CANCELLED
//! PENDING --(validation failure at creation)--> REJECTED
//! ```
//!
//! FILLED, CANCELLED and REJECTED are terminal.

use crate::ids::{OrderId, Symbol, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Execute immediately at the oracle price
    Market,
    /// Rest until a tick satisfies the trigger condition
    Limit,
}

/// Validation failure reasons recorded on REJECTED orders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidSymbol,
    InvalidQuantity,
    MissingLimitPrice,
    InvalidLimitPrice,
    InsufficientFunds,
    InsufficientPosition,
    SymbolNotTradable,
    DuplicateClientOrderId,
}

/// Order status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum OrderStatus {
    /// Accepted and awaiting trigger (limit) or settlement (market)
    #[serde(rename = "PENDING")]
    Pending,

    /// Settled against a trade (terminal)
    #[serde(rename = "FILLED")]
    Filled,

    /// Cancelled by the user before any fill (terminal)
    #[serde(rename = "CANCELLED")]
    Cancelled,

    /// Failed validation at creation (terminal)
    #[serde(rename = "REJECTED")]
    Rejected(RejectReason),
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected(_) => "REJECTED",
        }
    }
}

/// Complete order record.
///
/// All fields except `status`, fill metadata and `updated_at` are
/// immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Number of shares; whole lots only
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    /// Caller-supplied key echoed back for idempotent retries
    pub client_order_id: Option<String>,
    /// Oracle price observed at placement
    pub price_snapshot: Decimal,
    /// Funds locked at placement (BUY only)
    pub reserved_amount: Option<Decimal>,
    pub status: OrderStatus,
    // Fill metadata, set exactly once on the PENDING -> FILLED transition
    pub filled_price: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub filled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Create a new pending order
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: u64,
        limit_price: Option<Decimal>,
        client_order_id: Option<String>,
        price_snapshot: Decimal,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            symbol,
            side,
            order_type,
            quantity,
            limit_price,
            client_order_id,
            price_snapshot,
            reserved_amount: None,
            status: OrderStatus::Pending,
            filled_price: None,
            fee: None,
            filled_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Settle the order against a single trade
    ///
    /// # Panics
    /// Panics if the order is already in a terminal state.
    pub fn fill(&mut self, price: Decimal, fee: Decimal, timestamp: i64) {
        assert!(!self.status.is_terminal(), "Cannot fill terminal order");

        self.status = OrderStatus::Filled;
        self.filled_price = Some(price);
        self.fee = Some(fee);
        self.filled_at = Some(timestamp);
        self.updated_at = timestamp;
    }

    /// Cancel the order
    ///
    /// # Panics
    /// Panics if the order is already in a terminal state.
    pub fn cancel(&mut self, timestamp: i64) {
        assert!(!self.status.is_terminal(), "Cannot cancel terminal order");

        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
    }

    /// The price used for conservative fund reservation: the limit price
    /// for LIMIT orders, the placement snapshot for MARKET orders.
    pub fn reference_price(&self) -> Decimal {
        self.limit_price.unwrap_or(self.price_snapshot)
    }
}
