//! Tick payloads streamed from the market-data feed
//!
//! A tick is one update for a stock symbol or an index. Ticks are
//! immutable once emitted; ordering is feed-arrival order and is only
//! meaningful per symbol, never across symbols.

use crate::ids::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One market-data update for a stock symbol.
///
/// `last_price` is always present (the feed parser drops updates without
/// it); the remaining fields are whatever the provider sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: Symbol,
    pub last_price: Decimal,
    pub last_volume: Option<u64>,
    pub change: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub total_volume: Option<u64>,
    pub high_price: Option<Decimal>,
    pub low_price: Option<Decimal>,
    pub open_price: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub reference_price: Option<Decimal>,
    pub ceiling_price: Option<Decimal>,
    pub floor_price: Option<Decimal>,
    /// Side of the last matched lot ("B"/"S") when the provider reports it
    pub side: Option<String>,
    /// Unix nanoseconds, assigned at arrival
    pub timestamp: i64,
}

impl PriceTick {
    /// Minimal tick carrying only a price; used by tests and the sim feed
    pub fn simple(symbol: impl Into<Symbol>, last_price: Decimal, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            last_volume: None,
            change: None,
            change_percent: None,
            total_volume: None,
            high_price: None,
            low_price: None,
            open_price: None,
            average_price: None,
            reference_price: None,
            ceiling_price: None,
            floor_price: None,
            side: None,
            timestamp,
        }
    }
}

/// One market-data update for an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexTick {
    pub index_id: String,
    pub market_code: String,
    pub exchange: String,
    pub current_index: Option<Decimal>,
    pub open_index: Option<Decimal>,
    pub change: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub volume: Option<u64>,
    pub value: Option<Decimal>,
    pub advances: Option<u64>,
    pub declines: Option<u64>,
    pub unchanged: Option<u64>,
    /// Unix nanoseconds, assigned at arrival
    pub timestamp: i64,
}

/// Broadcast payload published by the stream manager for every inbound tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "lowercase")]
pub enum TickEvent {
    Stock(PriceTick),
    Index(IndexTick),
}

impl TickEvent {
    /// Stock symbol for stock ticks, None for index ticks
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            TickEvent::Stock(t) => Some(&t.symbol),
            TickEvent::Index(_) => None,
        }
    }

    /// Arrival timestamp in Unix nanoseconds
    pub fn timestamp(&self) -> i64 {
        match self {
            TickEvent::Stock(t) => t.timestamp,
            TickEvent::Index(t) => t.timestamp,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, TickEvent::Index(_))
    }
}
