//! Pricing oracle: execution price resolution
//!
//! During a trading session the oracle serves the live cached tick;
//! outside session hours, or when no tick is cached, it falls back to
//! the closing price. A symbol with neither is not tradable. Feed
//! degradation degrades freshness, never availability, as long as a
//! closing price exists.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;

use price_stream::cache::TickCache;
use types::clock::NANOS_PER_SEC;
use types::errors::TradingError;
use types::ids::Symbol;

const SECS_PER_DAY: i64 = 86_400;

/// Daily session windows in local seconds-since-midnight.
#[derive(Debug, Clone)]
pub struct SessionWindows {
    windows: Vec<(i64, i64)>,
    utc_offset_secs: i64,
}

impl SessionWindows {
    /// HOSE/HNX/UPCOM hours: 09:00-11:30 and 13:00-14:45, UTC+7.
    pub fn vietnam() -> Self {
        Self {
            windows: vec![
                (9 * 3600, 11 * 3600 + 30 * 60),
                (13 * 3600, 14 * 3600 + 45 * 60),
            ],
            utc_offset_secs: 7 * 3600,
        }
    }

    /// Every instant is in-session; used by tests and the demo.
    pub fn always_open() -> Self {
        Self {
            windows: vec![(0, SECS_PER_DAY)],
            utc_offset_secs: 0,
        }
    }

    /// Never in-session; forces the closing-price path in tests.
    pub fn always_closed() -> Self {
        Self {
            windows: Vec::new(),
            utc_offset_secs: 0,
        }
    }

    pub fn is_open(&self, at_nanos: i64) -> bool {
        let local = (at_nanos / NANOS_PER_SEC + self.utc_offset_secs).rem_euclid(SECS_PER_DAY);
        self.windows
            .iter()
            .any(|(start, end)| local >= *start && local <= *end)
    }
}

/// Where a resolved price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Live,
    Closing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    pub price: Decimal,
    pub source: PriceSource,
    /// Set when the price came from a degraded (stale) cache
    pub stale: bool,
}

/// Previous-session closing prices; an external collaborator in
/// production, a seeded map in tests and the demo.
#[async_trait]
pub trait ClosingPriceSource: Send + Sync {
    async fn closing_price(&self, symbol: &Symbol) -> Option<Decimal>;
}

/// In-memory closing price table.
#[derive(Default)]
pub struct StaticClosingPrices {
    prices: DashMap<Symbol, Decimal>,
}

impl StaticClosingPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, symbol: Symbol, price: Decimal) {
        self.prices.insert(symbol, price);
    }
}

#[async_trait]
impl ClosingPriceSource for StaticClosingPrices {
    async fn closing_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.get(symbol).map(|entry| *entry.value())
    }
}

pub struct PricingOracle {
    cache: Arc<TickCache>,
    windows: SessionWindows,
    closing: Arc<dyn ClosingPriceSource>,
}

impl PricingOracle {
    pub fn new(
        cache: Arc<TickCache>,
        windows: SessionWindows,
        closing: Arc<dyn ClosingPriceSource>,
    ) -> Self {
        Self {
            cache,
            windows,
            closing,
        }
    }

    /// Execution price for a symbol at an instant.
    pub async fn resolve(&self, symbol: &Symbol, at: i64) -> Result<ResolvedPrice, TradingError> {
        if self.windows.is_open(at) {
            if let Some(hit) = self.cache.price(symbol, at) {
                return Ok(ResolvedPrice {
                    price: hit.tick.last_price,
                    source: PriceSource::Live,
                    stale: hit.stale,
                });
            }
        }

        if let Some(price) = self.closing.closing_price(symbol).await {
            return Ok(ResolvedPrice {
                price,
                source: PriceSource::Closing,
                stale: false,
            });
        }

        Err(TradingError::SymbolNotTradable(symbol.clone()))
    }
}
