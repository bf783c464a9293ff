//! Last-writer-wins tick cache
//!
//! Stores the most recent tick per symbol and per index, keyed by
//! arrival order (not tick timestamp; out-of-order delivery is
//! accepted as-is). Readers never block writers; callers receive the
//! entry age and a staleness flag and decide their own tolerance.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use types::ids::Symbol;
use types::tick::{IndexTick, PriceTick};

/// A cache read: the tick plus how old it is.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub tick: T,
    /// Nanoseconds since the tick arrived
    pub age_nanos: i64,
    /// True while the feed is degraded; the value may be outdated
    pub stale: bool,
}

struct Entry<T> {
    tick: T,
    received_at: i64,
}

/// Shared tick cache. Marked stale as a whole while the feed is
/// degraded; entries are retained so consumers can fall back to the
/// last known value.
pub struct TickCache {
    prices: DashMap<Symbol, Entry<PriceTick>>,
    indices: DashMap<String, Entry<IndexTick>>,
    stale: AtomicBool,
}

impl TickCache {
    pub fn new() -> Self {
        Self {
            prices: DashMap::new(),
            indices: DashMap::new(),
            // No feed connected yet
            stale: AtomicBool::new(true),
        }
    }

    /// Store a stock tick, replacing any previous entry for the symbol.
    pub fn insert_price(&self, tick: PriceTick, received_at: i64) {
        self.prices
            .insert(tick.symbol.clone(), Entry { tick, received_at });
    }

    /// Store an index tick, replacing any previous entry for the index.
    pub fn insert_index(&self, tick: IndexTick, received_at: i64) {
        self.indices
            .insert(tick.index_id.clone(), Entry { tick, received_at });
    }

    /// Most recent tick for a symbol plus its age.
    pub fn price(&self, symbol: &Symbol, now: i64) -> Option<CacheHit<PriceTick>> {
        self.prices.get(symbol).map(|e| CacheHit {
            tick: e.tick.clone(),
            age_nanos: now - e.received_at,
            stale: self.is_stale(),
        })
    }

    /// Most recent tick for an index plus its age.
    pub fn index(&self, index_id: &str, now: i64) -> Option<CacheHit<IndexTick>> {
        self.indices.get(index_id).map(|e| CacheHit {
            tick: e.tick.clone(),
            age_nanos: now - e.received_at,
            stale: self.is_stale(),
        })
    }

    /// Evict a symbol (on unsubscribe).
    pub fn remove_price(&self, symbol: &Symbol) {
        self.prices.remove(symbol);
    }

    /// Snapshot of cached stock ticks, optionally filtered to a symbol set.
    pub fn price_snapshot(&self, filter: Option<&BTreeSet<Symbol>>) -> BTreeMap<String, PriceTick> {
        self.prices
            .iter()
            .filter(|e| filter.map_or(true, |set| set.contains(e.key())))
            .map(|e| (e.key().as_str().to_string(), e.value().tick.clone()))
            .collect()
    }

    /// Snapshot of all cached index ticks.
    pub fn index_snapshot(&self) -> BTreeMap<String, IndexTick> {
        self.indices
            .iter()
            .map(|e| (e.key().clone(), e.value().tick.clone()))
            .collect()
    }

    /// Mark the whole cache stale (feed degraded) or fresh.
    pub fn mark_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn price_count(&self) -> usize {
        self.prices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

impl Default for TickCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tick(symbol: &str, price: i64, ts: i64) -> PriceTick {
        PriceTick::simple(symbol, Decimal::from(price), ts)
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = TickCache::new();
        let sym = Symbol::new("VNM");

        // Second arrival wins even with an older tick timestamp
        cache.insert_price(tick("VNM", 75_000, 200), 1_000);
        cache.insert_price(tick("VNM", 74_500, 100), 2_000);

        let hit = cache.price(&sym, 3_000).unwrap();
        assert_eq!(hit.tick.last_price, Decimal::from(74_500));
        assert_eq!(hit.age_nanos, 1_000);
    }

    #[test]
    fn test_staleness_flag() {
        let cache = TickCache::new();
        assert!(cache.is_stale());

        cache.insert_price(tick("FPT", 120_000, 1), 1);
        cache.mark_stale(false);
        assert!(!cache.price(&Symbol::new("FPT"), 2).unwrap().stale);

        cache.mark_stale(true);
        // Entry retained, but flagged
        let hit = cache.price(&Symbol::new("FPT"), 2).unwrap();
        assert!(hit.stale);
    }

    #[test]
    fn test_remove_price() {
        let cache = TickCache::new();
        cache.insert_price(tick("HPG", 28_000, 1), 1);
        assert_eq!(cache.price_count(), 1);

        cache.remove_price(&Symbol::new("HPG"));
        assert!(cache.price(&Symbol::new("HPG"), 2).is_none());
    }

    #[test]
    fn test_filtered_snapshot() {
        let cache = TickCache::new();
        cache.insert_price(tick("VNM", 75_000, 1), 1);
        cache.insert_price(tick("FPT", 120_000, 1), 1);

        let mut filter = BTreeSet::new();
        filter.insert(Symbol::new("VNM"));

        let snap = cache.price_snapshot(Some(&filter));
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key("VNM"));

        let all = cache.price_snapshot(None);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = TickCache::new();
        assert!(cache.price(&Symbol::new("NVL"), 1).is_none());
        assert!(cache.index("VNINDEX", 1).is_none());
    }
}
