//! Feed adapter abstraction and provider payload parsing
//!
//! A `FeedAdapter` opens a connection to one upstream market-data
//! source (one adapter per market board); a `FeedSession` is a live
//! connection yielding ticks until it closes. The manager owns the
//! reconnect loop, so adapters only model a single connection attempt.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use types::clock::unix_nanos_now;
use types::ids::Symbol;
use types::market::{index_code, Market};
use types::tick::{IndexTick, PriceTick, TickEvent};

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("feed connection failed: {0}")]
    Connection(String),

    #[error("feed subscribe failed: {0}")]
    Subscribe(String),
}

/// Provider-specific client for one market board.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    fn market(&self) -> Market;

    /// Open a connection. Returns a live session on success; the
    /// caller handles retry scheduling.
    async fn connect(&self) -> Result<Box<dyn FeedSession>, FeedError>;
}

/// One live feed connection.
#[async_trait]
pub trait FeedSession: Send {
    /// Forward a subscription delta upstream.
    async fn subscribe(&mut self, symbols: &[Symbol]) -> Result<(), FeedError>;

    /// Next tick from the feed; `None` means the connection closed.
    async fn next_event(&mut self) -> Option<TickEvent>;
}

/// Selects the adapter implementation for a market at connect time.
pub trait FeedFactory: Send + Sync {
    fn adapter(&self, market: Market) -> Arc<dyn FeedAdapter>;
}

// ---------------------------------------------------------------------------
// Provider payload parsing
// ---------------------------------------------------------------------------

fn dec_field(v: &Value, key: &str) -> Option<Decimal> {
    match v.get(key)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

fn u64_field(v: &Value, key: &str) -> Option<u64> {
    match v.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse::<f64>().ok().map(|f| f as u64),
        _ => None,
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a raw provider stock payload into a `PriceTick`.
///
/// The provider nests the interesting object under `data` and uses
/// short field names (`sym`, `lv`, `hp`, `lp`, `ap`, `r`, `c`, `f`).
/// Updates without a symbol or last price are dropped.
pub fn parse_stock_payload(raw: &Value, received_at: i64) -> Option<PriceTick> {
    let data = raw.get("data").unwrap_or(raw);

    let symbol = str_field(data, "sym").or_else(|| str_field(data, "symbol"))?;
    let last_price = dec_field(data, "lastPrice")?;

    Some(PriceTick {
        symbol: Symbol::new(symbol),
        last_price,
        last_volume: u64_field(data, "lastVol").or_else(|| u64_field(data, "lv")),
        change: dec_field(data, "change"),
        change_percent: dec_field(data, "changePc"),
        total_volume: u64_field(data, "totalVol"),
        high_price: dec_field(data, "hp"),
        low_price: dec_field(data, "lp"),
        open_price: dec_field(data, "openPrice"),
        average_price: dec_field(data, "ap"),
        reference_price: dec_field(data, "r"),
        ceiling_price: dec_field(data, "c"),
        floor_price: dec_field(data, "f"),
        side: str_field(data, "side"),
        timestamp: received_at,
    })
}

/// Parse a raw provider index payload into an `IndexTick`.
///
/// The `ot` field packs "change|percent|value|advances|declines|
/// unchanged"; unknown market codes pass through with the raw code as
/// the index id.
pub fn parse_index_payload(raw: &Value, received_at: i64) -> Option<IndexTick> {
    let data = raw.get("data").unwrap_or(raw);

    let mc = str_field(data, "mc")?;
    let (index_id, exchange) = match index_code(&mc) {
        Some((name, market)) => (name.to_string(), market.as_str().to_string()),
        None => (mc.clone(), "UNKNOWN".to_string()),
    };

    let mut tick = IndexTick {
        index_id,
        market_code: mc,
        exchange,
        current_index: dec_field(data, "cIndex"),
        open_index: dec_field(data, "oIndex"),
        change: None,
        percent_change: None,
        volume: u64_field(data, "vol"),
        value: dec_field(data, "value"),
        advances: None,
        declines: None,
        unchanged: None,
        timestamp: received_at,
    };

    if let Some(ot) = str_field(data, "ot") {
        let parts: Vec<&str> = ot.split('|').collect();
        if parts.len() >= 6 {
            tick.change = parts[0].parse().ok();
            tick.percent_change = parts[1].trim_end_matches('%').parse().ok();
            tick.advances = parts[3].parse().ok();
            tick.declines = parts[4].parse().ok();
            tick.unchanged = parts[5].parse().ok();
        }
    }

    Some(tick)
}

// ---------------------------------------------------------------------------
// Scripted adapter (tests, demos)
// ---------------------------------------------------------------------------

/// Directive pushed into a [`ScriptedFeed`] by the driving test.
#[derive(Debug, Clone)]
pub enum FeedDirective {
    /// Deliver a tick on the current session.
    Tick(TickEvent),
    /// Close the current session (simulated feed drop).
    Drop,
}

/// Hand-driven adapter: the test pushes directives through a channel
/// and records every subscribe call for assertion.
pub struct ScriptedFeed {
    market: Market,
    directives: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<FeedDirective>>>,
    subscribe_log: Arc<Mutex<Vec<Vec<Symbol>>>>,
    fail_next_connect: Arc<AtomicBool>,
    fail_all_connects: Arc<AtomicBool>,
}

/// Test-side handle controlling a [`ScriptedFeed`].
#[derive(Clone)]
pub struct ScriptedControl {
    tx: mpsc::UnboundedSender<FeedDirective>,
    subscribe_log: Arc<Mutex<Vec<Vec<Symbol>>>>,
    fail_next_connect: Arc<AtomicBool>,
    fail_all_connects: Arc<AtomicBool>,
}

impl ScriptedControl {
    pub fn tick(&self, event: TickEvent) {
        let _ = self.tx.send(FeedDirective::Tick(event));
    }

    /// Close the current session; the manager should degrade and retry.
    pub fn drop_connection(&self) {
        let _ = self.tx.send(FeedDirective::Drop);
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Make every connect attempt fail until cleared.
    pub fn set_connect_failing(&self, failing: bool) {
        self.fail_all_connects.store(failing, Ordering::SeqCst);
    }

    /// All subscribe calls seen so far, in order.
    pub fn subscribe_calls(&self) -> Vec<Vec<Symbol>> {
        self.subscribe_log.lock().unwrap().clone()
    }
}

impl ScriptedFeed {
    pub fn new(market: Market) -> (Self, ScriptedControl) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscribe_log = Arc::new(Mutex::new(Vec::new()));
        let fail_next_connect = Arc::new(AtomicBool::new(false));
        let fail_all_connects = Arc::new(AtomicBool::new(false));
        (
            Self {
                market,
                directives: Arc::new(tokio::sync::Mutex::new(rx)),
                subscribe_log: subscribe_log.clone(),
                fail_next_connect: fail_next_connect.clone(),
                fail_all_connects: fail_all_connects.clone(),
            },
            ScriptedControl {
                tx,
                subscribe_log,
                fail_next_connect,
                fail_all_connects,
            },
        )
    }
}

#[async_trait]
impl FeedAdapter for ScriptedFeed {
    fn market(&self) -> Market {
        self.market
    }

    async fn connect(&self) -> Result<Box<dyn FeedSession>, FeedError> {
        if self.fail_all_connects.load(Ordering::SeqCst)
            || self.fail_next_connect.swap(false, Ordering::SeqCst)
        {
            return Err(FeedError::Connection("scripted failure".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            directives: self.directives.clone(),
            subscribe_log: self.subscribe_log.clone(),
        }))
    }
}

struct ScriptedSession {
    directives: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<FeedDirective>>>,
    subscribe_log: Arc<Mutex<Vec<Vec<Symbol>>>>,
}

#[async_trait]
impl FeedSession for ScriptedSession {
    async fn subscribe(&mut self, symbols: &[Symbol]) -> Result<(), FeedError> {
        self.subscribe_log.lock().unwrap().push(symbols.to_vec());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TickEvent> {
        let mut rx = self.directives.lock().await;
        match rx.recv().await {
            Some(FeedDirective::Tick(event)) => Some(event),
            Some(FeedDirective::Drop) | None => None,
        }
    }
}

/// Factory returning the same scripted adapter for every market.
pub struct ScriptedFactory {
    adapter: Arc<ScriptedFeed>,
}

impl ScriptedFactory {
    pub fn new(adapter: ScriptedFeed) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }
}

impl FeedFactory for ScriptedFactory {
    fn adapter(&self, _market: Market) -> Arc<dyn FeedAdapter> {
        self.adapter.clone()
    }
}

// ---------------------------------------------------------------------------
// Deterministic sim adapter (standalone gateway runs)
// ---------------------------------------------------------------------------

/// Random-walk tick generator with a fixed seed; no network, never
/// disconnects. Lets the gateway run end-to-end without a provider.
pub struct SimFeed {
    market: Market,
    symbols: Vec<(Symbol, Decimal)>,
    tick_interval: Duration,
}

impl SimFeed {
    pub fn new(market: Market, symbols: Vec<(Symbol, Decimal)>, tick_interval: Duration) -> Self {
        Self {
            market,
            symbols,
            tick_interval,
        }
    }
}

#[async_trait]
impl FeedAdapter for SimFeed {
    fn market(&self) -> Market {
        self.market
    }

    async fn connect(&self) -> Result<Box<dyn FeedSession>, FeedError> {
        Ok(Box::new(SimSession {
            prices: VecDeque::from(self.symbols.clone()),
            tick_interval: self.tick_interval,
            // Any odd seed works for the LCG
            rng_state: 0x2545F491,
        }))
    }
}

struct SimSession {
    prices: VecDeque<(Symbol, Decimal)>,
    tick_interval: Duration,
    rng_state: u64,
}

impl SimSession {
    /// Minimal LCG; deterministic and dependency-free.
    fn next_rand(&mut self) -> u64 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.rng_state >> 33
    }
}

#[async_trait]
impl FeedSession for SimSession {
    async fn subscribe(&mut self, _symbols: &[Symbol]) -> Result<(), FeedError> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TickEvent> {
        tokio::time::sleep(self.tick_interval).await;

        let (symbol, price) = self.prices.pop_front()?;
        // Walk ±0.5% in price steps of 100 VND
        let step = Decimal::from(100u64);
        let max_steps = (price * Decimal::new(5, 3) / step).trunc();
        let span = (Decimal::from(self.next_rand() % 200) / Decimal::from(100u64)
            - Decimal::ONE)
            * max_steps;
        let next_price = (price + span.trunc() * step).max(step);

        self.prices.push_back((symbol.clone(), next_price));
        Some(TickEvent::Stock(PriceTick::simple(
            symbol,
            next_price,
            unix_nanos_now(),
        )))
    }
}

/// Factory producing one sim adapter per market.
pub struct SimFactory {
    symbols: Vec<(Symbol, Decimal)>,
    tick_interval: Duration,
}

impl SimFactory {
    pub fn new(symbols: Vec<(Symbol, Decimal)>, tick_interval: Duration) -> Self {
        Self {
            symbols,
            tick_interval,
        }
    }
}

impl FeedFactory for SimFactory {
    fn adapter(&self, market: Market) -> Arc<dyn FeedAdapter> {
        Arc::new(SimFeed::new(
            market,
            self.symbols.clone(),
            self.tick_interval,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_stock_payload() {
        let raw = json!({
            "data": {
                "sym": "vnm",
                "lastPrice": 75000,
                "lv": 500,
                "change": -200,
                "changePc": "-0.27",
                "totalVol": 1200000,
                "hp": 75500,
                "lp": 74800,
                "openPrice": 75200,
                "ap": "75100.5",
                "r": 75200,
                "c": 80400,
                "f": 70000,
                "side": "B"
            }
        });

        let tick = parse_stock_payload(&raw, 1_000).unwrap();
        assert_eq!(tick.symbol.as_str(), "VNM");
        assert_eq!(tick.last_price, Decimal::from(75_000));
        assert_eq!(tick.last_volume, Some(500));
        assert_eq!(tick.average_price, Some("75100.5".parse().unwrap()));
        assert_eq!(tick.side.as_deref(), Some("B"));
        assert_eq!(tick.timestamp, 1_000);
    }

    #[test]
    fn test_parse_stock_payload_flat() {
        // Some providers omit the `data` wrapper
        let raw = json!({"symbol": "FPT", "lastPrice": "120000"});
        let tick = parse_stock_payload(&raw, 1).unwrap();
        assert_eq!(tick.symbol.as_str(), "FPT");
        assert_eq!(tick.last_price, Decimal::from(120_000));
    }

    #[test]
    fn test_parse_stock_payload_missing_price() {
        let raw = json!({"data": {"sym": "VNM"}});
        assert!(parse_stock_payload(&raw, 1).is_none());
    }

    #[test]
    fn test_parse_index_payload_with_ot() {
        let raw = json!({
            "data": {
                "mc": "10",
                "cIndex": 1254.3,
                "oIndex": 1250.1,
                "vol": 550000000u64,
                "value": 12500.5,
                "ot": "4.2|0.34%|12500.5|210|95|60"
            }
        });

        let tick = parse_index_payload(&raw, 2_000).unwrap();
        assert_eq!(tick.index_id, "VNINDEX");
        assert_eq!(tick.exchange, "HOSE");
        assert_eq!(tick.change, Some("4.2".parse().unwrap()));
        assert_eq!(tick.percent_change, Some("0.34".parse().unwrap()));
        assert_eq!(tick.advances, Some(210));
        assert_eq!(tick.declines, Some(95));
        assert_eq!(tick.unchanged, Some(60));
    }

    #[test]
    fn test_parse_index_payload_unknown_code() {
        let raw = json!({"data": {"mc": "77", "cIndex": 900.0}});
        let tick = parse_index_payload(&raw, 1).unwrap();
        assert_eq!(tick.index_id, "77");
        assert_eq!(tick.exchange, "UNKNOWN");
    }

    #[tokio::test]
    async fn test_scripted_feed_delivers_and_drops() {
        let (feed, control) = ScriptedFeed::new(Market::Hose);
        let mut session = feed.connect().await.unwrap();

        session.subscribe(&[Symbol::new("VNM")]).await.unwrap();
        assert_eq!(control.subscribe_calls().len(), 1);

        control.tick(TickEvent::Stock(PriceTick::simple(
            "VNM",
            Decimal::from(75_000),
            1,
        )));
        let event = session.next_event().await.unwrap();
        assert_eq!(event.symbol().unwrap().as_str(), "VNM");

        control.drop_connection();
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_sim_feed_walks() {
        let feed = SimFeed::new(
            Market::Hose,
            vec![(Symbol::new("VNM"), Decimal::from(75_000))],
            Duration::from_millis(1),
        );
        let mut session = feed.connect().await.unwrap();

        for _ in 0..5 {
            let event = session.next_event().await.unwrap();
            match event {
                TickEvent::Stock(t) => {
                    assert_eq!(t.symbol.as_str(), "VNM");
                    assert!(t.last_price > Decimal::ZERO);
                }
                TickEvent::Index(_) => panic!("sim feed emits stock ticks only"),
            }
        }
    }
}
