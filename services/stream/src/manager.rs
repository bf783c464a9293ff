//! Feed lifecycle supervisor
//!
//! One manager owns one upstream connection at a time. A background
//! supervisor task drives the connect / serve / degrade / retry cycle:
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──ok──▶ Connected
//!       ▲                         ▲                  │ feed drop
//!       │ disconnect()            └───backoff────  Degraded
//!       └──────────────────────────────────────────────┘
//! ```
//!
//! On every (re)connect the tracked symbol set is resubscribed BEFORE
//! the event loop starts, so no tick for a tracked symbol is lost to a
//! subscription gap. While degraded the cache stays readable but is
//! flagged stale.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use types::clock::{unix_nanos_now, NANOS_PER_SEC};
use types::ids::Symbol;
use types::market::Market;
use types::tick::TickEvent;

use crate::backoff::Backoff;
use crate::cache::TickCache;
use crate::feed::FeedFactory;

/// Feed connection state as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    /// Connection lost; retrying with backoff, cache serves stale data
    Degraded,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedState::Disconnected => "disconnected",
            FeedState::Connecting => "connecting",
            FeedState::Connected => "connected",
            FeedState::Degraded => "degraded",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Capacity of the tick broadcast channel
    pub event_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            event_capacity: 4096,
        }
    }
}

/// Point-in-time view of the manager, served on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub state: FeedState,
    pub market: Option<Market>,
    /// Unix nanoseconds of the last successful connect
    pub connected_at: Option<i64>,
    /// Whole seconds since the last successful connect
    pub uptime_secs: Option<i64>,
    pub tracked_symbols: Vec<String>,
    pub message_count: u64,
    pub reconnect_count: u64,
    /// Unix nanoseconds of the most recent feed event, if any arrived
    pub last_event_at: Option<i64>,
    pub cached_prices: usize,
    pub cached_indices: usize,
    pub stale: bool,
}

#[derive(Default)]
struct StreamStats {
    message_count: AtomicU64,
    reconnect_count: AtomicU64,
    last_event_at: AtomicI64,
}

struct Lifecycle {
    state: FeedState,
    market: Option<Market>,
    connected_at: Option<i64>,
    supervisor: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
    sub_tx: Option<mpsc::UnboundedSender<Vec<Symbol>>>,
}

enum SessionEnd {
    Dropped,
    Shutdown,
}

/// Owns the feed connection, the tick cache and the broadcast channel.
pub struct StreamManager {
    config: StreamConfig,
    factory: Arc<dyn FeedFactory>,
    cache: Arc<TickCache>,
    tick_tx: broadcast::Sender<TickEvent>,
    tracked: StdMutex<BTreeSet<Symbol>>,
    lifecycle: StdMutex<Lifecycle>,
    stats: StreamStats,
}

impl StreamManager {
    pub fn new(factory: Arc<dyn FeedFactory>, config: StreamConfig) -> Arc<Self> {
        let (tick_tx, _) = broadcast::channel(config.event_capacity);
        Arc::new(Self {
            config,
            factory,
            cache: Arc::new(TickCache::new()),
            tick_tx,
            tracked: StdMutex::new(BTreeSet::new()),
            lifecycle: StdMutex::new(Lifecycle {
                state: FeedState::Disconnected,
                market: None,
                connected_at: None,
                supervisor: None,
                shutdown: None,
                sub_tx: None,
            }),
            stats: StreamStats::default(),
        })
    }

    pub fn cache(&self) -> Arc<TickCache> {
        self.cache.clone()
    }

    /// New receiver on the tick broadcast channel.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<TickEvent> {
        self.tick_tx.subscribe()
    }

    /// Start the supervisor for a market. Idempotent: a second call
    /// while not disconnected returns the current status unchanged.
    pub fn connect(self: &Arc<Self>, market: Market) -> StreamStatus {
        {
            let mut lc = self.lifecycle.lock().unwrap();
            if lc.state != FeedState::Disconnected {
                debug!(market = %market, state = %lc.state, "connect ignored, already active");
                drop(lc);
                return self.status();
            }

            lc.state = FeedState::Connecting;
            lc.market = Some(market);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let (sub_tx, sub_rx) = mpsc::unbounded_channel();
            lc.shutdown = Some(shutdown_tx);
            lc.sub_tx = Some(sub_tx);

            let mgr = self.clone();
            lc.supervisor = Some(tokio::spawn(async move {
                mgr.supervise(market, shutdown_rx, sub_rx).await;
            }));
        }

        info!(market = %market, "feed supervisor started");
        self.status()
    }

    /// Stop the supervisor and drop the connection. The cache is kept
    /// but marked stale.
    pub async fn disconnect(&self) {
        let handle = {
            let mut lc = self.lifecycle.lock().unwrap();
            if let Some(tx) = lc.shutdown.take() {
                let _ = tx.send(true);
            }
            lc.sub_tx = None;
            lc.state = FeedState::Disconnected;
            lc.market = None;
            lc.connected_at = None;
            lc.supervisor.take()
        };

        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.cache.mark_stale(true);
        info!("feed disconnected");
    }

    /// Add symbols to the tracked set; the delta is forwarded upstream
    /// if a session is live. Returns the symbols actually added.
    pub fn track(&self, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut added = Vec::new();
        {
            let mut tracked = self.tracked.lock().unwrap();
            for symbol in symbols {
                if symbol.is_valid() && tracked.insert(symbol.clone()) {
                    added.push(symbol.clone());
                }
            }
        }

        if !added.is_empty() {
            let lc = self.lifecycle.lock().unwrap();
            if let Some(tx) = &lc.sub_tx {
                let _ = tx.send(added.clone());
            }
        }
        added
    }

    /// Remove symbols from the tracked set and evict their cache
    /// entries. Returns the symbols actually removed.
    pub fn untrack(&self, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut removed = Vec::new();
        {
            let mut tracked = self.tracked.lock().unwrap();
            for symbol in symbols {
                if tracked.remove(symbol) {
                    removed.push(symbol.clone());
                }
            }
        }
        for symbol in &removed {
            self.cache.remove_price(symbol);
        }
        removed
    }

    pub fn tracked_symbols(&self) -> Vec<Symbol> {
        self.tracked.lock().unwrap().iter().cloned().collect()
    }

    pub fn status(&self) -> StreamStatus {
        let (state, market, connected_at) = {
            let lc = self.lifecycle.lock().unwrap();
            (lc.state, lc.market, lc.connected_at)
        };
        let now = unix_nanos_now();
        let last_event_at = match self.stats.last_event_at.load(Ordering::Relaxed) {
            0 => None,
            at => Some(at),
        };
        StreamStatus {
            state,
            market,
            connected_at,
            uptime_secs: connected_at.map(|at| (now - at) / NANOS_PER_SEC),
            tracked_symbols: self
                .tracked
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            message_count: self.stats.message_count.load(Ordering::Relaxed),
            reconnect_count: self.stats.reconnect_count.load(Ordering::Relaxed),
            last_event_at,
            cached_prices: self.cache.price_count(),
            cached_indices: self.cache.index_count(),
            stale: self.cache.is_stale(),
        }
    }

    // -- supervisor -------------------------------------------------------

    async fn supervise(
        self: Arc<Self>,
        market: Market,
        mut shutdown: watch::Receiver<bool>,
        mut sub_rx: mpsc::UnboundedReceiver<Vec<Symbol>>,
    ) {
        let adapter = self.factory.adapter(market);
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_max);

        loop {
            self.set_state(FeedState::Connecting);

            match adapter.connect().await {
                Ok(mut session) => {
                    // Resubscribe the full tracked set before serving
                    // events, so a reconnect cannot miss tracked ticks.
                    let tracked = self.tracked_symbols();
                    let resub_ok = if tracked.is_empty() {
                        true
                    } else {
                        match session.subscribe(&tracked).await {
                            Ok(()) => true,
                            Err(err) => {
                                warn!(market = %market, error = %err, "resubscription failed");
                                false
                            }
                        }
                    };

                    if resub_ok {
                        // Deltas queued while offline are covered by the
                        // snapshot above
                        while sub_rx.try_recv().is_ok() {}

                        self.on_connected(market);
                        backoff.reset();

                        match self
                            .run_session(market, &mut *session, &mut shutdown, &mut sub_rx)
                            .await
                        {
                            SessionEnd::Shutdown => return,
                            SessionEnd::Dropped => {}
                        }
                    }
                }
                Err(err) => {
                    warn!(market = %market, error = %err, "feed connect failed");
                }
            }

            // Degraded: keep serving the cache, flagged stale, and retry
            self.cache.mark_stale(true);
            self.set_state(FeedState::Degraded);
            self.stats.reconnect_count.fetch_add(1, Ordering::Relaxed);

            let delay = backoff.next_delay();
            debug!(market = %market, delay_ms = delay.as_millis() as u64, "feed retry scheduled");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }
            if *shutdown.borrow() {
                return;
            }
        }
    }

    async fn run_session(
        &self,
        market: Market,
        session: &mut dyn crate::feed::FeedSession,
        shutdown: &mut watch::Receiver<bool>,
        sub_rx: &mut mpsc::UnboundedReceiver<Vec<Symbol>>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                event = session.next_event() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!(market = %market, "feed connection dropped");
                        return SessionEnd::Dropped;
                    }
                },
                Some(delta) = sub_rx.recv() => {
                    if let Err(err) = session.subscribe(&delta).await {
                        warn!(market = %market, error = %err, "subscribe delta failed");
                        return SessionEnd::Dropped;
                    }
                }
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            }
        }
    }

    fn handle_event(&self, event: TickEvent) {
        let now = unix_nanos_now();
        match &event {
            TickEvent::Stock(tick) => self.cache.insert_price(tick.clone(), now),
            TickEvent::Index(tick) => self.cache.insert_index(tick.clone(), now),
        }
        self.stats.message_count.fetch_add(1, Ordering::Relaxed);
        self.stats.last_event_at.store(now, Ordering::Relaxed);

        // No receivers is fine; the cache already has the tick
        let _ = self.tick_tx.send(event);
    }

    fn set_state(&self, state: FeedState) {
        let mut lc = self.lifecycle.lock().unwrap();
        // disconnect() wins over supervisor transitions
        if lc.state != FeedState::Disconnected {
            lc.state = state;
        }
    }

    fn on_connected(&self, market: Market) {
        {
            let mut lc = self.lifecycle.lock().unwrap();
            if lc.state == FeedState::Disconnected {
                return;
            }
            lc.state = FeedState::Connected;
            lc.connected_at = Some(unix_nanos_now());
        }
        self.cache.mark_stale(false);
        info!(market = %market, "feed connected");
    }
}
