//! Connection registry and tick fan-out
//!
//! Tracks every live WebSocket client with its interest set and a
//! bounded outbound queue. Fan-out never blocks on a slow client: a
//! full queue drops the message for that client only, a closed queue
//! removes the session.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use types::ids::Symbol;
use types::tick::TickEvent;

use crate::cache::TickCache;
use crate::manager::StreamManager;
use crate::protocol::{ClientCommand, StreamMessage};

pub type ClientId = u64;

/// What a client wants to receive. Index ticks always match.
#[derive(Debug, Clone)]
pub enum Interest {
    All,
    Symbols(BTreeSet<Symbol>),
}

impl Interest {
    fn matches(&self, event: &TickEvent) -> bool {
        if event.is_index() {
            return true;
        }
        match self {
            Interest::All => true,
            Interest::Symbols(set) => event.symbol().map_or(false, |s| set.contains(s)),
        }
    }

    fn add(&mut self, symbols: &[Symbol]) {
        if let Interest::Symbols(set) = self {
            set.extend(symbols.iter().cloned());
        }
    }

    /// Drop symbols from the interest set; returns the ones that were
    /// actually present.
    fn remove(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut removed = Vec::new();
        if let Interest::Symbols(set) = self {
            for symbol in symbols {
                if set.remove(symbol) {
                    removed.push(symbol.clone());
                }
            }
        }
        removed
    }

    fn symbol_set(&self) -> Option<BTreeSet<Symbol>> {
        match self {
            Interest::All => None,
            Interest::Symbols(set) => Some(set.clone()),
        }
    }
}

struct Session {
    interest: Interest,
    tx: mpsc::Sender<StreamMessage>,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Outbound queue depth per client
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Live client sessions keyed by a process-local id.
pub struct ConnectionRegistry {
    config: RegistryConfig,
    sessions: DashMap<ClientId, Session>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client; the returned receiver is the client's
    /// outbound message queue.
    pub fn register(&self, interest: Interest) -> (ClientId, mpsc::Receiver<StreamMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        self.sessions.insert(id, Session { interest, tx });
        debug!(client_id = id, total = self.sessions.len(), "client registered");
        (id, rx)
    }

    pub fn unregister(&self, id: ClientId) {
        if self.sessions.remove(&id).is_some() {
            debug!(client_id = id, total = self.sessions.len(), "client unregistered");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Queue a message for one client (command replies). Dropped if
    /// the queue is full, like any other outbound message.
    pub fn send_to(&self, id: ClientId, message: StreamMessage) {
        if let Some(session) = self.sessions.get(&id) {
            if let Err(mpsc::error::TrySendError::Full(_)) = session.tx.try_send(message) {
                warn!(client_id = id, "client queue full, reply dropped");
            }
        }
    }

    /// Deliver a tick to every interested client.
    pub fn fan_out(&self, event: &TickEvent) {
        let message = match event {
            TickEvent::Stock(tick) => StreamMessage::Price { data: tick.clone() },
            TickEvent::Index(tick) => StreamMessage::Index { data: tick.clone() },
        };

        let mut closed = Vec::new();
        for entry in self.sessions.iter() {
            if !entry.value().interest.matches(event) {
                continue;
            }
            match entry.value().tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow client loses this tick; the stream must not stall
                    warn!(client_id = entry.key(), "client queue full, tick dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*entry.key());
                }
            }
        }
        for id in closed {
            self.unregister(id);
        }
    }

    /// Apply a client command and produce its reply. Subscription
    /// changes are mirrored to the manager's tracked set.
    pub fn handle_command(
        &self,
        id: ClientId,
        command: ClientCommand,
        manager: &StreamManager,
        cache: &TickCache,
    ) -> StreamMessage {
        match command {
            ClientCommand::Subscribe { symbols } => {
                let symbols: Vec<Symbol> = symbols
                    .iter()
                    .map(Symbol::new)
                    .filter(Symbol::is_valid)
                    .collect();
                if symbols.is_empty() {
                    return StreamMessage::Error {
                        message: "no valid symbols in subscribe".to_string(),
                    };
                }
                if let Some(mut session) = self.sessions.get_mut(&id) {
                    session.interest.add(&symbols);
                }
                manager.track(&symbols);
                StreamMessage::Subscribed {
                    symbols: symbols.iter().map(|s| s.as_str().to_string()).collect(),
                }
            }
            ClientCommand::Unsubscribe { symbols } => {
                let symbols: Vec<Symbol> = symbols.iter().map(Symbol::new).collect();
                // The ack echoes this client's removals; the tracked
                // set only shrinks when no other client wants a symbol
                let removed = match self.sessions.get_mut(&id) {
                    Some(mut session) => session.interest.remove(&symbols),
                    None => Vec::new(),
                };
                let orphaned: Vec<Symbol> = symbols
                    .into_iter()
                    .filter(|symbol| !self.any_interested(symbol))
                    .collect();
                manager.untrack(&orphaned);
                StreamMessage::Unsubscribed {
                    symbols: removed.iter().map(|s| s.as_str().to_string()).collect(),
                }
            }
            ClientCommand::GetCached => {
                let filter = self
                    .sessions
                    .get(&id)
                    .and_then(|session| session.interest.symbol_set());
                StreamMessage::CachedPrices {
                    data: cache.price_snapshot(filter.as_ref()),
                }
            }
            ClientCommand::GetIndices => StreamMessage::Indices {
                data: cache.index_snapshot(),
            },
            ClientCommand::Ping => StreamMessage::Pong,
        }
    }

    fn any_interested(&self, symbol: &Symbol) -> bool {
        self.sessions.iter().any(|entry| match &entry.value().interest {
            Interest::All => true,
            Interest::Symbols(set) => set.contains(symbol),
        })
    }
}

/// Bridge the manager's broadcast channel into per-client queues.
/// Runs until the broadcast channel closes.
pub fn spawn_fanout(
    registry: Arc<ConnectionRegistry>,
    mut ticks: broadcast::Receiver<TickEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match ticks.recv().await {
                Ok(event) => registry.fan_out(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "fan-out lagged behind tick broadcast");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("tick broadcast closed, fan-out stopping");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::market::Market;
    use types::tick::PriceTick;

    use crate::feed::{ScriptedFactory, ScriptedFeed};
    use crate::manager::{StreamConfig, StreamManager};

    fn stock(symbol: &str, price: i64) -> TickEvent {
        TickEvent::Stock(PriceTick::simple(symbol, Decimal::from(price), 1))
    }

    fn symbols(list: &[&str]) -> BTreeSet<Symbol> {
        list.iter().map(|s| Symbol::new(*s)).collect()
    }

    #[tokio::test]
    async fn test_fan_out_respects_interest() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (_vnm_id, mut vnm_rx) = registry.register(Interest::Symbols(symbols(&["VNM"])));
        let (_all_id, mut all_rx) = registry.register(Interest::All);

        registry.fan_out(&stock("VNM", 75_000));
        registry.fan_out(&stock("FPT", 120_000));

        // Symbol-filtered client sees only VNM
        let msg = vnm_rx.recv().await.unwrap();
        assert!(matches!(msg, StreamMessage::Price { data } if data.symbol.as_str() == "VNM"));
        assert!(vnm_rx.try_recv().is_err());

        // Interest::All sees both
        assert!(all_rx.recv().await.is_some());
        assert!(all_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_slow_client_drops_ticks_not_connection() {
        let registry = ConnectionRegistry::new(RegistryConfig { queue_capacity: 1 });
        let (id, mut rx) = registry.register(Interest::All);

        registry.fan_out(&stock("VNM", 75_000));
        registry.fan_out(&stock("VNM", 75_100));
        registry.fan_out(&stock("VNM", 75_200));

        // First tick queued, rest dropped, session still alive
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.session_count(), 1);
        registry.unregister(id);
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_client_removed_on_fan_out() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (_id, rx) = registry.register(Interest::All);
        drop(rx);

        registry.fan_out(&stock("VNM", 75_000));
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_ack_echoes_own_symbols() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (feed, _control) = ScriptedFeed::new(Market::Hose);
        let manager = StreamManager::new(
            Arc::new(ScriptedFactory::new(feed)),
            StreamConfig::default(),
        );
        let cache = manager.cache();

        let (a, _rx_a) = registry.register(Interest::Symbols(BTreeSet::new()));
        let (b, _rx_b) = registry.register(Interest::Symbols(BTreeSet::new()));
        for id in [a, b] {
            registry.handle_command(
                id,
                ClientCommand::Subscribe { symbols: vec!["VNM".to_string()] },
                &manager,
                &cache,
            );
        }

        // First client drops VNM: the ack names it even though the
        // second client keeps the symbol tracked
        let reply = registry.handle_command(
            a,
            ClientCommand::Unsubscribe { symbols: vec!["VNM".to_string()] },
            &manager,
            &cache,
        );
        assert!(
            matches!(&reply, StreamMessage::Unsubscribed { symbols } if symbols == &["VNM".to_string()])
        );
        assert_eq!(manager.tracked_symbols(), vec![Symbol::new("VNM")]);

        // Last interested client drops it: same ack, symbol untracked
        let reply = registry.handle_command(
            b,
            ClientCommand::Unsubscribe { symbols: vec!["VNM".to_string()] },
            &manager,
            &cache,
        );
        assert!(
            matches!(&reply, StreamMessage::Unsubscribed { symbols } if symbols == &["VNM".to_string()])
        );
        assert!(manager.tracked_symbols().is_empty());
    }

    #[tokio::test]
    async fn test_index_ticks_reach_everyone() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (_id, mut rx) = registry.register(Interest::Symbols(symbols(&["VNM"])));

        let event = TickEvent::Index(types::tick::IndexTick {
            index_id: "VNINDEX".to_string(),
            market_code: "10".to_string(),
            exchange: "HOSE".to_string(),
            current_index: Some(Decimal::from(1250)),
            open_index: None,
            change: None,
            percent_change: None,
            volume: None,
            value: None,
            advances: None,
            declines: None,
            unchanged: None,
            timestamp: 1,
        });
        registry.fan_out(&event);

        assert!(matches!(
            rx.recv().await.unwrap(),
            StreamMessage::Index { .. }
        ));
    }
}
