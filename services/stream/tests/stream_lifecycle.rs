//! End-to-end feed lifecycle: connect, serve, degrade, reconnect.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use price_stream::feed::{ScriptedControl, ScriptedFactory, ScriptedFeed};
use price_stream::manager::{FeedState, StreamConfig, StreamManager};
use price_stream::registry::{spawn_fanout, ConnectionRegistry, Interest, RegistryConfig};
use price_stream::protocol::StreamMessage;
use types::ids::Symbol;
use types::market::Market;
use types::tick::{PriceTick, TickEvent};

fn fast_config() -> StreamConfig {
    StreamConfig {
        backoff_base: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
        event_capacity: 256,
    }
}

fn scripted_manager() -> (Arc<StreamManager>, ScriptedControl) {
    let (feed, control) = ScriptedFeed::new(Market::Hose);
    let mgr = StreamManager::new(Arc::new(ScriptedFactory::new(feed)), fast_config());
    (mgr, control)
}

fn stock(symbol: &str, price: i64) -> TickEvent {
    TickEvent::Stock(PriceTick::simple(symbol, Decimal::from(price), 1))
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_connect_caches_and_broadcasts() {
    let (mgr, control) = scripted_manager();
    mgr.track(&[Symbol::new("VNM")]);

    let mut ticks = mgr.subscribe_ticks();
    mgr.connect(Market::Hose);
    wait_until(|| mgr.status().state == FeedState::Connected).await;
    assert!(!mgr.status().stale);

    control.tick(stock("VNM", 75_000));

    let event = tokio::time::timeout(Duration::from_secs(2), ticks.recv())
        .await
        .expect("broadcast within 2s")
        .unwrap();
    assert_eq!(event.symbol().unwrap().as_str(), "VNM");

    let cache = mgr.cache();
    wait_until(|| cache.price(&Symbol::new("VNM"), 0).is_some()).await;
    let hit = cache.price(&Symbol::new("VNM"), 0).unwrap();
    assert_eq!(hit.tick.last_price, Decimal::from(75_000));
    assert!(!hit.stale);

    let status = mgr.status();
    assert!(status.uptime_secs.is_some());
    assert!(status.last_event_at.is_some());
    assert_eq!(status.message_count, 1);

    mgr.disconnect().await;
}

#[tokio::test]
async fn test_drop_degrades_and_keeps_cache_readable() {
    let (mgr, control) = scripted_manager();
    mgr.track(&[Symbol::new("FPT")]);
    mgr.connect(Market::Hose);
    wait_until(|| mgr.status().state == FeedState::Connected).await;

    control.tick(stock("FPT", 120_000));
    let cache = mgr.cache();
    wait_until(|| cache.price(&Symbol::new("FPT"), 0).is_some()).await;

    // Hold reconnects in a failure loop so the degraded state is observable
    control.set_connect_failing(true);
    control.drop_connection();
    wait_until(|| mgr.status().state == FeedState::Degraded).await;

    // Last known price still served, flagged stale
    let hit = cache.price(&Symbol::new("FPT"), 0).unwrap();
    assert_eq!(hit.tick.last_price, Decimal::from(120_000));
    assert!(hit.stale);

    // Once the upstream recovers the manager reconnects on its own
    control.set_connect_failing(false);
    wait_until(|| mgr.status().state == FeedState::Connected).await;
    assert!(!mgr.status().stale);

    mgr.disconnect().await;
}

#[tokio::test]
async fn test_reconnect_resubscribes_tracked_set_first() {
    let (mgr, control) = scripted_manager();
    mgr.track(&[Symbol::new("VNM"), Symbol::new("FPT")]);
    mgr.connect(Market::Hose);
    wait_until(|| mgr.status().state == FeedState::Connected).await;
    assert_eq!(control.subscribe_calls().len(), 1);

    control.drop_connection();
    wait_until(|| control.subscribe_calls().len() >= 2).await;
    wait_until(|| mgr.status().state == FeedState::Connected).await;

    // The reconnect replayed the full tracked set before serving events
    let calls = control.subscribe_calls();
    let replayed = calls.last().unwrap();
    assert_eq!(
        replayed,
        &vec![Symbol::new("FPT"), Symbol::new("VNM")],
        "tracked set resubscribed in sorted order"
    );
    assert!(mgr.status().reconnect_count >= 1);

    // Ticks flow again on the new session
    let mut ticks = mgr.subscribe_ticks();
    control.tick(stock("VNM", 75_500));
    let event = tokio::time::timeout(Duration::from_secs(2), ticks.recv())
        .await
        .expect("tick after reconnect")
        .unwrap();
    assert_eq!(event.symbol().unwrap().as_str(), "VNM");

    mgr.disconnect().await;
}

#[tokio::test]
async fn test_failed_connect_retries_until_success() {
    let (feed, control) = ScriptedFeed::new(Market::Hnx);
    control.fail_next_connect();
    let mgr = StreamManager::new(Arc::new(ScriptedFactory::new(feed)), fast_config());

    mgr.connect(Market::Hnx);
    // First attempt fails, second succeeds after backoff
    wait_until(|| mgr.status().state == FeedState::Connected).await;
    assert!(mgr.status().reconnect_count >= 1);

    mgr.disconnect().await;
}

#[tokio::test]
async fn test_live_subscribe_delta_forwarded() {
    let (mgr, control) = scripted_manager();
    mgr.connect(Market::Hose);
    wait_until(|| mgr.status().state == FeedState::Connected).await;

    mgr.track(&[Symbol::new("HPG")]);
    wait_until(|| {
        control
            .subscribe_calls()
            .iter()
            .any(|call| call.contains(&Symbol::new("HPG")))
    })
    .await;

    mgr.disconnect().await;
}

#[tokio::test]
async fn test_fanout_bridges_broadcast_to_clients() {
    let (mgr, control) = scripted_manager();
    mgr.track(&[Symbol::new("VNM")]);

    let registry = Arc::new(ConnectionRegistry::new(RegistryConfig::default()));
    let fanout = spawn_fanout(registry.clone(), mgr.subscribe_ticks());
    let (_id, mut rx) = registry.register(Interest::All);

    mgr.connect(Market::Hose);
    wait_until(|| mgr.status().state == FeedState::Connected).await;

    control.tick(stock("VNM", 74_800));
    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("fan-out within 2s")
        .unwrap();
    assert!(matches!(msg, StreamMessage::Price { data } if data.symbol.as_str() == "VNM"));

    mgr.disconnect().await;
    fanout.abort();
}
