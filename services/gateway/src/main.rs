use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::net::TcpListener;

use gateway::router::create_router;
use gateway::state::AppState;
use price_stream::feed::SimFactory;
use price_stream::manager::{StreamConfig, StreamManager};
use price_stream::registry::{spawn_fanout, ConnectionRegistry, RegistryConfig};
use trading::engine::{spawn_tick_loop, OrderEngine};
use trading::oracle::{PricingOracle, SessionWindows, StaticClosingPrices};
use trading::positions::PositionBook;
use trading::wallet::WalletLedger;
use types::ids::Symbol;
use types::market::Market;

/// Demo universe served by the simulated feed, with reference prices
/// doubling as closing prices so orders work outside session hours.
fn demo_symbols() -> Vec<(Symbol, Decimal)> {
    vec![
        (Symbol::new("VNM"), Decimal::from(75_000)),
        (Symbol::new("FPT"), Decimal::from(120_000)),
        (Symbol::new("HPG"), Decimal::from(28_000)),
        (Symbol::new("VCB"), Decimal::from(92_000)),
        (Symbol::new("VIC"), Decimal::from(44_000)),
    ]
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    tracing::info!("Starting gateway service");

    let symbols = demo_symbols();

    let factory = Arc::new(SimFactory::new(symbols.clone(), Duration::from_millis(500)));
    let manager = StreamManager::new(factory, StreamConfig::default());

    let closing = Arc::new(StaticClosingPrices::new());
    for (symbol, price) in &symbols {
        closing.insert(symbol.clone(), *price);
    }
    let oracle = Arc::new(PricingOracle::new(
        manager.cache(),
        SessionWindows::vietnam(),
        closing,
    ));
    let engine = Arc::new(OrderEngine::new(
        oracle,
        Arc::new(WalletLedger::new()),
        Arc::new(PositionBook::new()),
    ));

    let registry = Arc::new(ConnectionRegistry::new(RegistryConfig::default()));
    let _fanout = spawn_fanout(registry.clone(), manager.subscribe_ticks());
    let _tick_loop = spawn_tick_loop(engine.clone(), manager.subscribe_ticks());

    let tracked: Vec<Symbol> = symbols.iter().map(|(s, _)| s.clone()).collect();
    manager.track(&tracked);
    manager.connect(Market::Hose);

    let state = AppState::new(manager, registry, engine);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
