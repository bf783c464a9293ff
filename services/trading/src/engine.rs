//! Order engine: placement, cancellation, tick-driven settlement
//!
//! MARKET orders execute immediately at the oracle price. LIMIT orders
//! rest in the per-symbol book until a tick satisfies the trigger and
//! then execute at their limit price. Every path that can end a
//! pending order (fill, cancel) runs under the symbol's book lock, so
//! an order settles exactly once.
//!
//! Validation failures produce a stored REJECTED order with the
//! specific reason; nothing is reserved or rested for a rejected order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use types::clock::unix_nanos_now;
use types::errors::TradingError;
use types::fee::{estimated_cost, trade_fee};
use types::ids::{OrderId, Symbol, UserId};
use types::ledger::LedgerEntry;
use types::order::{Order, OrderStatus, OrderType, RejectReason, Side};
use types::position::Position;
use types::tick::{PriceTick, TickEvent};
use types::trade::Trade;
use types::wallet::Wallet;

use crate::book::{RestingIndex, RestingOrder};
use crate::oracle::PricingOracle;
use crate::positions::PositionBook;
use crate::wallet::WalletLedger;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
    pub client_order_id: Option<String>,
}

/// Query filter for order listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Status label: PENDING, FILLED, CANCELLED, REJECTED
    pub status: Option<String>,
    pub symbol: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

const DEFAULT_PAGE: usize = 100;

/// Position enriched with an oracle valuation when one resolves.
#[derive(Debug, Clone, Serialize)]
pub struct PositionValuation {
    #[serde(flatten)]
    pub position: Position,
    pub market_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

#[derive(Default)]
struct EngineCounters {
    orders_placed: AtomicU64,
    orders_filled: AtomicU64,
    orders_cancelled: AtomicU64,
    orders_rejected: AtomicU64,
    ticks_processed: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_cancelled: u64,
    pub orders_rejected: u64,
    pub ticks_processed: u64,
}

pub struct OrderEngine {
    oracle: Arc<PricingOracle>,
    wallets: Arc<WalletLedger>,
    positions: Arc<PositionBook>,
    books: RestingIndex,
    orders: DashMap<OrderId, Order>,
    trades: RwLock<Vec<Trade>>,
    client_order_ids: DashMap<(UserId, String), OrderId>,
    counters: EngineCounters,
}

impl OrderEngine {
    pub fn new(
        oracle: Arc<PricingOracle>,
        wallets: Arc<WalletLedger>,
        positions: Arc<PositionBook>,
    ) -> Self {
        Self {
            oracle,
            wallets,
            positions,
            books: RestingIndex::new(),
            orders: DashMap::new(),
            trades: RwLock::new(Vec::new()),
            client_order_ids: DashMap::new(),
            counters: EngineCounters::default(),
        }
    }

    // -- placement --------------------------------------------------------

    pub async fn place_order(
        &self,
        user_id: UserId,
        req: PlaceOrderRequest,
    ) -> Result<Order, TradingError> {
        let now = unix_nanos_now();
        let symbol = Symbol::new(req.symbol.as_str());
        self.counters.orders_placed.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = shape_reject(&symbol, &req) {
            return Ok(self.store_rejected(user_id, symbol, &req, Decimal::ZERO, reason, now));
        }

        if let Some(key) = &req.client_order_id {
            if self.client_order_ids.contains_key(&(user_id, key.clone())) {
                return Ok(self.store_rejected(
                    user_id,
                    symbol,
                    &req,
                    Decimal::ZERO,
                    RejectReason::DuplicateClientOrderId,
                    now,
                ));
            }
        }

        let snapshot = match self.oracle.resolve(&symbol, now).await {
            Ok(resolved) => resolved.price,
            Err(TradingError::SymbolNotTradable(_)) => {
                return Ok(self.store_rejected(
                    user_id,
                    symbol,
                    &req,
                    Decimal::ZERO,
                    RejectReason::SymbolNotTradable,
                    now,
                ));
            }
            Err(other) => return Err(other),
        };

        let mut order = Order::new(
            user_id,
            symbol.clone(),
            req.side,
            req.order_type,
            req.quantity,
            req.limit_price,
            req.client_order_id.clone(),
            snapshot,
            now,
        );

        match req.side {
            Side::Sell => {
                let held = self.positions.quantity(user_id, &symbol);
                if held < req.quantity {
                    debug!(
                        user_id = %user_id,
                        symbol = %symbol,
                        requested = req.quantity,
                        held,
                        "sell rejected, insufficient position"
                    );
                    return Ok(self.store_rejected(
                        user_id,
                        symbol,
                        &req,
                        snapshot,
                        RejectReason::InsufficientPosition,
                        now,
                    ));
                }
            }
            Side::Buy => {
                // Conservative reservation: limit price for LIMIT, the
                // snapshot for MARKET, fee included
                let required = estimated_cost(req.quantity, order.reference_price());
                match self.wallets.reserve(user_id, required, order.id, now).await {
                    Ok(()) => order.reserved_amount = Some(required),
                    Err(TradingError::InsufficientFunds { required, available }) => {
                        debug!(
                            user_id = %user_id,
                            symbol = %symbol,
                            required = %required,
                            available = %available,
                            "buy rejected, insufficient funds"
                        );
                        return Ok(self.store_rejected(
                            user_id,
                            symbol,
                            &req,
                            snapshot,
                            RejectReason::InsufficientFunds,
                            now,
                        ));
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        if let Some(key) = &order.client_order_id {
            self.client_order_ids.insert((user_id, key.clone()), order.id);
        }

        match req.order_type {
            OrderType::Market => {
                // Market fills run under the symbol lock too, so they
                // serialize with concurrent tick evaluation and cancels
                let book = self.books.book(&symbol);
                let _guard = book.lock().await;
                self.orders.insert(order.id, order.clone());
                self.execute_fill(order, snapshot, now).await
            }
            OrderType::Limit => {
                let book = self.books.book(&symbol);
                let mut guard = book.lock().await;
                self.orders.insert(order.id, order.clone());
                guard.insert(RestingOrder {
                    order_id: order.id,
                    user_id,
                    side: order.side,
                    quantity: order.quantity,
                    // shape_reject guarantees the limit price exists
                    limit_price: order.limit_price.unwrap_or(snapshot),
                });
                info!(
                    order_id = %order.id,
                    user_id = %user_id,
                    symbol = %symbol,
                    side = ?order.side,
                    quantity = order.quantity,
                    limit_price = %order.limit_price.unwrap_or(snapshot),
                    "limit order resting"
                );
                Ok(order)
            }
        }
    }

    fn store_rejected(
        &self,
        user_id: UserId,
        symbol: Symbol,
        req: &PlaceOrderRequest,
        snapshot: Decimal,
        reason: RejectReason,
        now: i64,
    ) -> Order {
        let mut order = Order::new(
            user_id,
            symbol,
            req.side,
            req.order_type,
            req.quantity,
            req.limit_price,
            req.client_order_id.clone(),
            snapshot,
            now,
        );
        order.status = OrderStatus::Rejected(reason.clone());
        self.counters.orders_rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
            order_id = %order.id,
            user_id = %user_id,
            symbol = %order.symbol,
            reason = ?reason,
            "order rejected"
        );
        self.orders.insert(order.id, order.clone());
        order
    }

    // -- settlement -------------------------------------------------------

    /// Settle one order against a single trade. Must be called with
    /// the symbol's book lock held and the order already off the book.
    async fn execute_fill(
        &self,
        mut order: Order,
        price: Decimal,
        now: i64,
    ) -> Result<Order, TradingError> {
        let value = price * Decimal::from(order.quantity);
        let fee = trade_fee(value);
        let trade = Trade::new(
            order.id,
            order.user_id,
            order.symbol.clone(),
            order.side,
            order.quantity,
            price,
            fee,
            now,
        );

        match order.side {
            Side::Buy => {
                let reserved = order.reserved_amount.unwrap_or(value + fee);
                self.wallets
                    .settle_buy(order.user_id, reserved, value, fee, order.id, trade.trade_id, now)
                    .await?;
                self.positions
                    .apply_buy(order.user_id, &order.symbol, order.quantity, price);
            }
            Side::Sell => {
                // Coverage was checked at placement but earlier fills
                // may have consumed the shares since; never go negative
                let held = self.positions.quantity(order.user_id, &order.symbol);
                if held < order.quantity {
                    warn!(
                        order_id = %order.id,
                        symbol = %order.symbol,
                        requested = order.quantity,
                        held,
                        "position no longer covers sell, order cancelled"
                    );
                    order.cancel(now);
                    self.orders.insert(order.id, order.clone());
                    self.counters.orders_cancelled.fetch_add(1, Ordering::Relaxed);
                    return Ok(order);
                }
                // Wallet settlement first: if the wallet is halted the
                // shares must stay put
                self.wallets
                    .settle_sell(order.user_id, value, fee, order.id, trade.trade_id, now)
                    .await?;
                self.positions
                    .apply_sell(order.user_id, &order.symbol, order.quantity);
            }
        }

        order.fill(price, fee, now);
        self.orders.insert(order.id, order.clone());
        self.trades.write().await.push(trade);
        self.counters.orders_filled.fetch_add(1, Ordering::Relaxed);
        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            symbol = %order.symbol,
            side = ?order.side,
            quantity = order.quantity,
            price = %price,
            fee = %fee,
            "order filled"
        );
        Ok(order)
    }

    /// Evaluate one stock tick against the symbol's resting book.
    pub async fn on_tick(&self, tick: &PriceTick) {
        self.counters.ticks_processed.fetch_add(1, Ordering::Relaxed);

        let Some(book) = self.books.existing_book(&tick.symbol) else {
            return;
        };
        let mut guard = book.lock().await;
        let triggered = guard.take_triggered(tick.last_price);

        for resting in triggered {
            let Some(order) = self.orders.get(&resting.order_id).map(|e| e.value().clone()) else {
                continue;
            };
            if order.status.is_terminal() {
                continue;
            }
            let now = unix_nanos_now();
            // Execution price is the limit price, not the tick price
            if let Err(err) = self.execute_fill(order, resting.limit_price, now).await {
                error!(
                    order_id = %resting.order_id,
                    error = %err,
                    "fill settlement failed"
                );
            }
        }
    }

    // -- cancellation -----------------------------------------------------

    pub async fn cancel_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, TradingError> {
        let order = self
            .orders
            .get(&order_id)
            .map(|e| e.value().clone())
            .ok_or(TradingError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(TradingError::OrderNotFound(order_id));
        }

        let book = self.books.book(&order.symbol);
        let mut guard = book.lock().await;

        // Re-read under the lock: a concurrent fill may have won the race
        let mut order = self
            .orders
            .get(&order_id)
            .map(|e| e.value().clone())
            .ok_or(TradingError::OrderNotFound(order_id))?;
        match &order.status {
            OrderStatus::Filled => return Err(TradingError::OrderAlreadyFilled(order_id)),
            OrderStatus::Cancelled => return Err(TradingError::OrderAlreadyCancelled(order_id)),
            OrderStatus::Rejected(_) => {
                return Err(TradingError::Validation(
                    "cannot cancel a rejected order".to_string(),
                ))
            }
            OrderStatus::Pending => {}
        }

        guard.remove(order_id);
        let now = unix_nanos_now();
        order.cancel(now);

        if order.side == Side::Buy {
            if let Some(reserved) = order.reserved_amount {
                self.wallets.release(user_id, reserved, order_id, now).await?;
            }
        }

        self.orders.insert(order_id, order.clone());
        self.counters.orders_cancelled.fetch_add(1, Ordering::Relaxed);
        info!(order_id = %order_id, user_id = %user_id, "order cancelled");
        Ok(order)
    }

    // -- queries ----------------------------------------------------------

    pub fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, TradingError> {
        self.orders
            .get(&order_id)
            .map(|e| e.value().clone())
            .filter(|o| o.user_id == user_id)
            .ok_or(TradingError::OrderNotFound(order_id))
    }

    /// Orders for a user, newest first.
    pub fn list_orders(&self, user_id: UserId, filter: &OrderFilter) -> Vec<Order> {
        let status = filter.status.as_ref().map(|s| s.to_uppercase());
        let symbol = filter.symbol.as_ref().map(Symbol::new);

        let mut out: Vec<Order> = self
            .orders
            .iter()
            .map(|e| e.value().clone())
            .filter(|o| o.user_id == user_id)
            .filter(|o| status.as_deref().map_or(true, |s| o.status.label() == s))
            .filter(|o| symbol.as_ref().map_or(true, |s| &o.symbol == s))
            .collect();
        out.sort_by(|a, b| b.id.cmp(&a.id));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE);
        out.into_iter().skip(offset).take(limit).collect()
    }

    /// Trades for a user, newest first.
    pub async fn list_trades(&self, user_id: UserId) -> Vec<Trade> {
        let trades = self.trades.read().await;
        let mut out: Vec<Trade> = trades
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    /// Positions with oracle valuation where a price resolves.
    pub async fn list_positions(&self, user_id: UserId) -> Vec<PositionValuation> {
        let now = unix_nanos_now();
        let mut out = Vec::new();
        for position in self.positions.list(user_id) {
            let market_price = self
                .oracle
                .resolve(&position.symbol, now)
                .await
                .ok()
                .map(|resolved| resolved.price);
            out.push(PositionValuation {
                market_value: market_price.map(|p| position.market_value(p)),
                unrealized_pnl: market_price.map(|p| position.unrealized_pnl(p)),
                market_price,
                position,
            });
        }
        out
    }

    pub async fn wallet(&self, user_id: UserId) -> Wallet {
        self.wallets.wallet(user_id).await
    }

    pub async fn grant_initial_cash(&self, user_id: UserId) -> Result<Wallet, TradingError> {
        self.wallets
            .grant_initial_cash(user_id, unix_nanos_now())
            .await
    }

    pub async fn ledger_entries(&self, user_id: UserId) -> Vec<LedgerEntry> {
        self.wallets.entries(user_id).await
    }

    pub async fn audit_wallet(&self, user_id: UserId) -> Result<Decimal, TradingError> {
        self.wallets.audit(user_id).await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            orders_placed: self.counters.orders_placed.load(Ordering::Relaxed),
            orders_filled: self.counters.orders_filled.load(Ordering::Relaxed),
            orders_cancelled: self.counters.orders_cancelled.load(Ordering::Relaxed),
            orders_rejected: self.counters.orders_rejected.load(Ordering::Relaxed),
            ticks_processed: self.counters.ticks_processed.load(Ordering::Relaxed),
        }
    }
}

fn shape_reject(symbol: &Symbol, req: &PlaceOrderRequest) -> Option<RejectReason> {
    if !symbol.is_valid() {
        return Some(RejectReason::InvalidSymbol);
    }
    if req.quantity == 0 {
        return Some(RejectReason::InvalidQuantity);
    }
    if req.order_type == OrderType::Limit {
        match req.limit_price {
            None => return Some(RejectReason::MissingLimitPrice),
            Some(price) if price <= Decimal::ZERO => {
                return Some(RejectReason::InvalidLimitPrice)
            }
            Some(_) => {}
        }
    }
    None
}

/// Consume the stream broadcast and feed stock ticks into the engine.
/// Index ticks carry no executable price and are skipped.
pub fn spawn_tick_loop(
    engine: Arc<OrderEngine>,
    mut ticks: broadcast::Receiver<TickEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match ticks.recv().await {
                Ok(TickEvent::Stock(tick)) => engine.on_tick(&tick).await,
                Ok(TickEvent::Index(_)) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "tick loop lagged behind broadcast");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("tick broadcast closed, tick loop stopping");
                    return;
                }
            }
        }
    })
}
