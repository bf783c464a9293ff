use crate::handlers::{order, stream, wallet, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let trading_routes = Router::new()
        .route("/orders", post(order::place_order).get(order::list_orders))
        .route(
            "/orders/:id",
            get(order::get_order).delete(order::cancel_order),
        )
        .route("/trades", get(order::list_trades))
        .route("/positions", get(order::list_positions))
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/grant", post(wallet::grant))
        .route("/ledger", get(wallet::list_ledger));

    let stream_routes = Router::new()
        .route("/connect", post(stream::connect))
        .route("/disconnect", post(stream::disconnect))
        .route("/status", get(stream::status))
        .route("/subscribe", post(stream::subscribe))
        .route("/prices", get(stream::prices));

    Router::new()
        .nest("/api/v1/trading", trading_routes)
        .nest("/api/v1/stream", stream_routes)
        .route("/ws/prices", get(ws::ws_prices))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
