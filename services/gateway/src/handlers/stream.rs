//! Admin control surface for the feed connection

use crate::error::AppError;
use crate::models::{ConnectRequest, MessageResponse, PricesResponse, SubscribeRequest, SubscribeResponse};
use crate::state::AppState;
use axum::{extract::State, Json};
use price_stream::manager::StreamStatus;
use types::ids::Symbol;
use types::market::Market;

pub async fn connect(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<StreamStatus>, AppError> {
    let market = Market::parse(&payload.market)
        .ok_or_else(|| AppError::BadRequest(format!("unknown market: {}", payload.market)))?;
    Ok(Json(state.manager.connect(market)))
}

pub async fn disconnect(State(state): State<AppState>) -> Json<MessageResponse> {
    state.manager.disconnect().await;
    Json(MessageResponse {
        message: "disconnected".to_string(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.manager.status())
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, AppError> {
    let symbols: Vec<Symbol> = payload
        .symbols
        .iter()
        .map(Symbol::new)
        .filter(Symbol::is_valid)
        .collect();
    if symbols.is_empty() {
        return Err(AppError::BadRequest("no valid symbols".to_string()));
    }
    let added = state.manager.track(&symbols);
    Ok(Json(SubscribeResponse {
        subscribed: added.iter().map(|s| s.as_str().to_string()).collect(),
    }))
}

pub async fn prices(State(state): State<AppState>) -> Json<PricesResponse> {
    let cache = state.manager.cache();
    Json(PricesResponse {
        stale: cache.is_stale(),
        prices: cache.price_snapshot(None),
        indices: cache.index_snapshot(),
    })
}
