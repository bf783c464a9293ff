use crate::auth::Identity;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use trading::engine::{OrderFilter, PlaceOrderRequest, PositionValuation};
use types::ids::OrderId;
use types::order::Order;
use types::trade::Trade;
use uuid::Uuid;

pub async fn place_order(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.engine.place_order(user_id, payload).await?;
    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.engine.list_orders(user_id, &filter)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order_id = parse_order_id(&order_id)?;
    Ok(Json(state.engine.get_order(user_id, order_id)?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order_id = parse_order_id(&order_id)?;
    let order = state.engine.cancel_order(user_id, order_id).await?;
    Ok(Json(order))
}

pub async fn list_trades(
    State(state): State<AppState>,
    Identity(user_id): Identity,
) -> Result<Json<Vec<Trade>>, AppError> {
    Ok(Json(state.engine.list_trades(user_id).await))
}

pub async fn list_positions(
    State(state): State<AppState>,
    Identity(user_id): Identity,
) -> Result<Json<Vec<PositionValuation>>, AppError> {
    Ok(Json(state.engine.list_positions(user_id).await))
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    Uuid::parse_str(raw)
        .map(OrderId::from_uuid)
        .map_err(|_| AppError::BadRequest(format!("invalid order id: {raw}")))
}
