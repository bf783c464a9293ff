use crate::auth::Identity;
use crate::error::AppError;
use crate::models::WalletResponse;
use crate::state::AppState;
use axum::{extract::State, Json};
use types::ledger::LedgerEntry;

pub async fn get_wallet(
    State(state): State<AppState>,
    Identity(user_id): Identity,
) -> Result<Json<WalletResponse>, AppError> {
    Ok(Json(state.engine.wallet(user_id).await.into()))
}

/// One-time initial cash grant; calling again returns the wallet
/// unchanged.
pub async fn grant(
    State(state): State<AppState>,
    Identity(user_id): Identity,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.engine.grant_initial_cash(user_id).await?;
    Ok(Json(wallet.into()))
}

pub async fn list_ledger(
    State(state): State<AppState>,
    Identity(user_id): Identity,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    Ok(Json(state.engine.ledger_entries(user_id).await))
}
