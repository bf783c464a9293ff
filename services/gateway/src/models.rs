//! Response DTOs that are not already domain types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::tick::{IndexTick, PriceTick};
use types::wallet::Wallet;

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub market: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub subscribed: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Wallet plus the derived available figure
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub available: Decimal,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            available: wallet.available(),
            wallet,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub stale: bool,
    pub prices: BTreeMap<String, PriceTick>,
    pub indices: BTreeMap<String, IndexTick>,
}
