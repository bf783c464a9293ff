//! WebSocket wire protocol for price stream clients
//!
//! Inbound commands are tagged by `action`, outbound messages by
//! `type`. Unknown inbound actions fail serde deserialization and are
//! answered with an `error` message by the connection handler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use types::tick::{IndexTick, PriceTick};

/// Command sent by a WebSocket client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Add symbols to this client's interest set
    Subscribe { symbols: Vec<String> },
    /// Remove symbols from this client's interest set
    Unsubscribe { symbols: Vec<String> },
    /// One-shot snapshot of cached stock prices for the interest set
    GetCached,
    /// One-shot snapshot of all cached index values
    GetIndices,
    Ping,
}

/// Message pushed to a WebSocket client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Price { data: PriceTick },
    Index { data: IndexTick },
    Subscribed { symbols: Vec<String> },
    Unsubscribed { symbols: Vec<String> },
    CachedPrices { data: BTreeMap<String, PriceTick> },
    Indices { data: BTreeMap<String, IndexTick> },
    Pong,
    Error { message: String },
}
