//! Streaming WebSocket endpoint
//!
//! One registry session per socket. The read loop parses client
//! commands; replies and fan-out ticks share the session's bounded
//! queue, drained by the write loop.

use std::collections::BTreeSet;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use price_stream::protocol::{ClientCommand, StreamMessage};
use price_stream::registry::Interest;
use types::ids::Symbol;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Comma-separated symbols, or `*` for everything
    pub symbols: Option<String>,
}

pub async fn ws_prices(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.symbols))
}

async fn handle_socket(socket: WebSocket, state: AppState, symbols: Option<String>) {
    let interest = match symbols.as_deref() {
        None | Some("") | Some("*") => Interest::All,
        Some(list) => {
            let set: BTreeSet<Symbol> = list
                .split(',')
                .map(Symbol::new)
                .filter(Symbol::is_valid)
                .collect();
            let seeded: Vec<Symbol> = set.iter().cloned().collect();
            state.manager.track(&seeded);
            Interest::Symbols(set)
        }
    };

    let (client_id, mut queue) = state.registry.register(interest);
    let (mut sink, mut stream) = socket.split();

    let write_task = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let cache = state.manager.cache();
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => state.registry.handle_command(
                        client_id,
                        command,
                        &state.manager,
                        &cache,
                    ),
                    // Malformed input answers with an error; the
                    // connection stays open
                    Err(err) => StreamMessage::Error {
                        message: format!("invalid command: {err}"),
                    },
                };
                state.registry.send_to(client_id, reply);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.unregister(client_id);
    write_task.abort();
    debug!(client_id, "websocket client disconnected");
}
