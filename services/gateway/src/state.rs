use price_stream::manager::StreamManager;
use price_stream::registry::ConnectionRegistry;
use std::sync::Arc;
use trading::engine::OrderEngine;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<StreamManager>,
    pub registry: Arc<ConnectionRegistry>,
    pub engine: Arc<OrderEngine>,
}

impl AppState {
    pub fn new(
        manager: Arc<StreamManager>,
        registry: Arc<ConnectionRegistry>,
        engine: Arc<OrderEngine>,
    ) -> Self {
        Self {
            manager,
            registry,
            engine,
        }
    }
}
