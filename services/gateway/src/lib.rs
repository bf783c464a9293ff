//! Gateway: HTTP/WebSocket surface for the paper-trading core
//!
//! Thin layer over the stream manager and the order engine; all
//! domain behavior lives in those services.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
