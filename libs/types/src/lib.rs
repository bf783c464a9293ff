//! Types library for the paper-trading exchange
//!
//! This library provides all core type definitions shared across the
//! stream, trading and gateway services.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, TradeId, UserId) and symbol codes
//! - `market`: Market/exchange codes and the index-code table
//! - `tick`: Price and index tick payloads streamed from the feed
//! - `order`: Order lifecycle types
//! - `trade`: Fill records
//! - `wallet`: Cash balance with fund reservation
//! - `ledger`: Append-only transaction log entries
//! - `position`: Per-symbol holdings
//! - `fee`: Fee and bootstrap-grant constants
//! - `errors`: Error taxonomy
//! - `clock`: Unix-nanosecond clock helper

pub mod clock;
pub mod errors;
pub mod fee;
pub mod ids;
pub mod ledger;
pub mod market;
pub mod order;
pub mod position;
pub mod tick;
pub mod trade;
pub mod wallet;
