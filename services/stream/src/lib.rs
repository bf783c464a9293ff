//! Price Stream Service
//!
//! Owns the upstream feed connection and fans live ticks out to
//! WebSocket clients and the order engine:
//!
//! ```text
//! FeedAdapter (per market)
//!        │
//!   ┌────▼────┐
//!   │ Manager │  ← lifecycle, resubscription, backoff
//!   └────┬────┘
//!        │ cache + broadcast
//!   ┌────┴──────────┐
//!   │               │
//! ┌─▼──────────┐ ┌──▼─────────┐
//! │ Registry   │ │ OrderEngine│
//! │ (fan-out)  │ │ (triggers) │
//! └────────────┘ └────────────┘
//! ```
//!
//! Ticks are delivered to all interested consumers in feed-arrival
//! order per symbol; no ordering is promised across symbols.

pub mod backoff;
pub mod cache;
pub mod feed;
pub mod manager;
pub mod protocol;
pub mod registry;
