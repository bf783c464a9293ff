//! Trading Service
//!
//! Paper-trading order engine built on the price stream:
//!
//! ```text
//!            ┌──────────────┐
//!  ticks ───▶│ OrderEngine  │───▶ trades, ledger entries
//!            │  (per-symbol │
//!            │   books)     │
//!            └──┬────────┬──┘
//!               │        │
//!        ┌──────▼──┐  ┌──▼───────────┐
//!        │ Pricing │  │ WalletLedger │
//!        │ Oracle  │  │ PositionBook │
//!        └─────────┘  └──────────────┘
//! ```
//!
//! Settlement is simulated: one trade per filled order, flat fee on
//! both sides, no counterparty matching.

pub mod book;
pub mod engine;
pub mod oracle;
pub mod positions;
pub mod wallet;
