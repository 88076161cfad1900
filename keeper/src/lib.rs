//! Lanca liquidity keeper and rebalancer
//!
//! Off-chain engine that polls every pool in the network, triggers batch
//! processing and child snapshots when thresholds are met, and corrects
//! deficits and surpluses against target balances.

pub mod accessor;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod health;
pub mod inflight;
pub mod local;
pub mod orchestrator;
pub mod params_sync;
pub mod priority_queue;
pub mod reconciler;
pub mod routes;
pub mod triggers;
pub mod tx_builder;

pub use error::{KeeperError, KeeperResult};
