//! Pure model of the Lanca liquidity network
//!
//! Everything here is synchronous and free of I/O: pool snapshots, scoring,
//! queue batching, routing, token ledgers and the correction planner. The
//! `network` module executes the pool write interface against that model with
//! ledger semantics (validate first, then mutate and emit events).

pub mod types;
pub mod math;
pub mod state;
pub mod score;
pub mod queue;
pub mod route;
pub mod ledger;
pub mod reconcile;
pub mod events;
pub mod view;
pub mod network;
pub mod helpers;

// Re-export commonly used types
pub use types::*;
pub use state::*;
pub use events::*;
pub use view::*;
