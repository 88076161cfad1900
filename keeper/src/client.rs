//! Chain client seam
//!
//! Everything the keeper knows about pools comes through `PoolClient`: one
//! consistent view read per pool, parameter and route reads, balance reads,
//! transaction submission and an event stream.

use crate::tx_builder::Transaction;
use async_trait::async_trait;
use pool_model::{Address, ChainSelector, EventTag, PoolEvent, PoolParams, PoolView, TxHash};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("reverted: {0}")]
    Reverted(String),

    #[error("request timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Accepted, not yet confirmed
    Pending,
    Confirmed,
    Reverted,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx: TxHash,
    pub chain: ChainSelector,
    pub block: u64,
    pub status: TxStatus,
    pub events: Vec<PoolEvent>,
}

impl TxReceipt {
    pub fn has(&self, tag: EventTag) -> bool {
        self.events.iter().any(|e| e.tag() == tag)
    }

    pub fn find(&self, tag: EventTag) -> Option<&PoolEvent> {
        self.events.iter().find(|e| e.tag() == tag)
    }
}

#[async_trait]
pub trait PoolClient: Send + Sync {
    /// Full pool view pinned to a single block
    async fn pool_view(&self, chain: ChainSelector) -> Result<PoolView, ClientError>;

    async fn pool_params(&self, chain: ChainSelector) -> Result<PoolParams, ClientError>;

    /// `getDstPool`, zero address when unset
    async fn dst_pool(&self, chain: ChainSelector, dst: ChainSelector) -> Result<Address, ClientError>;

    async fn liquidity_balance(&self, chain: ChainSelector, holder: Address) -> Result<u128, ClientError>;

    async fn debt_balance(&self, chain: ChainSelector, holder: Address) -> Result<u128, ClientError>;

    /// Submit and wait for inclusion. A receipt with `TxStatus::Pending`
    /// means the transaction was accepted but not yet confirmed.
    async fn submit(&self, tx: Transaction) -> Result<TxReceipt, ClientError>;

    async fn tx_status(&self, chain: ChainSelector, tx: TxHash) -> Result<TxStatus, ClientError>;

    fn subscribe(&self) -> broadcast::Receiver<PoolEvent>;
}
