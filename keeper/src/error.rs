//! Keeper error taxonomy

use pool_model::score::ScoreError;
use pool_model::ChainSelector;
use thiserror::Error;

pub type KeeperResult<T> = Result<T, KeeperError>;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Read failed; the pool is skipped this cycle
    #[error("pool on chain {chain} unobservable: {reason}")]
    Unobservable { chain: ChainSelector, reason: String },

    #[error("transient error on chain {chain}: {reason}")]
    Transient { chain: ChainSelector, reason: String },

    #[error("{action} reverted on chain {chain}: {reason}")]
    Reverted {
        chain: ChainSelector,
        action: &'static str,
        reason: String,
    },

    #[error("route {src} -> {dst} not configured: {reason}")]
    RouteNotConfigured {
        src: ChainSelector,
        dst: ChainSelector,
        reason: String,
    },

    #[error("invariant violated on chain {chain}: {reason}")]
    Invariant { chain: ChainSelector, reason: String },

    #[error("batch failed on chain {chain}: {reason}")]
    BatchFailed { chain: ChainSelector, reason: String },

    #[error("timed out after {ms} ms waiting for {what}")]
    Timeout { what: String, ms: u64 },

    #[error("event stream closed")]
    EventStreamClosed,

    #[error("score error on chain {chain}: {source}")]
    Score {
        chain: ChainSelector,
        #[source]
        source: ScoreError,
    },
}

impl KeeperError {
    /// Worth retrying on the next poll cycle with fresh state
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeeperError::Unobservable { .. }
                | KeeperError::Transient { .. }
                | KeeperError::Reverted { .. }
                | KeeperError::Timeout { .. }
                | KeeperError::RouteNotConfigured { .. }
        )
    }

    /// Needs operator intervention
    pub fn is_fatal(&self) -> bool {
        matches!(self, KeeperError::BatchFailed { .. } | KeeperError::Invariant { .. })
    }

    /// Chain the error is about, if any
    pub fn chain(&self) -> Option<ChainSelector> {
        match self {
            KeeperError::Unobservable { chain, .. }
            | KeeperError::Transient { chain, .. }
            | KeeperError::Reverted { chain, .. }
            | KeeperError::Invariant { chain, .. }
            | KeeperError::BatchFailed { chain, .. }
            | KeeperError::Score { chain, .. } => Some(*chain),
            KeeperError::RouteNotConfigured { src, .. } => Some(*src),
            _ => None,
        }
    }
}
