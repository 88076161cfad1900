//! Everything the keeper and rebalancer read from a pool, pinned to one block

use crate::queue::*;
use crate::state::*;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub kind: PoolKind,
    pub address: Address,
    pub snapshot: PoolSnapshot,
    pub liquidity_cap: u128,
    pub queued_deposit_total: u128,
    pub queues_full: bool,
    pub batch_in_progress: bool,
    /// Parent epoch (children report the epoch of their last snapshot)
    pub epoch: u64,
    /// Parent: own active balance plus this epoch's child snapshots
    pub network_liquidity: u128,
    /// Parent: children whose snapshot for `epoch` has not arrived
    pub missing_snapshots: Vec<ChainSelector>,
    /// Child: parent epoch of the last snapshot sent
    pub last_snapshot_epoch: Option<u64>,
    pub pending_withdrawal_count: u32,
    pub pending_withdrawal_total: u128,
    pub flow: FlowWindow,
}

impl PoolView {
    pub fn chain(&self) -> ChainSelector {
        self.snapshot.chain
    }

    pub fn deficit(&self) -> u128 {
        self.snapshot.deficit()
    }

    pub fn surplus(&self) -> u128 {
        self.snapshot.surplus()
    }

    /// Deposits that would push network liquidity over the cap
    pub fn cap_reached(&self) -> bool {
        self.network_liquidity.saturating_add(self.queued_deposit_total) > self.liquidity_cap
    }

    pub fn all_snapshots_received(&self) -> bool {
        self.missing_snapshots.is_empty()
    }

    /// Readiness against the given params, with deposits held back by the
    /// cap or by score suppression
    pub fn readiness(&self, params: &QueueParams, suppressed: bool) -> BatchReadiness {
        batch_readiness(
            self.snapshot.deposit_queue_length,
            self.snapshot.withdrawal_queue_length,
            params,
            suppressed || self.cap_reached(),
        )
    }

    /// Every settled withdrawal can be paid from active balance
    pub fn pending_withdrawals_ready(&self) -> bool {
        self.pending_withdrawal_count > 0 && self.pending_withdrawal_total <= self.snapshot.active_balance
    }
}
