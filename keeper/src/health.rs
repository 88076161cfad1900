//! Pool health assessment
//!
//! Combines a pool view with its parameters into the scores and readiness
//! flags the keeper acts on.

use crate::error::{KeeperError, KeeperResult};
use pool_model::queue::BatchReadiness;
use pool_model::score::{deposits_suppressed, dynamic_fee_bps, score_pool, Scores};
use pool_model::{ChainSelector, PoolParams, PoolView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHealth {
    pub chain: ChainSelector,
    pub scores: Scores,
    pub readiness: BatchReadiness,
    pub deposits_suppressed: bool,
    pub cap_reached: bool,
    pub deficit: u128,
    pub surplus: u128,
}

impl PoolHealth {
    /// A batch drained now would carry at least one entry
    pub fn has_batchable_entries(&self, view: &PoolView) -> bool {
        (self.readiness.deposits && view.snapshot.deposit_queue_length > 0)
            || (self.readiness.withdrawals && view.snapshot.withdrawal_queue_length > 0)
    }

    /// Bridge fee quoted for transfers into this pool
    pub fn bridge_fee_bps(&self, params: &PoolParams) -> u16 {
        dynamic_fee_bps(params.fees.lanca_bridge_fee_bps, self.scores.composite)
    }
}

pub fn assess(view: &PoolView, params: &PoolParams) -> KeeperResult<PoolHealth> {
    let chain = view.chain();
    let scores = score_pool(&view.snapshot, &view.flow, &params.score)
        .map_err(|source| KeeperError::Score { chain, source })?;
    let suppressed = deposits_suppressed(&scores, &params.score);

    Ok(PoolHealth {
        chain,
        readiness: view.readiness(&params.queue, suppressed),
        deposits_suppressed: suppressed,
        cap_reached: view.cap_reached(),
        deficit: view.deficit(),
        surplus: view.surplus(),
        scores,
    })
}
