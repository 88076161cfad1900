//! Pool parameters, queue entries and the balance snapshot

use crate::math::*;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Liquidity token decimals (USDC)
pub const LIQ_TOKEN_DECIMALS: u32 = 6;

/// One whole liquidity token in smallest units
pub const ONE_TOKEN: u128 = 1_000_000;

/// Basis-point fees charged on corrective and bridging flows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBps {
    pub rebalancer_fee_bps: u16,
    pub lp_fee_bps: u16,
    pub lanca_bridge_fee_bps: u16,
}

impl FeeBps {
    /// Names of fee fields set to zero (misconfiguration, not a violation)
    pub fn zero_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.rebalancer_fee_bps == 0 {
            out.push("rebalancer_fee_bps");
        }
        if self.lp_fee_bps == 0 {
            out.push("lp_fee_bps");
        }
        if self.lanca_bridge_fee_bps == 0 {
            out.push("lanca_bridge_fee_bps");
        }
        out
    }

    /// Names of fee fields above 100%
    pub fn out_of_range_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let max = BPS_DENOMINATOR as u16;
        if self.rebalancer_fee_bps > max {
            out.push("rebalancer_fee_bps");
        }
        if self.lp_fee_bps > max {
            out.push("lp_fee_bps");
        }
        if self.lanca_bridge_fee_bps > max {
            out.push("lanca_bridge_fee_bps");
        }
        out
    }
}

impl Default for FeeBps {
    fn default() -> Self {
        Self {
            rebalancer_fee_bps: 5,
            lp_fee_bps: 5,
            lanca_bridge_fee_bps: 50,
        }
    }
}

/// Score tuning, all in fixed point (`SCALE` == 1.0)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreParams {
    pub lur_score_sensitivity: u64,
    pub lur_score_weight: u64,
    pub ndr_score_weight: u64,
    /// Composite below this blocks deposits into an over-concentrated pool
    pub deposit_block_score: u64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            lur_score_sensitivity: 5_000_000,
            lur_score_weight: 700_000,
            ndr_score_weight: 300_000,
            deposit_block_score: 250_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueParams {
    pub min_deposit_queue_length: u32,
    pub min_withdrawal_queue_length: u32,
    /// Ceiling at which the deposit queue counts as full
    pub target_deposit_queue_length: u32,
    /// Ceiling at which the withdrawal queue counts as full
    pub target_withdrawal_queue_length: u32,
    pub min_deposit_amount: u128,
    pub min_withdrawal_amount: u128,
}

impl Default for QueueParams {
    fn default() -> Self {
        Self {
            min_deposit_queue_length: 0,
            min_withdrawal_queue_length: 0,
            target_deposit_queue_length: 10,
            target_withdrawal_queue_length: 10,
            min_deposit_amount: 100 * ONE_TOKEN,
            min_withdrawal_amount: 99 * ONE_TOKEN,
        }
    }
}

/// Everything governance can tune on a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub target_balance: u128,
    pub liquidity_cap: u128,
    pub fees: FeeBps,
    pub score: ScoreParams,
    pub queue: QueueParams,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            target_balance: 0,
            liquidity_cap: 100_000_000 * ONE_TOKEN,
            fees: FeeBps::default(),
            score: ScoreParams::default(),
            queue: QueueParams::default(),
        }
    }
}

/// One governance write against a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamUpdate {
    TargetBalance(u128),
    LiquidityCap(u128),
    MinDepositQueueLength(u32),
    MinWithdrawalQueueLength(u32),
    TargetDepositQueueLength(u32),
    TargetWithdrawalQueueLength(u32),
    MinDepositAmount(u128),
    MinWithdrawalAmount(u128),
    LurScoreSensitivity(u64),
    ScoresWeights { lur: u64, ndr: u64 },
    RebalancerFeeBps(u16),
    LpFeeBps(u16),
    LancaBridgeFeeBps(u16),
    DstPool { chain: ChainSelector, pool: Address },
    LancaKeeper(Address),
}

impl ParamUpdate {
    /// Name of the pool setter this update calls
    pub fn setter(&self) -> &'static str {
        match self {
            ParamUpdate::TargetBalance(_) => "setTargetBalance",
            ParamUpdate::LiquidityCap(_) => "setLiquidityCap",
            ParamUpdate::MinDepositQueueLength(_) => "setMinDepositQueueLength",
            ParamUpdate::MinWithdrawalQueueLength(_) => "setMinWithdrawalQueueLength",
            ParamUpdate::TargetDepositQueueLength(_) => "setTargetDepositQueueLength",
            ParamUpdate::TargetWithdrawalQueueLength(_) => "setTargetWithdrawalQueueLength",
            ParamUpdate::MinDepositAmount(_) => "setMinDepositAmount",
            ParamUpdate::MinWithdrawalAmount(_) => "setMinWithdrawalAmount",
            ParamUpdate::LurScoreSensitivity(_) => "setLurScoreSensitivity",
            ParamUpdate::ScoresWeights { .. } => "setScoresWeights",
            ParamUpdate::RebalancerFeeBps(_) => "setRebalancerFeeBps",
            ParamUpdate::LpFeeBps(_) => "setLpFeeBps",
            ParamUpdate::LancaBridgeFeeBps(_) => "setLancaBridgeFeeBps",
            ParamUpdate::DstPool { .. } => "setDstPool",
            ParamUpdate::LancaKeeper(_) => "setLancaKeeper",
        }
    }

    /// Apply to the parameter block. Returns false for updates that live
    /// outside `PoolParams` (routes, keeper role).
    pub fn apply_to(&self, params: &mut PoolParams) -> bool {
        match *self {
            ParamUpdate::TargetBalance(v) => params.target_balance = v,
            ParamUpdate::LiquidityCap(v) => params.liquidity_cap = v,
            ParamUpdate::MinDepositQueueLength(v) => params.queue.min_deposit_queue_length = v,
            ParamUpdate::MinWithdrawalQueueLength(v) => params.queue.min_withdrawal_queue_length = v,
            ParamUpdate::TargetDepositQueueLength(v) => params.queue.target_deposit_queue_length = v,
            ParamUpdate::TargetWithdrawalQueueLength(v) => params.queue.target_withdrawal_queue_length = v,
            ParamUpdate::MinDepositAmount(v) => params.queue.min_deposit_amount = v,
            ParamUpdate::MinWithdrawalAmount(v) => params.queue.min_withdrawal_amount = v,
            ParamUpdate::LurScoreSensitivity(v) => params.score.lur_score_sensitivity = v,
            ParamUpdate::ScoresWeights { lur, ndr } => {
                params.score.lur_score_weight = lur;
                params.score.ndr_score_weight = ndr;
            }
            ParamUpdate::RebalancerFeeBps(v) => params.fees.rebalancer_fee_bps = v,
            ParamUpdate::LpFeeBps(v) => params.fees.lp_fee_bps = v,
            ParamUpdate::LancaBridgeFeeBps(v) => params.fees.lanca_bridge_fee_bps = v,
            ParamUpdate::DstPool { .. } | ParamUpdate::LancaKeeper(_) => return false,
        }
        true
    }

    /// Updates needed to move `current` to `desired`, skipping equal fields
    pub fn diff(current: &PoolParams, desired: &PoolParams) -> Vec<ParamUpdate> {
        let mut out = Vec::new();
        if current.target_balance != desired.target_balance {
            out.push(ParamUpdate::TargetBalance(desired.target_balance));
        }
        if current.liquidity_cap != desired.liquidity_cap {
            out.push(ParamUpdate::LiquidityCap(desired.liquidity_cap));
        }
        let (cq, dq) = (&current.queue, &desired.queue);
        if cq.min_deposit_queue_length != dq.min_deposit_queue_length {
            out.push(ParamUpdate::MinDepositQueueLength(dq.min_deposit_queue_length));
        }
        if cq.min_withdrawal_queue_length != dq.min_withdrawal_queue_length {
            out.push(ParamUpdate::MinWithdrawalQueueLength(dq.min_withdrawal_queue_length));
        }
        if cq.target_deposit_queue_length != dq.target_deposit_queue_length {
            out.push(ParamUpdate::TargetDepositQueueLength(dq.target_deposit_queue_length));
        }
        if cq.target_withdrawal_queue_length != dq.target_withdrawal_queue_length {
            out.push(ParamUpdate::TargetWithdrawalQueueLength(dq.target_withdrawal_queue_length));
        }
        if cq.min_deposit_amount != dq.min_deposit_amount {
            out.push(ParamUpdate::MinDepositAmount(dq.min_deposit_amount));
        }
        if cq.min_withdrawal_amount != dq.min_withdrawal_amount {
            out.push(ParamUpdate::MinWithdrawalAmount(dq.min_withdrawal_amount));
        }
        let (cs, ds) = (&current.score, &desired.score);
        if cs.lur_score_sensitivity != ds.lur_score_sensitivity {
            out.push(ParamUpdate::LurScoreSensitivity(ds.lur_score_sensitivity));
        }
        if cs.lur_score_weight != ds.lur_score_weight || cs.ndr_score_weight != ds.ndr_score_weight {
            out.push(ParamUpdate::ScoresWeights {
                lur: ds.lur_score_weight,
                ndr: ds.ndr_score_weight,
            });
        }
        let (cf, df) = (&current.fees, &desired.fees);
        if cf.rebalancer_fee_bps != df.rebalancer_fee_bps {
            out.push(ParamUpdate::RebalancerFeeBps(df.rebalancer_fee_bps));
        }
        if cf.lp_fee_bps != df.lp_fee_bps {
            out.push(ParamUpdate::LpFeeBps(df.lp_fee_bps));
        }
        if cf.lanca_bridge_fee_bps != df.lanca_bridge_fee_bps {
            out.push(ParamUpdate::LancaBridgeFeeBps(df.lanca_bridge_fee_bps));
        }
        out
    }
}

/// Pending deposit or withdrawal request. Immutable once enqueued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user: Address,
    pub amount: u128,
    pub enqueued_at: u64,
}

/// Inflow/outflow over the current epoch (input to NDR)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowWindow {
    pub inflow: u128,
    pub outflow: u128,
}

impl FlowWindow {
    pub fn record_inflow(&mut self, amount: u128) {
        self.inflow = add_u128(self.inflow, amount);
    }

    pub fn record_outflow(&mut self, amount: u128) {
        self.outflow = add_u128(self.outflow, amount);
    }
}

/// Balance and queue occupancy of one pool as of one block.
/// Deficit and surplus are derived here, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub chain: ChainSelector,
    pub block: u64,
    pub active_balance: u128,
    pub target_balance: u128,
    pub deposit_queue_length: u32,
    pub withdrawal_queue_length: u32,
}

impl PoolSnapshot {
    pub fn deficit(&self) -> u128 {
        sub_u128(self.target_balance, self.active_balance)
    }

    pub fn surplus(&self) -> u128 {
        sub_u128(self.active_balance, self.target_balance)
    }

    /// Absolute distance from target
    pub fn imbalance(&self) -> u128 {
        abs_diff(self.active_balance, self.target_balance)
    }

    pub fn is_balanced(&self) -> bool {
        self.active_balance == self.target_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(active: u128, target: u128) -> PoolSnapshot {
        PoolSnapshot {
            chain: 1,
            block: 7,
            active_balance: active,
            target_balance: target,
            deposit_queue_length: 0,
            withdrawal_queue_length: 0,
        }
    }

    #[test]
    fn test_deficit_and_surplus_are_exclusive() {
        let s = snap(40, 100);
        assert_eq!(s.deficit(), 60);
        assert_eq!(s.surplus(), 0);

        let s = snap(130, 100);
        assert_eq!(s.deficit(), 0);
        assert_eq!(s.surplus(), 30);
        assert_eq!(s.imbalance(), 30);

        assert!(snap(5, 5).is_balanced());
    }

    #[test]
    fn test_fee_field_checks() {
        let fees = FeeBps { rebalancer_fee_bps: 0, lp_fee_bps: 5, lanca_bridge_fee_bps: 20_000 };
        assert_eq!(fees.zero_fields(), vec!["rebalancer_fee_bps"]);
        assert_eq!(fees.out_of_range_fields(), vec!["lanca_bridge_fee_bps"]);
        assert!(FeeBps::default().zero_fields().is_empty());
    }

    #[test]
    fn test_defaults_match_deployment_values() {
        let p = PoolParams::default();
        assert_eq!(p.liquidity_cap, 100_000_000_000_000);
        assert_eq!(p.queue.min_deposit_amount, 100_000_000);
        assert_eq!(p.queue.min_withdrawal_amount, 99_000_000);
        assert_eq!(p.score.lur_score_weight + p.score.ndr_score_weight, SCALE as u64);
    }

    #[test]
    fn test_param_diff_only_lists_changes() {
        let current = PoolParams::default();
        assert!(ParamUpdate::diff(&current, &current).is_empty());

        let mut desired = current;
        desired.target_balance = 42;
        desired.fees.lp_fee_bps = 7;
        desired.score.ndr_score_weight = 1;
        let updates = ParamUpdate::diff(&current, &desired);
        assert_eq!(
            updates,
            vec![
                ParamUpdate::TargetBalance(42),
                ParamUpdate::ScoresWeights { lur: 700_000, ndr: 1 },
                ParamUpdate::LpFeeBps(7),
            ]
        );

        let mut applied = current;
        for u in &updates {
            assert!(u.apply_to(&mut applied));
        }
        assert_eq!(applied, desired);
        assert!(!ParamUpdate::LancaKeeper(Address::ZERO).apply_to(&mut applied));
    }
}
