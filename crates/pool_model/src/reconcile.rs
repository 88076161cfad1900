//! Deficit/surplus correction planning
//!
//! Pricing is 1:1 minus the rebalancer fee:
//! - fill: the filler pays `amount` liquidity, receives `amount - fee` IOU,
//!   pool active balance rises by exactly `amount`
//! - sweep: the sweeper burns `amount` IOU, receives `amount - fee` liquidity,
//!   `fee` moves to the pool's fee reserve, active balance falls by exactly `amount`
//!
//! Plans are always recomputed from the current snapshot, so retrying a plan
//! after a revert or a duplicate trigger never over-corrects.

use crate::math::*;
use crate::state::*;

/// Liquidity and IOU the operator can commit this cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperatorFunds {
    pub liquidity: u128,
    pub debt: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillPlan {
    pub amount: u128,
    pub fee: u128,
    /// IOU minted to the filler
    pub iou_minted: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepPlan {
    pub amount: u128,
    pub fee: u128,
    /// Liquidity paid out to the sweeper
    pub payout: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Balanced,
    NoOperatorLiquidity,
    NoOperatorDebt,
    /// Fee swallows the whole correction
    NetNotPositive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correction {
    Fill(FillPlan),
    Sweep(SweepPlan),
    Skip(SkipReason),
}

/// (fee, iou minted) for filling `amount`
pub fn fill_terms(amount: u128, rebalancer_fee_bps: u16) -> (u128, u128) {
    let fee = bps_of(amount, rebalancer_fee_bps);
    (fee, sub_u128(amount, fee))
}

/// (fee, liquidity paid out) for sweeping `amount`
pub fn sweep_terms(amount: u128, rebalancer_fee_bps: u16) -> (u128, u128) {
    let fee = bps_of(amount, rebalancer_fee_bps);
    (fee, sub_u128(amount, fee))
}

/// At most one corrective action for the snapshot
pub fn plan_correction(snapshot: &PoolSnapshot, rebalancer_fee_bps: u16, funds: OperatorFunds) -> Correction {
    let deficit = snapshot.deficit();
    if deficit > 0 {
        let amount = deficit.min(funds.liquidity);
        if amount == 0 {
            return Correction::Skip(SkipReason::NoOperatorLiquidity);
        }
        let (fee, iou_minted) = fill_terms(amount, rebalancer_fee_bps);
        if iou_minted == 0 {
            return Correction::Skip(SkipReason::NetNotPositive);
        }
        return Correction::Fill(FillPlan { amount, fee, iou_minted });
    }

    let surplus = snapshot.surplus();
    if surplus > 0 {
        let amount = surplus.min(funds.debt);
        if amount == 0 {
            return Correction::Skip(SkipReason::NoOperatorDebt);
        }
        let (fee, payout) = sweep_terms(amount, rebalancer_fee_bps);
        if payout == 0 {
            return Correction::Skip(SkipReason::NetNotPositive);
        }
        return Correction::Sweep(SweepPlan { amount, fee, payout });
    }

    Correction::Skip(SkipReason::Balanced)
}
