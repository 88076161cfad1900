//! State space sanitizer - bounds values for Kani exploration

use crate::generators::MAX_BALANCE;
use pool_model::math::BPS_DENOMINATOR;
use pool_model::reconcile::OperatorFunds;
use pool_model::state::*;

pub const MAX_STEPS: u8 = 4;

pub trait Sanitize {
    fn sanitize(self) -> Self;
}

impl Sanitize for PoolSnapshot {
    fn sanitize(mut self) -> PoolSnapshot {
        self.active_balance %= MAX_BALANCE;
        self.target_balance %= MAX_BALANCE;
        self
    }
}

impl Sanitize for OperatorFunds {
    fn sanitize(mut self) -> OperatorFunds {
        self.liquidity %= MAX_BALANCE * 2;
        self.debt %= MAX_BALANCE * 2;
        self
    }
}

impl Sanitize for FeeBps {
    fn sanitize(mut self) -> FeeBps {
        let cap = BPS_DENOMINATOR as u16;
        self.rebalancer_fee_bps = self.rebalancer_fee_bps.min(cap);
        self.lp_fee_bps = self.lp_fee_bps.min(cap);
        self.lanca_bridge_fee_bps = self.lanca_bridge_fee_bps.min(cap);
        self
    }
}
