//! Generators for arbitrary pool state (for Kani)

#[cfg(kani)]
use kani::any;
use pool_model::reconcile::OperatorFunds;
use pool_model::state::*;

// Small bounds keep the SAT problems tractable
pub const MAX_BALANCE: u128 = 1_000;

#[cfg(kani)]
pub fn any_snapshot() -> PoolSnapshot {
    let active: u16 = any();
    let target: u16 = any();
    let dep_len: u8 = any();
    let wd_len: u8 = any();

    PoolSnapshot {
        chain: 2,
        block: 1,
        active_balance: (active as u128) % MAX_BALANCE,
        target_balance: (target as u128) % MAX_BALANCE,
        deposit_queue_length: dep_len as u32,
        withdrawal_queue_length: wd_len as u32,
    }
}

#[cfg(kani)]
pub fn any_fee_bps() -> u16 {
    let raw: u16 = any();
    raw % 10_001
}

#[cfg(kani)]
pub fn any_funds() -> OperatorFunds {
    let liquidity: u16 = any();
    let debt: u16 = any();
    OperatorFunds {
        liquidity: (liquidity as u128) % (MAX_BALANCE * 2),
        debt: (debt as u128) % (MAX_BALANCE * 2),
    }
}

#[cfg(kani)]
pub fn any_queue_params() -> QueueParams {
    let min_dep: u8 = any();
    let min_wd: u8 = any();
    QueueParams {
        min_deposit_queue_length: min_dep as u32,
        min_withdrawal_queue_length: min_wd as u32,
        ..QueueParams::default()
    }
}
