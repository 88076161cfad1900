//! Invariant checking helpers

use crate::math::*;
use crate::state::*;

/// At most one of deficit and surplus is non-zero
pub fn deficit_surplus_exclusive(s: &PoolSnapshot) -> bool {
    s.deficit() == 0 || s.surplus() == 0
}

/// A fill of `amount` moved active balance up by exactly `amount`
pub fn fill_exact(before: &PoolSnapshot, after: &PoolSnapshot, amount: u128) -> bool {
    after.active_balance == add_u128(before.active_balance, amount)
        && after.deficit() == sub_u128(before.deficit(), amount)
}

/// A sweep of `amount` moved active balance down by exactly `amount`
pub fn sweep_exact(before: &PoolSnapshot, after: &PoolSnapshot, amount: u128) -> bool {
    after.active_balance == sub_u128(before.active_balance, amount)
        && after.surplus() == sub_u128(before.surplus(), amount)
}

/// IOU supply moved by the minted / burned amounts and nothing else
pub fn debt_conserved(supply_before: u128, supply_after: u128, minted: u128, burned: u128) -> bool {
    add_u128(supply_before, minted) == add_u128(supply_after, burned)
}

/// A correction never pushes the pool past its target
pub fn no_overshoot(before: &PoolSnapshot, after: &PoolSnapshot) -> bool {
    if before.deficit() > 0 {
        after.surplus() == 0
    } else if before.surplus() > 0 {
        after.deficit() == 0
    } else {
        after.active_balance == before.active_balance
    }
}
