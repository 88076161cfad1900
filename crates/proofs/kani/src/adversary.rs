//! Adversarial step generator: racing fillers, sweepers and governance
//! target changes applied to a snapshot

#[cfg(kani)]
use kani::any;
use pool_model::math::*;
use pool_model::reconcile::*;
use pool_model::state::*;

#[derive(Clone, Copy, Debug)]
pub enum Step {
    /// Another filler lands a fill of the given size first
    RacingFill(u128),
    /// Another sweeper lands a sweep of the given size first
    RacingSweep(u128),
    /// Governance moves the target
    Retarget(u128),
}

#[cfg(kani)]
impl kani::Arbitrary for Step {
    fn any() -> Self {
        let choice: u8 = any();
        let amount: u8 = any();
        match choice % 3 {
            0 => Step::RacingFill(amount as u128),
            1 => Step::RacingSweep(amount as u128),
            _ => Step::Retarget(amount as u128),
        }
    }
}

/// Apply a step the way the ledger would: corrections larger than the
/// outstanding imbalance are rejected and leave the snapshot unchanged
pub fn apply_step(mut s: PoolSnapshot, step: Step) -> PoolSnapshot {
    match step {
        Step::RacingFill(amount) => {
            if amount > 0 && amount <= s.deficit() {
                s.active_balance = add_u128(s.active_balance, amount);
            }
        }
        Step::RacingSweep(amount) => {
            if amount > 0 && amount <= s.surplus() {
                s.active_balance = sub_u128(s.active_balance, amount);
            }
        }
        Step::Retarget(target) => s.target_balance = target,
    }
    s.block += 1;
    s
}

/// Land a planned correction against the current snapshot. Returns `None`
/// when the ledger would revert it.
pub fn land(s: PoolSnapshot, correction: Correction) -> Option<PoolSnapshot> {
    match correction {
        Correction::Fill(plan) if plan.amount <= s.deficit() => Some(apply_step(s, Step::RacingFill(plan.amount))),
        Correction::Sweep(plan) if plan.amount <= s.surplus() => Some(apply_step(s, Step::RacingSweep(plan.amount))),
        Correction::Skip(_) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(active: u128, target: u128) -> PoolSnapshot {
        PoolSnapshot {
            chain: 2,
            block: 1,
            active_balance: active,
            target_balance: target,
            deposit_queue_length: 0,
            withdrawal_queue_length: 0,
        }
    }

    #[test]
    fn test_stale_plan_reverts_after_race() {
        let s = snap(0, 100);
        let stale = plan_correction(&s, 5, OperatorFunds { liquidity: 100, debt: 0 });
        let raced = apply_step(s, Step::RacingFill(30));
        assert_eq!(raced.deficit(), 70);
        assert_eq!(land(raced, stale), None);

        let fresh = plan_correction(&raced, 5, OperatorFunds { liquidity: 100, debt: 0 });
        let landed = land(raced, fresh).unwrap();
        assert_eq!(landed.deficit(), 0);
    }
}
