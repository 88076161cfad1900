//! Kani proofs for the correction and queue invariants

use kani::any;
use pool_model::helpers::*;
use pool_model::math::*;
use pool_model::queue::*;
use pool_model::reconcile::*;
use pool_model::score::*;
use crate::{adversary::*, generators::*, sanitizer::*};

/// Deficit and surplus are never both non-zero
#[kani::proof]
fn deficit_and_surplus_exclusive() {
    let s = any_snapshot().sanitize();
    kani::assert(deficit_surplus_exclusive(&s), "deficit and surplus must be exclusive");
}

/// A planned correction never overshoots the target and, when fully funded,
/// closes the imbalance exactly
#[kani::proof]
fn correction_is_exact_and_bounded() {
    let s = any_snapshot().sanitize();
    let bps = any_fee_bps();
    let funds = any_funds().sanitize();

    let correction = plan_correction(&s, bps, funds);
    if let Some(after) = land(s, correction) {
        kani::assert(no_overshoot(&s, &after), "correction must not overshoot");
        if let Correction::Fill(plan) = correction {
            kani::assert(fill_exact(&s, &after, plan.amount), "fill moves active by exactly amount");
            kani::assert(plan.fee + plan.iou_minted == plan.amount, "fill fee accounting");
            if funds.liquidity >= s.deficit() {
                kani::assert(after.deficit() == 0, "funded fill closes the deficit");
            }
        }
        if let Correction::Sweep(plan) = correction {
            kani::assert(sweep_exact(&s, &after, plan.amount), "sweep moves active by exactly amount");
            kani::assert(plan.fee + plan.payout == plan.amount, "sweep fee accounting");
            if funds.debt >= s.surplus() {
                kani::assert(after.surplus() == 0, "funded sweep closes the surplus");
            }
        }
    } else {
        kani::assert(false, "a fresh plan must always land");
    }
}

/// Replanning against a balanced pool issues nothing
#[kani::proof]
fn balanced_pool_is_idempotent() {
    let mut s = any_snapshot().sanitize();
    s.target_balance = s.active_balance;
    let correction = plan_correction(&s, any_fee_bps(), any_funds().sanitize());
    kani::assert(correction == Correction::Skip(SkipReason::Balanced), "no action on balanced pool");
}

/// Racing corrections never push a pool past its target, and a plan
/// recomputed after the race still lands
#[kani::proof]
#[kani::unwind(5)]
fn racing_fillers_never_overshoot() {
    let mut s = any_snapshot().sanitize();
    let mut steps: u8 = any();
    steps = (steps % MAX_STEPS) + 1;

    for _ in 0..steps {
        let step: Step = any();
        let before = s;
        s = apply_step(s, step);
        if !matches!(step, Step::Retarget(_)) {
            kani::assert(no_overshoot(&before, &s), "racing correction must not overshoot");
        }
    }

    let fresh = plan_correction(&s, any_fee_bps(), any_funds().sanitize());
    kani::assert(land(s, fresh).is_some(), "recomputed plan lands");
}

/// Fee never exceeds the amount it is charged on
#[kani::proof]
fn fee_bounded_by_amount() {
    let amount: u64 = any();
    let bps = any_fee_bps();
    kani::assert(bps_of(amount as u128, bps) <= amount as u128, "fee <= amount");
}

/// Dynamic fee stays within [base, 2 * base] and 100%
#[kani::proof]
fn dynamic_fee_bounded() {
    let base = any_fee_bps();
    let composite: u32 = any();
    let fee = dynamic_fee_bps(base, composite as u128);
    kani::assert(fee >= base.min(10_000), "fee at least base");
    kani::assert(fee as u32 <= (base as u32) * 2, "fee at most double");
    kani::assert(fee <= 10_000, "fee at most 100%");
}

/// Zero minimum queue length is always eligible
#[kani::proof]
fn zero_minimum_always_ready() {
    let mut params = any_queue_params();
    params.min_deposit_queue_length = 0;
    let dep_len: u8 = any();
    let wd_len: u8 = any();
    let r = batch_readiness(dep_len as u32, wd_len as u32, &params, false);
    kani::assert(r.deposits && r.is_ready(), "min zero must be eligible");
}

/// A second drain while one is in progress is rejected
#[kani::proof]
fn drain_is_exclusive() {
    let mut q = PoolQueues::new();
    let include: bool = any();
    let first = q.drain_batch(include);
    kani::assert(first.is_ok(), "first drain succeeds");
    let second = q.drain_batch(any());
    kani::assert(second.is_err(), "second drain rejected");
}

/// LUR score stays within (0, SCALE]
#[kani::proof]
fn lur_score_bounded() {
    let active: u32 = any();
    let target: u32 = any();
    let sens: u32 = any();
    let score = lur_score(lur_raw(active as u128, target as u128), sens as u64);
    kani::assert(score <= SCALE, "lur score at most 1.0");
}
