//! LUR / NDR health scoring
//!
//! Pure functions over a pool snapshot and its flow window. All scores are
//! fixed point with `SCALE` as 1.0.

use crate::math::*;
use crate::state::*;
use thiserror::Error;

/// LUR raw is capped at 100x target
pub const MAX_LUR_RAW: u128 = 100 * SCALE;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScoreError {
    #[error("lur and ndr score weights are both zero")]
    ZeroWeights,
}

/// Full score breakdown for one pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scores {
    pub lur_raw: u128,
    pub lur_score: u128,
    pub ndr_raw: i128,
    pub ndr_score: u128,
    pub composite: u128,
}

/// active / target. A zero target is neutral (1.0).
pub fn lur_raw(active: u128, target: u128) -> u128 {
    if target == 0 {
        return SCALE;
    }
    mul_div(active, SCALE, target).min(MAX_LUR_RAW)
}

/// Rational sigmoid around 1.0: SCALE at perfect balance, falling towards 0
/// as the deviation grows. Higher sensitivity falls faster.
pub fn lur_score(lur_raw: u128, sensitivity: u64) -> u128 {
    let deviation = abs_diff(lur_raw, SCALE);
    let penalty = mul_div(sensitivity as u128, deviation, SCALE);
    div_u128(mul_u128(SCALE, SCALE), add_u128(SCALE, penalty))
}

/// Net deposits / total deposits over the window, in [-SCALE, SCALE]
pub fn ndr_raw(flow: &FlowWindow) -> i128 {
    if flow.inflow == 0 {
        return if flow.outflow == 0 { 0 } else { -(SCALE as i128) };
    }
    if flow.inflow >= flow.outflow {
        mul_div(flow.inflow - flow.outflow, SCALE, flow.inflow) as i128
    } else {
        let neg = mul_div(flow.outflow - flow.inflow, SCALE, flow.inflow).min(SCALE);
        -(neg as i128)
    }
}

/// Maps NDR raw from [-SCALE, SCALE] onto [0, SCALE]
pub fn ndr_score(ndr_raw: i128) -> u128 {
    let clamped = ndr_raw.clamp(-(SCALE as i128), SCALE as i128);
    ((clamped + SCALE as i128) / 2) as u128
}

/// Weighted blend, normalised by the weight sum
pub fn composite(lur_score: u128, ndr_score: u128, params: &ScoreParams) -> Result<u128, ScoreError> {
    let w_lur = params.lur_score_weight as u128;
    let w_ndr = params.ndr_score_weight as u128;
    let total = add_u128(w_lur, w_ndr);
    if total == 0 {
        return Err(ScoreError::ZeroWeights);
    }
    let weighted = add_u128(mul_u128(w_lur, lur_score), mul_u128(w_ndr, ndr_score));
    Ok(weighted / total)
}

pub fn score_pool(snapshot: &PoolSnapshot, flow: &FlowWindow, params: &ScoreParams) -> Result<Scores, ScoreError> {
    let lur_raw = lur_raw(snapshot.active_balance, snapshot.target_balance);
    let lur_score = lur_score(lur_raw, params.lur_score_sensitivity);
    let ndr_raw = ndr_raw(flow);
    let ndr_score = ndr_score(ndr_raw);
    let composite = composite(lur_score, ndr_score, params)?;
    Ok(Scores {
        lur_raw,
        lur_score,
        ndr_raw,
        ndr_score,
        composite,
    })
}

/// Over-concentrated pool (above target) with a composite under the block score
pub fn deposits_suppressed(scores: &Scores, params: &ScoreParams) -> bool {
    scores.lur_raw > SCALE && scores.composite < params.deposit_block_score as u128
}

/// Base fee scaled from 1x (healthy) to 2x (composite 0), capped at 100%
pub fn dynamic_fee_bps(base_bps: u16, composite: u128) -> u16 {
    let health = composite.min(SCALE);
    let multiplier = 2 * SCALE - health;
    mul_div(base_bps as u128, multiplier, SCALE).min(BPS_DENOMINATOR) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lur_raw_zero_target_is_neutral() {
        assert_eq!(lur_raw(0, 0), SCALE);
        assert_eq!(lur_raw(123, 0), SCALE);
        assert_eq!(lur_raw(50, 100), SCALE / 2);
        assert_eq!(lur_raw(u128::MAX, 1), MAX_LUR_RAW);
    }

    #[test]
    fn test_lur_score_peaks_at_balance() {
        let sens = ScoreParams::default().lur_score_sensitivity;
        assert_eq!(lur_score(SCALE, sens), SCALE);
        // deviation 0.2 with sensitivity 5 => 1 / (1 + 1.0) = 0.5
        assert_eq!(lur_score(SCALE * 8 / 10, sens), SCALE / 2);
        assert_eq!(lur_score(SCALE * 12 / 10, sens), SCALE / 2);
    }

    #[test]
    fn test_ndr() {
        let none = FlowWindow::default();
        assert_eq!(ndr_raw(&none), 0);
        assert_eq!(ndr_score(0), SCALE / 2);

        let outflow_only = FlowWindow { inflow: 0, outflow: 10 };
        assert_eq!(ndr_raw(&outflow_only), -(SCALE as i128));
        assert_eq!(ndr_score(ndr_raw(&outflow_only)), 0);

        let net = FlowWindow { inflow: 100, outflow: 25 };
        assert_eq!(ndr_raw(&net), 750_000);

        let drained = FlowWindow { inflow: 10, outflow: 1_000 };
        assert_eq!(ndr_raw(&drained), -(SCALE as i128));
    }

    #[test]
    fn test_composite_weights() {
        let params = ScoreParams::default();
        // 0.7 * 1.0 + 0.3 * 0.5
        assert_eq!(composite(SCALE, SCALE / 2, &params).unwrap(), 850_000);

        let zero = ScoreParams { lur_score_weight: 0, ndr_score_weight: 0, ..params };
        assert_eq!(composite(SCALE, SCALE, &zero), Err(ScoreError::ZeroWeights));

        // Unnormalised weights are normalised
        let doubled = ScoreParams { lur_score_weight: 1_400_000, ndr_score_weight: 600_000, ..params };
        assert_eq!(composite(SCALE, SCALE / 2, &doubled).unwrap(), 850_000);
    }

    #[test]
    fn test_deposit_suppression_requires_over_concentration() {
        let params = ScoreParams::default();
        let flow = FlowWindow { inflow: 0, outflow: 50 };
        let over = PoolSnapshot {
            chain: 1,
            block: 1,
            active_balance: 1_000,
            target_balance: 100,
            deposit_queue_length: 0,
            withdrawal_queue_length: 0,
        };
        let scores = score_pool(&over, &flow, &params).unwrap();
        assert!(deposits_suppressed(&scores, &params));

        let under = PoolSnapshot { active_balance: 10, ..over };
        let scores = score_pool(&under, &flow, &params).unwrap();
        assert!(!deposits_suppressed(&scores, &params));
    }

    #[test]
    fn test_dynamic_fee_range() {
        assert_eq!(dynamic_fee_bps(50, SCALE), 50);
        assert_eq!(dynamic_fee_bps(50, 0), 100);
        assert_eq!(dynamic_fee_bps(50, SCALE / 2), 75);
        assert_eq!(dynamic_fee_bps(9_000, 0), 10_000);
    }

    proptest! {
        #[test]
        fn prop_scores_bounded(
            active in 0u128..1_000_000_000_000,
            target in 0u128..1_000_000_000_000,
            inflow in 0u128..1_000_000_000_000,
            outflow in 0u128..1_000_000_000_000,
        ) {
            let snapshot = PoolSnapshot {
                chain: 1,
                block: 1,
                active_balance: active,
                target_balance: target,
                deposit_queue_length: 0,
                withdrawal_queue_length: 0,
            };
            let flow = FlowWindow { inflow, outflow };
            let scores = score_pool(&snapshot, &flow, &ScoreParams::default()).unwrap();
            prop_assert!(scores.lur_score <= SCALE);
            prop_assert!(scores.ndr_score <= SCALE);
            prop_assert!(scores.composite <= SCALE);
            prop_assert!(scores.ndr_raw >= -(SCALE as i128) && scores.ndr_raw <= SCALE as i128);
        }
    }
}
