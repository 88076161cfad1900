//! Rebalancer scenarios against the running orchestrator

use lanca_integration_tests::*;
use lanca_keeper::client::{PoolClient, TxStatus};
use lanca_keeper::local::LocalChain;
use lanca_keeper::orchestrator::Services;
use lanca_keeper::reconciler::{Rebalancer, ReconcileOutcome};
use lanca_keeper::KeeperError;
use pool_model::{Address, EventKind, EventTag, ParamUpdate, ONE_TOKEN};
use std::sync::Arc;
use std::time::Duration;

/// Scenario 1: Deficit fill
///
/// Operator holds 100 USDC, child target set 100 USDC above its active
/// balance. Expect `DeficitFilled` and a zero deficit afterwards.
#[tokio::test]
async fn test_scenario_deficit_filled() {
    let mut net = TestNetwork::new();
    let mut rx = net.subscribe();

    net.mint_liquidity(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 100 * ONE_TOKEN).await.unwrap();
    net.start(Services { keeper: false, rebalancer: true });

    let event = net.wait_for(&mut rx, CHILD, EventTag::DeficitFilled).await.unwrap();
    net.stop().await;

    match event.kind {
        EventKind::DeficitFilled { filler, amount, fee, iou_minted } => {
            assert_eq!(filler, net.operator());
            assert_eq!(amount, 100 * ONE_TOKEN);
            assert_eq!(iou_minted, amount - fee);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 0);
}

/// Scenario 2: Surplus take
///
/// Operator holds 100 IOU, child holds 100 USDC with target 0. Expect
/// `SurplusTaken` and a zero surplus afterwards.
#[tokio::test]
async fn test_scenario_surplus_taken() {
    let mut net = TestNetwork::new();
    let mut rx = net.subscribe();

    net.mint_debt(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.mint_liquidity(CHILD, net.pool_address(CHILD), 100 * ONE_TOKEN).await.unwrap();
    net.set_param(CHILD, ParamUpdate::TargetBalance(0)).await.unwrap();
    net.start(Services { keeper: false, rebalancer: true });

    let event = net.wait_for(&mut rx, CHILD, EventTag::SurplusTaken).await.unwrap();
    net.stop().await;

    assert!(matches!(event.kind, EventKind::SurplusTaken { amount, .. } if amount == 100 * ONE_TOKEN));
    assert_eq!(net.view(CHILD).await.unwrap().surplus(), 0);

    let network = net.local.network().await;
    assert_eq!(network.debt_balance(CHILD, &net.operator()).unwrap(), 0);
    assert_eq!(network.fee_reserve(CHILD).unwrap(), 50_000);
}

/// Balanced pools see no transactions, however many cycles run
#[tokio::test]
async fn test_balanced_network_is_idempotent() {
    let net = TestNetwork::new();
    net.mint_liquidity(CHILD, net.operator(), 1_000 * ONE_TOKEN).await.unwrap();
    net.mint_debt(CHILD, net.operator(), 1_000 * ONE_TOKEN).await.unwrap();

    for _ in 0..5 {
        let report = net.orchestrator.rebalancer_cycle().await;
        assert!(report.is_clean());
        assert_eq!(report.actions, 0);
    }
    assert_eq!(net.submitted(), 0);
}

/// A corrected pool is not corrected again
#[tokio::test]
async fn test_repeat_cycles_correct_once() {
    let net = TestNetwork::new();
    net.mint_liquidity(CHILD, net.operator(), 500 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 40 * ONE_TOKEN).await.unwrap();

    assert_eq!(net.orchestrator.rebalancer_cycle().await.actions, 1);
    for _ in 0..3 {
        assert_eq!(net.orchestrator.rebalancer_cycle().await.actions, 0);
    }
    assert_eq!(net.submitted(), 1);
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 0);
}

/// Partial funds fill what they can; the rest waits for more funds
#[tokio::test]
async fn test_partial_fill_leaves_remainder() {
    let net = TestNetwork::new();
    net.mint_liquidity(CHILD, net.operator(), 30 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 100 * ONE_TOKEN).await.unwrap();

    let report = net.orchestrator.rebalancer_cycle().await;
    assert_eq!(report.actions, 1);
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 70 * ONE_TOKEN);

    net.mint_liquidity(CHILD, net.operator(), 70 * ONE_TOKEN).await.unwrap();
    net.orchestrator.rebalancer_cycle().await;
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 0);
}

/// One-sided routes block child corrections with `RouteNotConfigured`
#[tokio::test]
async fn test_asymmetric_route_blocks_child() {
    let net = TestNetwork::new();
    net.mint_liquidity(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 100 * ONE_TOKEN).await.unwrap();
    net.set_param(PARENT, ParamUpdate::DstPool { chain: CHILD, pool: Address::from_low_u64(0xbad) })
        .await
        .unwrap();

    let report = net.orchestrator.rebalancer_cycle().await;
    assert_eq!(report.actions, 0);
    assert_eq!(report.failures.len(), 1);
    let (chain, err) = &report.failures[0];
    assert_eq!(*chain, CHILD);
    assert!(matches!(err, KeeperError::RouteNotConfigured { src: CHILD, dst: PARENT, .. }));
    assert!(err.is_retryable());
    assert_eq!(net.submitted(), 0);

    net.set_param(PARENT, ParamUpdate::DstPool { chain: CHILD, pool: net.pool_address(CHILD) })
        .await
        .unwrap();
    assert_eq!(net.orchestrator.rebalancer_cycle().await.actions, 1);
}

/// An unreachable pool is skipped while the others are still corrected
#[tokio::test]
async fn test_unobservable_pool_does_not_block_others() {
    let net = TestNetwork::new();
    net.mint_liquidity(PARENT, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(PARENT, 25 * ONE_TOKEN).await.unwrap();
    net.mint_liquidity(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 25 * ONE_TOKEN).await.unwrap();
    net.local.set_unobservable(CHILD, true).await;

    let report = net.orchestrator.rebalancer_cycle().await;
    assert_eq!(report.actions, 1);
    assert!(matches!(report.failures[0].1, KeeperError::Unobservable { chain: CHILD, .. }));
    assert_eq!(net.view(PARENT).await.unwrap().deficit(), 0);
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 25 * ONE_TOKEN);

    net.local.set_unobservable(CHILD, false).await;
    net.orchestrator.rebalancer_cycle().await;
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 0);
}

/// Failed submissions are transient and retried next cycle
#[tokio::test]
async fn test_failed_submit_is_retried() {
    let net = TestNetwork::new();
    net.mint_liquidity(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 10 * ONE_TOKEN).await.unwrap();
    net.local.set_failing_submits(CHILD, true).await;

    let report = net.orchestrator.rebalancer_cycle().await;
    assert!(matches!(report.failures[0].1, KeeperError::Transient { chain: CHILD, .. }));

    net.local.set_failing_submits(CHILD, false).await;
    assert_eq!(net.orchestrator.rebalancer_cycle().await.actions, 1);
}

/// A second filler racing a settled correction reverts instead of overshooting
#[tokio::test]
async fn test_racing_filler_reverts() {
    let net = TestNetwork::new();
    let rival = Address::from_low_u64(0xf111);
    net.mint_liquidity(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.mint_liquidity(CHILD, rival, 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 60 * ONE_TOKEN).await.unwrap();

    net.local
        .apply(|n| n.fill_deficit(CHILD, rival, 60 * ONE_TOKEN))
        .await
        .unwrap();
    let late = net.local.apply(|n| n.fill_deficit(CHILD, rival, 60 * ONE_TOKEN)).await;
    assert!(late.is_err());

    let report = net.orchestrator.rebalancer_cycle().await;
    assert_eq!(report.actions, 0);
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 0);
}

/// With deferred confirmations the pending fill is not resubmitted
#[tokio::test]
async fn test_pending_correction_not_duplicated() {
    let config = test_config();
    let local = LocalChain::from_config(&config)
        .unwrap()
        .with_latency(Duration::from_millis(30))
        .with_deferred_confirmations(true);
    let net = TestNetwork::with_local(config, local);
    net.mint_liquidity(CHILD, net.operator(), 100 * ONE_TOKEN).await.unwrap();
    net.set_target_above_active(CHILD, 50 * ONE_TOKEN).await.unwrap();

    let ctx = net.orchestrator.context();
    let first = Rebalancer::new(Arc::clone(ctx));
    let outcome = first.reconcile_pool(CHILD).await.unwrap();
    let tx = match outcome {
        ReconcileOutcome::Submitted { tx, .. } => tx,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(first.reconcile_pool(CHILD).await.unwrap(), ReconcileOutcome::InFlight);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(net.local.tx_status(CHILD, tx).await.unwrap(), TxStatus::Confirmed);
    assert_eq!(net.submitted(), 1);
    assert_eq!(net.view(CHILD).await.unwrap().deficit(), 0);
}
