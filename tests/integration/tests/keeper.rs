//! Keeper scenarios against the running orchestrator

use lanca_integration_tests::*;
use lanca_keeper::local::LocalChain;
use lanca_keeper::orchestrator::Services;
use lanca_keeper::KeeperError;
use pool_model::queue::batch_readiness;
use pool_model::{EventKind, EventTag, ParamUpdate, QueueParams, ONE_TOKEN};
use std::time::Duration;

/// Scenario 3: Child snapshot
///
/// Parent queues forced full. Expect the child to emit `SnapshotSent`.
#[tokio::test]
async fn test_scenario_snapshot_sent_when_parent_full() {
    let mut net = TestNetwork::new();
    let mut rx = net.subscribe();

    net.fill_parent_queues().await.unwrap();
    net.start(Services { keeper: true, rebalancer: false });

    let event = net.wait_for(&mut rx, CHILD, EventTag::SnapshotSent).await.unwrap();
    match event.kind {
        EventKind::SnapshotSent { parent_chain, epoch, .. } => {
            assert_eq!(parent_chain, PARENT);
            assert_eq!(epoch, 0);
        }
        other => panic!("unexpected event {:?}", other),
    }

    // The parent settles once the snapshot is in
    net.wait_for(&mut rx, PARENT, EventTag::DepositWithdrawTriggered).await.unwrap();
    net.stop().await;
    assert_eq!(net.view(PARENT).await.unwrap().epoch, 1);
}

/// Scenario 4: Batch trigger
///
/// Parent marked ready (queued deposit, every snapshot in). Expect
/// `DepositWithdrawTriggered`.
#[tokio::test]
async fn test_scenario_deposit_withdraw_triggered() {
    let mut net = TestNetwork::new();
    let mut rx = net.subscribe();

    net.set_ready_to_trigger().await.unwrap();
    let before = net.submitted();
    net.start(Services { keeper: true, rebalancer: false });

    let event = net.wait_for(&mut rx, PARENT, EventTag::DepositWithdrawTriggered).await.unwrap();
    net.stop().await;

    assert!(matches!(event.kind, EventKind::DepositWithdrawTriggered { epoch: 0, deposits: 1, .. }));
    assert!(net.submitted() > before);

    let view = net.view(PARENT).await.unwrap();
    assert_eq!(view.snapshot.deposit_queue_length, 0);
    assert_eq!(view.snapshot.active_balance, DEPOSIT);
}

/// Settled withdrawals are paid out once they fit in active balance
#[tokio::test]
async fn test_pending_withdrawals_processed() {
    let mut net = TestNetwork::new();
    let mut rx = net.subscribe();

    let lp = net.deposit(DEPOSIT).await.unwrap();
    net.orchestrator.keeper_cycle().await;
    net.orchestrator.keeper_cycle().await;
    assert_eq!(net.local.network().await.lp_balance(PARENT, &lp).unwrap(), DEPOSIT);

    net.withdraw(lp, DEPOSIT).await.unwrap();
    net.start(Services { keeper: true, rebalancer: false });

    let event = net.wait_for(&mut rx, PARENT, EventTag::PendingWithdrawalsProcessed).await.unwrap();
    net.stop().await;

    assert!(matches!(event.kind, EventKind::PendingWithdrawalsProcessed { count: 1, total } if total == DEPOSIT));
    let network = net.local.network().await;
    assert_eq!(network.liquidity_balance(PARENT, &lp).unwrap(), DEPOSIT);
    assert_eq!(network.lp_balance(PARENT, &lp).unwrap(), 0);
}

/// Withdrawals larger than active balance wait for liquidity
#[tokio::test]
async fn test_withdrawals_wait_for_liquidity() {
    let mut net = TestNetwork::new();
    let lp = net.deposit(DEPOSIT).await.unwrap();
    net.orchestrator.keeper_cycle().await;
    net.orchestrator.keeper_cycle().await;

    // Child reports liquidity the parent does not hold, inflating the price
    net.mint_liquidity(CHILD, net.pool_address(CHILD), DEPOSIT).await.unwrap();
    net.withdraw(lp, DEPOSIT).await.unwrap();
    for _ in 0..3 {
        net.orchestrator.keeper_cycle().await;
    }
    let view = net.view(PARENT).await.unwrap();
    assert_eq!(view.pending_withdrawal_count, 1);
    assert_eq!(view.pending_withdrawal_total, 2 * DEPOSIT);
    assert!(!view.pending_withdrawals_ready());

    net.mint_liquidity(PARENT, net.pool_address(PARENT), DEPOSIT).await.unwrap();
    let report = net.orchestrator.keeper_cycle().await;
    assert_eq!(report.actions, 1);
    assert_eq!(net.view(PARENT).await.unwrap().pending_withdrawal_count, 0);
}

/// Minimum queue lengths gate the batch; zero is always eligible
#[tokio::test]
async fn test_batch_threshold() {
    assert!(batch_readiness(0, 0, &QueueParams::default(), false).is_ready());

    let mut net = TestNetwork::new();
    net.set_param(PARENT, ParamUpdate::MinDepositQueueLength(3)).await.unwrap();
    net.set_param(PARENT, ParamUpdate::MinWithdrawalQueueLength(3)).await.unwrap();
    net.deposit(DEPOSIT).await.unwrap();
    net.deposit(DEPOSIT).await.unwrap();

    for _ in 0..3 {
        let report = net.orchestrator.keeper_cycle().await;
        assert_eq!(report.actions, 0);
    }
    assert_eq!(net.view(PARENT).await.unwrap().epoch, 0);

    net.deposit(DEPOSIT).await.unwrap();
    net.orchestrator.keeper_cycle().await;
    net.orchestrator.keeper_cycle().await;
    let view = net.view(PARENT).await.unwrap();
    assert_eq!(view.epoch, 1);
    assert_eq!(view.snapshot.active_balance, 3 * DEPOSIT);
}

/// LP is priced against network liquidity, including child snapshots
#[tokio::test]
async fn test_second_epoch_prices_against_network() {
    let mut net = TestNetwork::new();
    let first = net.deposit(DEPOSIT).await.unwrap();
    net.orchestrator.keeper_cycle().await;
    net.orchestrator.keeper_cycle().await;

    // Child doubles network liquidity before the next batch
    net.mint_liquidity(CHILD, net.pool_address(CHILD), DEPOSIT).await.unwrap();
    let second = net.deposit(DEPOSIT).await.unwrap();
    net.orchestrator.keeper_cycle().await;
    net.orchestrator.keeper_cycle().await;

    let network = net.local.network().await;
    assert_eq!(network.lp_balance(PARENT, &first).unwrap(), DEPOSIT);
    assert_eq!(network.lp_balance(PARENT, &second).unwrap(), DEPOSIT / 2);
}

/// Outstanding LP with no network liquidity fails the batch
#[tokio::test]
async fn test_unpriceable_batch_is_fatal() {
    let mut net = TestNetwork::new();
    let lp = net.deposit(DEPOSIT).await.unwrap();
    net.orchestrator.keeper_cycle().await;
    net.orchestrator.keeper_cycle().await;

    // Drain the parent so network liquidity is zero while LP is outstanding
    let parent_pool = net.pool_address(PARENT);
    net.local
        .network()
        .await
        .set_liquidity_balance(PARENT, parent_pool, 0)
        .unwrap();
    net.withdraw(lp, DEPOSIT).await.unwrap();

    let mut failure = None;
    for _ in 0..2 {
        let report = net.orchestrator.keeper_cycle().await;
        if let Some((chain, e)) = report.failures.into_iter().next() {
            failure = Some((chain, e));
            break;
        }
    }
    let (chain, err) = failure.expect("batch should fail");
    assert_eq!(chain, PARENT);
    assert!(matches!(err, KeeperError::BatchFailed { .. }));
    assert!(err.is_fatal());
}

/// Deposits above the liquidity cap stay queued
#[tokio::test]
async fn test_liquidity_cap_holds_deposits() {
    let mut net = TestNetwork::new();
    net.set_param(PARENT, ParamUpdate::LiquidityCap(150 * ONE_TOKEN)).await.unwrap();
    net.deposit(DEPOSIT).await.unwrap();
    net.deposit(DEPOSIT).await.unwrap();

    for _ in 0..3 {
        net.orchestrator.keeper_cycle().await;
    }
    let view = net.view(PARENT).await.unwrap();
    assert_eq!(view.epoch, 0);
    assert_eq!(view.snapshot.deposit_queue_length, 2);
    assert!(view.cap_reached());
}

/// Unconfirmed snapshot and trigger calls are tracked, not resent or failed
#[tokio::test]
async fn test_deferred_keeper_calls_settle_once() {
    let config = test_config();
    let local = LocalChain::from_config(&config)
        .unwrap()
        .with_latency(Duration::from_millis(30))
        .with_deferred_confirmations(true);
    let mut net = TestNetwork::with_local(config, local);
    net.deposit(DEPOSIT).await.unwrap();

    for _ in 0..5 {
        let report = net.orchestrator.keeper_cycle().await;
        assert!(report.is_clean(), "failures: {:?}", report.failures);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    let view = net.view(PARENT).await.unwrap();
    assert_eq!(view.epoch, 1);
    assert_eq!(view.snapshot.active_balance, DEPOSIT);
    assert_eq!(net.submitted(), 2);
}
