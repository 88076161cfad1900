//! Keeper triggers
//!
//! Parent: settle the queued batch once it is ready and every child has
//! reported, then pay settled withdrawals when they fit in active balance.
//! The two are independent: a failed trigger still lets withdrawals go out.
//! Child: report a snapshot when the parent is waiting on it.
//!
//! A call accepted but not yet confirmed is tracked in flight and the pool
//! is left alone until it settles.

use crate::client::{TxReceipt, TxStatus};
use crate::context::EngineContext;
use crate::error::{KeeperError, KeeperResult};
use crate::health::assess;
use crate::inflight::InFlight;
use crate::tx_builder::{build_keeper_call, PoolCall};
use pool_model::{ChainSelector, EventKind, EventTag, PoolKind, PoolView, TxHash};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeeperAction {
    BatchTriggered {
        tx: TxHash,
        epoch: u64,
        deposits: u32,
        withdrawals: u32,
    },
    WithdrawalsProcessed { tx: TxHash, count: u32, total: u128 },
    SnapshotSent { tx: TxHash, epoch: u64, balance: u128 },
    /// Accepted but unconfirmed, tracked as in flight
    Submitted { tx: TxHash, action: &'static str },
}

/// Result of one pass over a pool
#[derive(Debug, Default)]
pub struct ServiceOutcome {
    pub actions: Vec<KeeperAction>,
    /// First trigger that failed; the triggers after it still ran
    pub failure: Option<KeeperError>,
}

impl ServiceOutcome {
    fn fail(&mut self, e: KeeperError) {
        if self.failure.is_none() {
            self.failure = Some(e);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.actions.is_empty() && self.failure.is_none()
    }
}

enum Submission {
    Pending(KeeperAction),
    Landed(TxReceipt),
}

pub struct Keeper {
    ctx: Arc<EngineContext>,
}

impl Keeper {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Run every trigger that applies to the pool on `chain`
    pub async fn service_pool(&self, chain: ChainSelector) -> KeeperResult<ServiceOutcome> {
        let _guard = self.ctx.locks.lock(chain).await?;
        if self.ctx.inflight.blocks(chain, self.ctx.client.as_ref()).await {
            log::debug!("chain={} previous call still in flight, skipping", chain);
            return Ok(ServiceOutcome::default());
        }

        let view = self.ctx.accessor.observe(chain).await?;
        match view.kind {
            PoolKind::Parent => Ok(self.service_parent(view).await),
            PoolKind::Child => {
                let action = self.service_child(view).await?;
                Ok(ServiceOutcome { actions: action.into_iter().collect(), failure: None })
            }
        }
    }

    async fn service_parent(&self, view: PoolView) -> ServiceOutcome {
        let chain = view.chain();
        let mut outcome = ServiceOutcome::default();
        let mut view = view;

        match batch_wanted(&self.ctx, &view).await {
            Ok(true) if view.all_snapshots_received() => {
                match self.trigger_batch(&view).await {
                    // One unconfirmed call per pool; withdrawals wait for it
                    Ok(action @ KeeperAction::Submitted { .. }) => {
                        outcome.actions.push(action);
                        return outcome;
                    }
                    Ok(action) => outcome.actions.push(action),
                    Err(e) => outcome.fail(e),
                }
                view = match self.ctx.accessor.observe(chain).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        outcome.fail(e);
                        return outcome;
                    }
                };
            }
            Ok(true) => {
                log::debug!("chain={} epoch={} waiting for snapshots from {:?}", chain, view.epoch, view.missing_snapshots);
            }
            Ok(false) => {}
            Err(e) => outcome.fail(e),
        }

        if view.pending_withdrawals_ready() {
            match self.process_withdrawals(&view).await {
                Ok(action) => outcome.actions.push(action),
                Err(e) => outcome.fail(e),
            }
        } else if view.pending_withdrawal_count > 0 {
            log::debug!(
                "chain={} {} pending withdrawals ({}) exceed active balance {}",
                chain,
                view.pending_withdrawal_count,
                view.pending_withdrawal_total,
                view.snapshot.active_balance
            );
        }
        outcome
    }

    async fn trigger_batch(&self, view: &PoolView) -> KeeperResult<KeeperAction> {
        let chain = view.chain();
        let call = PoolCall::TriggerDepositWithdrawProcess;
        let detail = format!(
            "epoch={} deposits={} withdrawals={}",
            view.epoch, view.snapshot.deposit_queue_length, view.snapshot.withdrawal_queue_length
        );
        let receipt = match self.submit(chain, call, view.queued_deposit_total, &detail).await? {
            Submission::Pending(action) => return Ok(action),
            Submission::Landed(receipt) => receipt,
        };

        if let Some(event) = receipt.find(EventTag::BatchFailed) {
            let reason = match &event.kind {
                EventKind::BatchFailed { batch_id, reason } => format!("batch {}: {}", batch_id, reason),
                other => format!("{:?}", other),
            };
            log::error!("chain={} action={} tx={} batch failed: {}", chain, call.name(), receipt.tx, reason);
            return Err(KeeperError::BatchFailed { chain, reason });
        }

        match receipt.find(call.completion_event()).map(|e| &e.kind) {
            Some(EventKind::DepositWithdrawTriggered { epoch, deposits, withdrawals, lp_minted, withdrawals_owed }) => {
                log::info!(
                    "chain={} action={} tx={} epoch={} deposits={} withdrawals={} lp_minted={} owed={}",
                    chain,
                    call.name(),
                    receipt.tx,
                    epoch,
                    deposits,
                    withdrawals,
                    lp_minted,
                    withdrawals_owed
                );
                Ok(KeeperAction::BatchTriggered {
                    tx: receipt.tx,
                    epoch: *epoch,
                    deposits: *deposits,
                    withdrawals: *withdrawals,
                })
            }
            _ => Err(missing_event(chain, call, receipt.tx)),
        }
    }

    async fn process_withdrawals(&self, view: &PoolView) -> KeeperResult<KeeperAction> {
        let chain = view.chain();
        let call = PoolCall::ProcessPendingWithdrawals;
        let detail = format!("count={} total={}", view.pending_withdrawal_count, view.pending_withdrawal_total);
        let receipt = match self.submit(chain, call, view.pending_withdrawal_total, &detail).await? {
            Submission::Pending(action) => return Ok(action),
            Submission::Landed(receipt) => receipt,
        };
        match receipt.find(call.completion_event()).map(|e| &e.kind) {
            Some(EventKind::PendingWithdrawalsProcessed { count, total }) => Ok(KeeperAction::WithdrawalsProcessed {
                tx: receipt.tx,
                count: *count,
                total: *total,
            }),
            _ => Err(missing_event(chain, call, receipt.tx)),
        }
    }

    async fn service_child(&self, view: PoolView) -> KeeperResult<Option<KeeperAction>> {
        let chain = view.chain();
        let parent_chain = self.ctx.parent_chain();
        let parent = self.ctx.accessor.observe(parent_chain).await?;

        if !parent.missing_snapshots.contains(&chain) {
            return Ok(None);
        }
        if !parent.queues_full && !batch_wanted(&self.ctx, &parent).await? {
            return Ok(None);
        }

        self.ctx.routes.check(chain, parent_chain).await?;

        let call = PoolCall::SendSnapshot;
        let balance = view.snapshot.active_balance;
        let detail = format!("epoch={} balance={}", parent.epoch, balance);
        let receipt = match self.submit(chain, call, balance, &detail).await? {
            Submission::Pending(action) => return Ok(Some(action)),
            Submission::Landed(receipt) => receipt,
        };
        match receipt.find(call.completion_event()).map(|e| &e.kind) {
            Some(EventKind::SnapshotSent { epoch, balance, .. }) => Ok(Some(KeeperAction::SnapshotSent {
                tx: receipt.tx,
                epoch: *epoch,
                balance: *balance,
            })),
            _ => Err(missing_event(chain, call, receipt.tx)),
        }
    }

    async fn submit(&self, chain: ChainSelector, call: PoolCall, amount: u128, detail: &str) -> KeeperResult<Submission> {
        let pool = self.ctx.pool_address(chain)?;
        let action = call.name();
        let tx = build_keeper_call(chain, pool, self.ctx.operator(), call, self.ctx.config.gas_limit);
        log::info!("chain={} pool={} action={} {}", chain, pool, action, detail);
        let receipt = self.ctx.submit(tx).await.map_err(|e| {
            log::warn!("chain={} pool={} action={} failed: {}", chain, pool, action, e);
            e
        })?;

        if receipt.status == TxStatus::Pending {
            self.ctx
                .inflight
                .record(chain, InFlight { tx: receipt.tx, action, amount, submitted_at: Instant::now() })
                .await;
            log::info!("chain={} pool={} action={} tx={} pending", chain, pool, action, receipt.tx);
            return Ok(Submission::Pending(KeeperAction::Submitted { tx: receipt.tx, action }));
        }
        Ok(Submission::Landed(receipt))
    }
}

/// The parent has a non-empty batch it could settle now
async fn batch_wanted(ctx: &EngineContext, parent: &PoolView) -> KeeperResult<bool> {
    if parent.batch_in_progress {
        return Ok(false);
    }
    let params = ctx.accessor.params(parent.chain()).await?;
    let health = assess(parent, &params)?;
    if health.deposits_suppressed {
        log::debug!(
            "chain={} deposits suppressed (lur={} composite={})",
            parent.chain(),
            health.scores.lur_raw,
            health.scores.composite
        );
    }
    Ok(health.readiness.is_ready() && health.has_batchable_entries(parent))
}

fn missing_event(chain: ChainSelector, call: PoolCall, tx: TxHash) -> KeeperError {
    KeeperError::Invariant {
        chain,
        reason: format!("{} confirmed in {} without {}", call.name(), tx, call.completion_event()),
    }
}
