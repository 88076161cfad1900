//! Deficit/surplus rebalancer
//!
//! One corrective action per pool per cycle, planned from a single view and
//! confirmed by the completion event in the receipt. The pool contract
//! rejects over-large corrections, so a lost race surfaces as a revert and
//! is retried next cycle with fresh state.

use crate::client::TxStatus;
use crate::context::EngineContext;
use crate::error::{KeeperError, KeeperResult};
use crate::inflight::InFlight;
use crate::tx_builder::{build_fill_deficit, build_take_surplus, PoolCall, Transaction};
use pool_model::reconcile::{plan_correction, Correction, SkipReason};
use pool_model::{ChainSelector, PoolKind, TxHash};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Filled { tx: TxHash, amount: u128, fee: u128 },
    Swept { tx: TxHash, amount: u128, fee: u128 },
    /// Accepted but unconfirmed, tracked as in flight
    Submitted { tx: TxHash, action: &'static str },
    /// A previous correction is still pending
    InFlight,
    Skipped(SkipReason),
}

impl ReconcileOutcome {
    pub fn acted(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Filled { .. } | ReconcileOutcome::Swept { .. } | ReconcileOutcome::Submitted { .. }
        )
    }
}

pub struct Rebalancer {
    ctx: Arc<EngineContext>,
    warned_zero_fee: Mutex<HashSet<ChainSelector>>,
}

impl Rebalancer {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            warned_zero_fee: Mutex::new(HashSet::new()),
        }
    }

    pub async fn reconcile_pool(&self, chain: ChainSelector) -> KeeperResult<ReconcileOutcome> {
        let ctx = &self.ctx;
        let _guard = ctx.locks.lock(chain).await?;

        if ctx.inflight.blocks(chain, ctx.client.as_ref()).await {
            log::debug!("chain={} correction still in flight, skipping", chain);
            return Ok(ReconcileOutcome::InFlight);
        }

        let view = ctx.accessor.observe(chain).await?;
        if view.snapshot.is_balanced() {
            return Ok(ReconcileOutcome::Skipped(SkipReason::Balanced));
        }

        if view.kind == PoolKind::Child {
            ctx.routes.check(chain, ctx.parent_chain()).await?;
        }

        let params = ctx.accessor.params(chain).await?;
        let fee_bps = params.fees.rebalancer_fee_bps;
        if fee_bps == 0 && self.warned_zero_fee.lock().await.insert(chain) {
            log::warn!("chain={} pool={} rebalancer fee is zero, corrections earn nothing", chain, view.address);
        }

        let pool = ctx.pool_address(chain)?;
        let operator = ctx.operator();
        let funds = ctx.accessor.operator_funds(chain, operator).await?;
        let gas = ctx.config.gas_limit;

        let (tx, amount, fee) = match plan_correction(&view.snapshot, fee_bps, funds) {
            Correction::Skip(reason) => {
                log::debug!(
                    "chain={} pool={} deficit={} surplus={} skip={:?}",
                    chain,
                    pool,
                    view.deficit(),
                    view.surplus(),
                    reason
                );
                return Ok(ReconcileOutcome::Skipped(reason));
            }
            Correction::Fill(plan) => (build_fill_deficit(chain, pool, operator, plan.amount, gas), plan.amount, plan.fee),
            Correction::Sweep(plan) => (build_take_surplus(chain, pool, operator, plan.amount, gas), plan.amount, plan.fee),
        };

        self.execute(tx, amount, fee, view.deficit(), view.surplus()).await
    }

    async fn execute(
        &self,
        tx: Transaction,
        amount: u128,
        fee: u128,
        deficit: u128,
        surplus: u128,
    ) -> KeeperResult<ReconcileOutcome> {
        let (chain, pool, call) = (tx.chain, tx.to, tx.call);
        let action = call.name();
        log::info!(
            "chain={} pool={} action={} amount={} fee={} deficit={} surplus={} data={}",
            chain,
            pool,
            action,
            amount,
            fee,
            deficit,
            surplus,
            call.calldata_hex()
        );

        let receipt = match self.ctx.submit(tx).await {
            Ok(receipt) => receipt,
            Err(e) => {
                log::warn!("chain={} pool={} action={} failed: {}", chain, pool, action, e);
                return Err(e);
            }
        };

        if receipt.status == TxStatus::Pending {
            self.ctx
                .inflight
                .record(chain, InFlight { tx: receipt.tx, action, amount, submitted_at: Instant::now() })
                .await;
            log::info!("chain={} pool={} action={} tx={} pending", chain, pool, action, receipt.tx);
            return Ok(ReconcileOutcome::Submitted { tx: receipt.tx, action });
        }

        if !receipt.has(call.completion_event()) {
            return Err(KeeperError::Invariant {
                chain,
                reason: format!("{} confirmed in {} without {}", action, receipt.tx, call.completion_event()),
            });
        }
        log::info!("chain={} pool={} action={} tx={} confirmed", chain, pool, action, receipt.tx);

        Ok(match call {
            PoolCall::FillDeficit { .. } => ReconcileOutcome::Filled { tx: receipt.tx, amount, fee },
            _ => ReconcileOutcome::Swept { tx: receipt.tx, amount, fee },
        })
    }
}
