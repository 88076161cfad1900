//! Polling loops
//!
//! Each cycle fans out over every configured pool. Failures stay with their
//! pool: they are logged and reported, never abort the cycle.

use crate::context::EngineContext;
use crate::error::KeeperError;
use crate::priority_queue::{ImbalanceQueue, PoolImbalance};
use crate::reconciler::Rebalancer;
use crate::triggers::{Keeper, KeeperAction};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use pool_model::ChainSelector;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Which loops `spawn` starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Services {
    pub keeper: bool,
    pub rebalancer: bool,
}

impl Services {
    pub fn all() -> Self {
        Self { keeper: true, rebalancer: true }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub actions: usize,
    pub skipped: usize,
    pub failures: Vec<(ChainSelector, KeeperError)>,
}

impl CycleReport {
    fn record_failure(&mut self, chain: ChainSelector, e: KeeperError) {
        if e.is_fatal() {
            log::error!("chain={} {}", chain, e);
        } else {
            log::warn!("chain={} {}", chain, e);
        }
        self.failures.push((chain, e));
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Orchestrator {
    ctx: Arc<EngineContext>,
    keeper: Keeper,
    rebalancer: Rebalancer,
}

impl Orchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        Arc::new(Self {
            keeper: Keeper::new(Arc::clone(&ctx)),
            rebalancer: Rebalancer::new(Arc::clone(&ctx)),
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Service every pool once
    pub async fn keeper_cycle(&self) -> CycleReport {
        self.ctx.routes.refresh(&self.ctx.accessor).await;
        let chains = self.ctx.config.chains();
        let results = join_all(chains.iter().map(|c| self.keeper.service_pool(*c))).await;

        let mut report = CycleReport::default();
        for (chain, result) in chains.into_iter().zip(results) {
            match result {
                Ok(outcome) if outcome.is_idle() => report.skipped += 1,
                Ok(outcome) => {
                    for action in &outcome.actions {
                        if let KeeperAction::BatchTriggered { epoch, .. } = action {
                            log::debug!("chain={} settled epoch {}", chain, epoch);
                        }
                    }
                    report.actions += outcome.actions.len();
                    if let Some(e) = outcome.failure {
                        report.record_failure(chain, e);
                    }
                }
                Err(e) => report.record_failure(chain, e),
            }
        }
        report
    }

    /// Correct every pool once. Pools start in imbalance order, at most
    /// `max_concurrent_corrections` at a time, so the largest imbalances are
    /// served first when the limit binds.
    pub async fn rebalancer_cycle(&self) -> CycleReport {
        self.ctx.routes.refresh(&self.ctx.accessor).await;
        let mut report = CycleReport::default();

        let mut queue = ImbalanceQueue::new();
        for (chain, result) in self.ctx.accessor.observe_many(&self.ctx.config.chains()).await {
            match result {
                Ok(view) => queue.push(PoolImbalance::from_snapshot(&view.snapshot)),
                Err(e) => report.record_failure(chain, e),
            }
        }

        let ordered: Vec<ChainSelector> = queue.into_ordered().into_iter().map(|i| i.chain).collect();
        let results: Vec<_> = stream::iter(ordered.iter().copied())
            .map(|c| self.rebalancer.reconcile_pool(c))
            .buffered(self.ctx.config.max_concurrent_corrections.max(1))
            .collect()
            .await;
        for (chain, result) in ordered.into_iter().zip(results) {
            match result {
                Ok(outcome) if outcome.acted() => report.actions += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => report.record_failure(chain, e),
            }
        }
        report
    }

    /// Run the selected loops until `shutdown` flips to true
    pub fn spawn(self: Arc<Self>, services: Services, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if services.keeper {
            let this = Arc::clone(&self);
            handles.push(tokio::spawn(run_loop("keeper", shutdown.clone(), this, |o| -> CycleFuture {
                Box::pin(async move { o.keeper_cycle().await })
            })));
        }
        if services.rebalancer {
            let this = Arc::clone(&self);
            handles.push(tokio::spawn(run_loop("rebalancer", shutdown, this, |o| -> CycleFuture {
                Box::pin(async move { o.rebalancer_cycle().await })
            })));
        }
        handles
    }
}

type CycleFuture = std::pin::Pin<Box<dyn std::future::Future<Output = CycleReport> + Send>>;

async fn run_loop<F>(name: &'static str, mut shutdown: watch::Receiver<bool>, orchestrator: Arc<Orchestrator>, cycle: F)
where
    F: Fn(Arc<Orchestrator>) -> CycleFuture,
{
    let mut interval = time::interval(orchestrator.ctx.config.polling_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("{} loop started, polling every {} ms", name, orchestrator.ctx.config.polling_interval_ms);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = cycle(Arc::clone(&orchestrator)).await;
                log::debug!(
                    "{} cycle: actions={} skipped={} failures={}",
                    name,
                    report.actions,
                    report.skipped,
                    report.failures.len()
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    log::info!("{} loop stopped", name);
}
