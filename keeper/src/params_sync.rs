//! Pool parameter synchronisation
//!
//! Pushes the configured parameters and destination pools to every pool,
//! writing only the values that differ on chain.

use crate::context::EngineContext;
use crate::error::{KeeperError, KeeperResult};
use crate::tx_builder::build_set_param;
use pool_model::{Address, ChainSelector, EventTag, ParamUpdate};

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Setter calls made, in order
    pub updated: Vec<(ChainSelector, &'static str)>,
    /// Parameter blocks and dst pools that already matched
    pub already_set: usize,
    pub failures: Vec<(ChainSelector, KeeperError)>,
}

pub async fn sync_pool_params(ctx: &EngineContext) -> KeeperResult<SyncReport> {
    let admin = ctx
        .config
        .admin
        .ok_or_else(|| KeeperError::Config("parameter sync needs an admin address".into()))?;

    let mut report = SyncReport::default();
    for pool in &ctx.config.pools {
        if let Err(e) = sync_pool(ctx, admin, pool.chain, &mut report).await {
            log::warn!("chain={} pool={} parameter sync failed: {}", pool.chain, pool.name, e);
            report.failures.push((pool.chain, e));
        }
    }
    log::info!(
        "parameter sync: {} updated, {} already set, {} failed",
        report.updated.len(),
        report.already_set,
        report.failures.len()
    );
    Ok(report)
}

async fn sync_pool(ctx: &EngineContext, admin: Address, chain: ChainSelector, report: &mut SyncReport) -> KeeperResult<()> {
    let pool = ctx
        .config
        .pool(chain)
        .ok_or_else(|| KeeperError::Config(format!("no pool configured for chain {}", chain)))?;

    let current = ctx.accessor.params(chain).await?;
    let desired = pool.pool_params();
    let mut updates = ParamUpdate::diff(&current, &desired);
    if updates.is_empty() {
        log::info!("chain={} pool={} parameters already set", chain, pool.name);
        report.already_set += 1;
    }

    for dst in ctx.config.chains().into_iter().filter(|c| *c != chain) {
        let expected = ctx.pool_address(dst)?;
        let onchain = ctx.accessor.dst_pool(chain, dst).await?;
        if onchain == expected {
            log::info!("chain={} dst pool for {} already set to {}", chain, dst, expected);
            report.already_set += 1;
        } else {
            updates.push(ParamUpdate::DstPool { chain: dst, pool: expected });
        }
    }

    for update in updates {
        let setter = update.setter();
        let tx = build_set_param(chain, pool.address, admin, update, ctx.config.gas_limit);
        log::info!("chain={} pool={} action={} value={:?}", chain, pool.address, setter, update);
        let receipt = ctx.submit(tx).await?;
        if !receipt.has(EventTag::ParamUpdated) {
            return Err(KeeperError::Invariant {
                chain,
                reason: format!("{} in {} emitted no ParamUpdated", setter, receipt.tx),
            });
        }
        report.updated.push((chain, setter));
    }
    Ok(())
}
