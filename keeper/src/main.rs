//! Lanca Liquidity Keeper
//!
//! Off-chain service that batches deposits and withdrawals on the parent pool,
//! collects child snapshots and keeps every pool near its target balance.

use anyhow::{Context, Result};
use lanca_keeper::client::PoolClient;
use lanca_keeper::config::Config;
use lanca_keeper::context::EngineContext;
use lanca_keeper::local::LocalChain;
use lanca_keeper::orchestrator::{Orchestrator, Services};
use lanca_keeper::params_sync::sync_pool_params;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [cmd, path] = args.as_slice() {
        if cmd == "init-config" {
            return Config::write_default(path);
        }
    }

    log::info!("Starting Lanca Liquidity Keeper");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default localhost config", e);
        Config::default_localhost()
    });
    let warnings = config.validate().context("Invalid keeper configuration")?;
    for warning in &warnings {
        log::warn!("config: {}", warning);
    }

    for pool in &config.pools {
        log::info!(
            "Pool {} ({}) on chain {} at {} via {}",
            pool.name,
            pool.kind,
            pool.chain,
            pool.address,
            pool.rpc_url
        );
    }
    log::info!("Operator: {}", config.operator);

    // Remote transports live outside this binary; local mode runs the pools in process
    let local = LocalChain::from_config(&config).context("Failed to deploy local pools")?;
    let client: Arc<dyn PoolClient> = Arc::new(local);

    let sync_on_start = config.sync_params_on_start;
    let ctx = EngineContext::new(config, client);
    if sync_on_start {
        let report = sync_pool_params(&ctx).await?;
        if !report.failures.is_empty() {
            log::warn!("{} pools failed parameter sync", report.failures.len());
        }
    }

    let missing = {
        ctx.routes.refresh(&ctx.accessor).await;
        ctx.routes.missing_routes().await
    };
    for (src, dst) in missing {
        log::warn!("route {} -> {} is not configured", src, dst);
    }

    let orchestrator = Orchestrator::new(ctx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = orchestrator.spawn(Services::all(), shutdown_rx);

    log::info!("Keeper service started. Monitoring pools...");

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    log::info!("Shutting down");
    shutdown_tx.send(true).context("Failed to signal shutdown")?;
    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("loop task failed: {}", e);
        }
    }

    Ok(())
}
