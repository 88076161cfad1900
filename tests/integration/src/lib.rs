//! Lanca Integration Tests
//!
//! `TestNetwork` runs the real orchestrator against an in-process parent
//! and child pool. Tests provision state through the harness, start the
//! loops and wait for the events the keeper or rebalancer should produce.

use lanca_keeper::client::PoolClient;
use lanca_keeper::config::Config;
use lanca_keeper::context::EngineContext;
use lanca_keeper::events;
use lanca_keeper::local::LocalChain;
use lanca_keeper::orchestrator::{Orchestrator, Services};
use lanca_keeper::KeeperResult;
use pool_model::network::{Receipt, Revert};
use pool_model::{Address, ChainSelector, EventTag, ParamUpdate, PoolEvent, PoolView, ONE_TOKEN};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Every event wait in the scenarios
pub const EVENT_TIMEOUT: Duration = Duration::from_millis(10_000);

pub const PARENT: ChainSelector = 1;
pub const CHILD: ChainSelector = 2;

/// Deposit size used to fill queues
pub const DEPOSIT: u128 = 100 * ONE_TOKEN;

pub fn user(i: u64) -> Address {
    Address::from_low_u64(0x7000 + i)
}

pub fn test_config() -> Config {
    let mut config = Config::default_localhost();
    config.polling_interval_ms = 50;
    config.event_timeout_ms = EVENT_TIMEOUT.as_millis() as u64;
    config.inflight_ttl_ms = 5_000;
    config
}

pub struct TestNetwork {
    pub config: Config,
    pub local: Arc<LocalChain>,
    pub orchestrator: Arc<Orchestrator>,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
    next_user: u64,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let local = match LocalChain::from_config(&config) {
            Ok(local) => local,
            Err(e) => panic!("local pools failed to deploy: {}", e),
        };
        Self::with_local(config, local)
    }

    /// Use a pre-built backend (latency, deferred confirmations)
    pub fn with_local(config: Config, local: LocalChain) -> Self {
        let local = Arc::new(local);
        let client: Arc<dyn PoolClient> = local.clone();
        let ctx = EngineContext::new(config.clone(), client);
        Self {
            config,
            local,
            orchestrator: Orchestrator::new(ctx),
            shutdown: None,
            handles: Vec::new(),
            next_user: 0,
        }
    }

    pub fn operator(&self) -> Address {
        self.config.operator
    }

    pub fn admin(&self) -> Address {
        self.config.admin.unwrap_or(self.config.operator)
    }

    pub fn pool_address(&self, chain: ChainSelector) -> Address {
        self.config.pool(chain).map(|p| p.address).unwrap_or(Address::ZERO)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.local.subscribe()
    }

    pub fn submitted(&self) -> usize {
        self.local.submitted_count()
    }

    // ---------- loops ----------

    pub fn start(&mut self, services: Services) {
        let (tx, rx) = watch::channel(false);
        self.handles = Arc::clone(&self.orchestrator).spawn(services, rx);
        self.shutdown = Some(tx);
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }

    // ---------- provisioning ----------

    pub async fn mint_liquidity(&self, chain: ChainSelector, to: Address, amount: u128) -> Result<(), Revert> {
        self.local.network().await.mint_liquidity(chain, to, amount)
    }

    pub async fn mint_debt(&self, chain: ChainSelector, to: Address, amount: u128) -> Result<(), Revert> {
        self.local.network().await.mint_debt(chain, to, amount)
    }

    pub async fn set_param(&self, chain: ChainSelector, update: ParamUpdate) -> Result<Receipt, Revert> {
        let admin = self.admin();
        self.local.apply(move |n| n.apply_param(chain, admin, update)).await
    }

    /// Move the target `delta` above the pool's current active balance
    pub async fn set_target_above_active(&self, chain: ChainSelector, delta: u128) -> Result<Receipt, Revert> {
        let active = self.view(chain).await?.snapshot.active_balance;
        self.set_param(chain, ParamUpdate::TargetBalance(active + delta)).await
    }

    /// Fund a fresh user and queue a deposit on the parent
    pub async fn deposit(&mut self, amount: u128) -> Result<Address, Revert> {
        let who = user(self.next_user);
        self.next_user += 1;
        self.mint_liquidity(PARENT, who, amount).await?;
        self.local.apply(|n| n.enter_deposit_queue(PARENT, who, amount)).await?;
        Ok(who)
    }

    pub async fn withdraw(&self, who: Address, shares: u128) -> Result<Receipt, Revert> {
        self.local.apply(|n| n.enter_withdrawal_queue(PARENT, who, shares)).await
    }

    /// Queue deposits until the parent reports its queues full
    pub async fn fill_parent_queues(&mut self) -> Result<(), Revert> {
        while !self.view(PARENT).await?.queues_full {
            self.deposit(DEPOSIT).await?;
        }
        Ok(())
    }

    /// Queue one deposit and deliver every missing child snapshot, leaving
    /// the parent with a settleable batch
    pub async fn set_ready_to_trigger(&mut self) -> Result<(), Revert> {
        if self.view(PARENT).await?.snapshot.deposit_queue_length == 0 {
            self.deposit(DEPOSIT).await?;
        }
        let operator = self.operator();
        for child in self.view(PARENT).await?.missing_snapshots {
            self.local.apply(|n| n.send_snapshot(child, operator)).await?;
        }
        Ok(())
    }

    pub async fn view(&self, chain: ChainSelector) -> Result<PoolView, Revert> {
        self.local.network().await.view(chain)
    }

    pub async fn wait_for(
        &self,
        rx: &mut broadcast::Receiver<PoolEvent>,
        chain: ChainSelector,
        tag: EventTag,
    ) -> KeeperResult<PoolEvent> {
        events::wait_for(rx, chain, tag, EVENT_TIMEOUT).await
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestNetwork {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
    }
}
