//! Shared engine state: config, client, per-pool locks, per-chain RPC limits

use crate::accessor::PoolStateAccessor;
use crate::client::{ClientError, PoolClient, TxReceipt};
use crate::config::Config;
use crate::error::{KeeperError, KeeperResult};
use crate::inflight::InFlightTracker;
use crate::routes::RouteCache;
use crate::tx_builder::Transaction;
use pool_model::{Address, ChainSelector};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

/// One mutex per pool, shared by the keeper and the rebalancer so their
/// actions on a pool never overlap
pub struct PoolLocks {
    locks: HashMap<ChainSelector, Arc<Mutex<()>>>,
}

impl PoolLocks {
    pub fn new(chains: &[ChainSelector]) -> Self {
        Self {
            locks: chains.iter().map(|c| (*c, Arc::new(Mutex::new(())))).collect(),
        }
    }

    pub async fn lock(&self, chain: ChainSelector) -> KeeperResult<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .get(&chain)
            .ok_or_else(|| KeeperError::Config(format!("no pool configured for chain {}", chain)))?;
        Ok(Arc::clone(lock).lock_owned().await)
    }

    /// `None` while another action holds the pool
    pub fn try_lock(&self, chain: ChainSelector) -> Option<OwnedMutexGuard<()>> {
        self.locks.get(&chain).and_then(|l| Arc::clone(l).try_lock_owned().ok())
    }
}

/// Bounded concurrency per chain endpoint
pub struct RpcLimiter {
    permits: HashMap<ChainSelector, Arc<Semaphore>>,
}

impl RpcLimiter {
    pub fn new(chains: &[ChainSelector], per_chain: usize) -> Self {
        Self {
            permits: chains.iter().map(|c| (*c, Arc::new(Semaphore::new(per_chain)))).collect(),
        }
    }

    pub async fn acquire(&self, chain: ChainSelector) -> KeeperResult<OwnedSemaphorePermit> {
        let semaphore = self
            .permits
            .get(&chain)
            .ok_or_else(|| KeeperError::Config(format!("no endpoint configured for chain {}", chain)))?;
        Arc::clone(semaphore)
            .acquire_owned()
            .await
            .map_err(|_| KeeperError::Transient { chain, reason: "rpc limiter closed".into() })
    }

    pub fn available(&self, chain: ChainSelector) -> usize {
        self.permits.get(&chain).map_or(0, |s| s.available_permits())
    }
}

pub struct EngineContext {
    pub config: Arc<Config>,
    pub client: Arc<dyn PoolClient>,
    pub accessor: PoolStateAccessor,
    pub limiter: Arc<RpcLimiter>,
    pub locks: PoolLocks,
    pub inflight: InFlightTracker,
    pub routes: RouteCache,
}

impl EngineContext {
    pub fn new(config: Config, client: Arc<dyn PoolClient>) -> Arc<Self> {
        let chains = config.chains();
        let limiter = Arc::new(RpcLimiter::new(&chains, config.max_concurrent_requests_per_chain));
        let accessor = PoolStateAccessor::new(Arc::clone(&client), Arc::clone(&limiter), config.event_timeout());
        let routes = RouteCache::new(config.route_table());
        let inflight = InFlightTracker::new(config.inflight_ttl());
        Arc::new(Self {
            locks: PoolLocks::new(&chains),
            config: Arc::new(config),
            client,
            accessor,
            limiter,
            inflight,
            routes,
        })
    }

    pub fn operator(&self) -> Address {
        self.config.operator
    }

    pub fn parent_chain(&self) -> ChainSelector {
        self.config.parent_chain
    }

    pub fn pool_address(&self, chain: ChainSelector) -> KeeperResult<Address> {
        self.config
            .pool(chain)
            .map(|p| p.address)
            .ok_or_else(|| KeeperError::Config(format!("no pool configured for chain {}", chain)))
    }

    /// Submit under the chain's RPC limit, bounded by the event timeout
    pub async fn submit(&self, tx: Transaction) -> KeeperResult<TxReceipt> {
        let chain = tx.chain;
        let action = tx.call.name();
        let _permit = self.limiter.acquire(chain).await?;
        let timeout = self.config.event_timeout();
        match tokio::time::timeout(timeout, self.client.submit(tx)).await {
            Err(_) | Ok(Err(ClientError::Timeout)) => Err(KeeperError::Timeout {
                what: format!("{} on chain {}", action, chain),
                ms: timeout.as_millis() as u64,
            }),
            Ok(Err(ClientError::Reverted(reason))) => Err(KeeperError::Reverted { chain, action, reason }),
            Ok(Err(ClientError::Transport(reason))) => Err(KeeperError::Transient { chain, reason }),
            Ok(Ok(receipt)) => Ok(receipt),
        }
    }
}
