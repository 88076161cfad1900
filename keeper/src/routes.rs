//! Route cache
//!
//! Holds the configured pool addresses and the on-chain `getDstPool` entries
//! read at the start of each cycle.

use crate::accessor::PoolStateAccessor;
use crate::error::{KeeperError, KeeperResult};
use futures::future::join_all;
use pool_model::route::{RouteError, RouteTable};
use pool_model::ChainSelector;
use tokio::sync::RwLock;

pub struct RouteCache {
    expected: RouteTable,
    onchain: RwLock<RouteTable>,
}

impl RouteCache {
    /// Start from the expected routes until the first refresh
    pub fn new(expected: RouteTable) -> Self {
        Self {
            onchain: RwLock::new(expected.clone()),
            expected,
        }
    }

    /// Re-read every directed pair. A pair that cannot be read is cleared,
    /// so actions depending on it are skipped this cycle.
    pub async fn refresh(&self, accessor: &PoolStateAccessor) {
        let chains = self.expected.chains();
        let pairs: Vec<(ChainSelector, ChainSelector)> = chains
            .iter()
            .flat_map(|src| chains.iter().filter(move |dst| *dst != src).map(move |dst| (*src, *dst)))
            .collect();

        let reads = pairs.iter().map(|(src, dst)| async move { (*src, *dst, accessor.dst_pool(*src, *dst).await) });
        let results = join_all(reads).await;

        let mut table = RouteTable::new();
        for chain in &chains {
            if let Some(pool) = self.expected.pool(*chain) {
                table.register_pool(*chain, pool);
            }
        }
        for (src, dst, result) in results {
            match result {
                Ok(pool) if !pool.is_zero() => {
                    // set_route only rejects self routes, which were filtered out
                    let _ = table.set_route(src, dst, pool);
                }
                Ok(_) => {}
                Err(e) => log::debug!("route {} -> {} unreadable: {}", src, dst, e),
            }
        }
        *self.onchain.write().await = table;
    }

    /// Destination pool for `src -> dst`, or `RouteNotConfigured`
    pub async fn check(&self, src: ChainSelector, dst: ChainSelector) -> KeeperResult<()> {
        self.onchain
            .read()
            .await
            .get_route(src, dst)
            .map(|_| ())
            .map_err(|e| route_error(src, dst, e))
    }

    /// Configured pairs that do not resolve on chain
    pub async fn missing_routes(&self) -> Vec<(ChainSelector, ChainSelector)> {
        let table = self.onchain.read().await;
        let chains = self.expected.chains();
        let mut missing = Vec::new();
        for src in &chains {
            for dst in &chains {
                if src != dst && table.get_route(*src, *dst).is_err() {
                    missing.push((*src, *dst));
                }
            }
        }
        missing
    }
}

fn route_error(src: ChainSelector, dst: ChainSelector, e: RouteError) -> KeeperError {
    KeeperError::RouteNotConfigured { src, dst, reason: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PoolClient;
    use crate::config::Config;
    use crate::context::RpcLimiter;
    use crate::local::LocalChain;
    use pool_model::{Address, ParamUpdate};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Config, Arc<LocalChain>, PoolStateAccessor, RouteCache) {
        let config = Config::default_localhost();
        let local = Arc::new(LocalChain::from_config(&config).unwrap());
        let client: Arc<dyn PoolClient> = local.clone();
        let limiter = Arc::new(RpcLimiter::new(&config.chains(), 4));
        let accessor = PoolStateAccessor::new(client, limiter, Duration::from_secs(1));
        let cache = RouteCache::new(config.route_table());
        (config, local, accessor, cache)
    }

    #[tokio::test]
    async fn test_refresh_reads_symmetric_routes() {
        let (_, _, accessor, cache) = setup();
        cache.refresh(&accessor).await;
        assert!(cache.check(2, 1).await.is_ok());
        assert!(cache.check(1, 2).await.is_ok());
        assert!(cache.missing_routes().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_sided_route_is_not_configured() {
        let (config, local, accessor, cache) = setup();
        let admin = config.admin.unwrap();
        local
            .apply(|n| n.apply_param(1, admin, ParamUpdate::DstPool { chain: 2, pool: Address::ZERO }))
            .await
            .unwrap();
        cache.refresh(&accessor).await;

        let err = cache.check(2, 1).await.unwrap_err();
        assert!(matches!(err, KeeperError::RouteNotConfigured { src: 2, dst: 1, .. }));
        assert_eq!(cache.missing_routes().await, vec![(1, 2), (2, 1)]);
    }

    #[tokio::test]
    async fn test_wrong_pool_is_asymmetric() {
        let (config, local, accessor, cache) = setup();
        let admin = config.admin.unwrap();
        local
            .apply(|n| n.apply_param(2, admin, ParamUpdate::DstPool { chain: 1, pool: Address::from_low_u64(0xdead) }))
            .await
            .unwrap();
        cache.refresh(&accessor).await;
        let err = cache.check(2, 1).await.unwrap_err();
        match err {
            KeeperError::RouteNotConfigured { reason, .. } => assert!(reason.contains("asymmetric")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_self_route_rejected() {
        let (_, _, _, cache) = setup();
        assert!(cache.check(1, 1).await.is_err());
    }
}
