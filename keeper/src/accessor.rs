//! Pool state accessor
//!
//! Reads are all-or-nothing: any failure marks the pool unobservable for the
//! cycle and the caller skips it. There is no stale fallback.

use crate::client::PoolClient;
use crate::context::RpcLimiter;
use crate::error::{KeeperError, KeeperResult};
use futures::future::join_all;
use pool_model::reconcile::OperatorFunds;
use pool_model::{Address, ChainSelector, PoolParams, PoolView};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct PoolStateAccessor {
    client: Arc<dyn PoolClient>,
    limiter: Arc<RpcLimiter>,
    timeout: Duration,
}

impl PoolStateAccessor {
    pub fn new(client: Arc<dyn PoolClient>, limiter: Arc<RpcLimiter>, timeout: Duration) -> Self {
        Self { client, limiter, timeout }
    }

    /// Run one read under the chain's RPC limit and the read timeout
    async fn read<T, F>(&self, chain: ChainSelector, what: &str, fut: F) -> KeeperResult<T>
    where
        F: Future<Output = Result<T, crate::client::ClientError>>,
    {
        let _permit = self.limiter.acquire(chain).await?;
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(KeeperError::Unobservable {
                chain,
                reason: format!("{}: {}", what, e),
            }),
            Err(_) => Err(KeeperError::Unobservable {
                chain,
                reason: format!("{}: timed out", what),
            }),
        }
    }

    /// Consistent view of one pool; deficit and surplus derive from its snapshot
    pub async fn observe(&self, chain: ChainSelector) -> KeeperResult<PoolView> {
        let view = self.read(chain, "pool view", self.client.pool_view(chain)).await?;
        if view.snapshot.chain != chain {
            return Err(KeeperError::Invariant {
                chain,
                reason: format!("view answered for chain {}", view.snapshot.chain),
            });
        }
        Ok(view)
    }

    /// Observe several pools concurrently
    pub async fn observe_many(&self, chains: &[ChainSelector]) -> Vec<(ChainSelector, KeeperResult<PoolView>)> {
        let reads = chains.iter().map(|c| async move { (*c, self.observe(*c).await) });
        join_all(reads).await
    }

    pub async fn params(&self, chain: ChainSelector) -> KeeperResult<PoolParams> {
        self.read(chain, "pool params", self.client.pool_params(chain)).await
    }

    pub async fn dst_pool(&self, chain: ChainSelector, dst: ChainSelector) -> KeeperResult<Address> {
        self.read(chain, "dst pool", self.client.dst_pool(chain, dst)).await
    }

    /// Liquidity and IOU the operator holds on `chain`
    pub async fn operator_funds(&self, chain: ChainSelector, operator: Address) -> KeeperResult<OperatorFunds> {
        let liquidity = self
            .read(chain, "operator liquidity", self.client.liquidity_balance(chain, operator))
            .await?;
        let debt = self
            .read(chain, "operator debt", self.client.debt_balance(chain, operator))
            .await?;
        Ok(OperatorFunds { liquidity, debt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::local::LocalChain;

    fn accessor() -> (Arc<LocalChain>, PoolStateAccessor) {
        let config = Config::default_localhost();
        let local = Arc::new(LocalChain::from_config(&config).unwrap());
        let limiter = Arc::new(RpcLimiter::new(&config.chains(), 2));
        let client: Arc<dyn PoolClient> = local.clone();
        (local, PoolStateAccessor::new(client, limiter, Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_observe_derives_from_one_snapshot() {
        let (local, accessor) = accessor();
        local
            .network()
            .await
            .mint_liquidity(2, Address::from_low_u64(0x2001), 500)
            .unwrap();
        let view = accessor.observe(2).await.unwrap();
        assert_eq!(view.snapshot.active_balance, 500);
        assert_eq!(view.surplus(), 500);
        assert_eq!(view.deficit(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_pool_is_unobservable() {
        let (local, accessor) = accessor();
        local.set_unobservable(2, true).await;
        let results = accessor.observe_many(&[1, 2]).await;
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(KeeperError::Unobservable { chain: 2, .. })));
        assert!(matches!(
            accessor.operator_funds(2, Address::from_low_u64(1)).await,
            Err(KeeperError::Unobservable { .. })
        ));
    }
}
