//! Keeper configuration

use crate::error::{KeeperError, KeeperResult};
use anyhow::{Context, Result};
use pool_model::math::SCALE;
use pool_model::route::RouteTable;
use pool_model::{Address, ChainSelector, FeeBps, PoolKind, PoolParams, QueueParams, ScoreParams};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Default poll interval (`KEEPER_POLLING_INTERVAL`)
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 2_000;

/// Default wait for a completion event
pub const DEFAULT_EVENT_TIMEOUT_MS: u64 = 10_000;

fn default_concurrent_corrections() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Poll interval for the keeper and rebalancer loops
    pub polling_interval_ms: u64,

    /// Timeout for every event wait
    pub event_timeout_ms: u64,

    /// How long an unconfirmed transaction blocks the next one on its pool
    pub inflight_ttl_ms: u64,

    /// Concurrent RPC requests allowed per chain endpoint
    pub max_concurrent_requests_per_chain: usize,

    /// Pools corrected at once, taken in imbalance order
    #[serde(default = "default_concurrent_corrections")]
    pub max_concurrent_corrections: usize,

    /// Gas limit attached to every transaction
    pub gas_limit: u64,

    /// Keeper / rebalancer account
    pub operator: Address,

    /// Pool admin, required for parameter sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Address>,

    /// Hub chain selector
    pub parent_chain: ChainSelector,

    /// Push configured pool parameters before starting the loops
    #[serde(default)]
    pub sync_params_on_start: bool,

    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub chain: ChainSelector,
    pub kind: PoolKind,
    pub address: Address,
    pub rpc_url: String,
    pub target_balance: u64,
    pub liquidity_cap: u64,
    pub queue: QueueConfig,
    pub fees: FeeBps,
    pub score: ScoreParams,
}

/// Queue thresholds (amounts in smallest token units)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    pub min_deposit_queue_length: u32,
    pub min_withdrawal_queue_length: u32,
    pub target_deposit_queue_length: u32,
    pub target_withdrawal_queue_length: u32,
    pub min_deposit_amount: u64,
    pub min_withdrawal_amount: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let q = QueueParams::default();
        Self {
            min_deposit_queue_length: q.min_deposit_queue_length,
            min_withdrawal_queue_length: q.min_withdrawal_queue_length,
            target_deposit_queue_length: q.target_deposit_queue_length,
            target_withdrawal_queue_length: q.target_withdrawal_queue_length,
            min_deposit_amount: q.min_deposit_amount as u64,
            min_withdrawal_amount: q.min_withdrawal_amount as u64,
        }
    }
}

impl PoolConfig {
    pub fn pool_params(&self) -> PoolParams {
        PoolParams {
            target_balance: self.target_balance as u128,
            liquidity_cap: self.liquidity_cap as u128,
            fees: self.fees,
            score: self.score,
            queue: QueueParams {
                min_deposit_queue_length: self.queue.min_deposit_queue_length,
                min_withdrawal_queue_length: self.queue.min_withdrawal_queue_length,
                target_deposit_queue_length: self.queue.target_deposit_queue_length,
                target_withdrawal_queue_length: self.queue.target_withdrawal_queue_length,
                min_deposit_amount: self.queue.min_deposit_amount as u128,
                min_withdrawal_amount: self.queue.min_withdrawal_amount as u128,
            },
        }
    }
}

impl Config {
    /// Load configuration from the TOML file named by `KEEPER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("KEEPER_CONFIG")
            .unwrap_or_else(|_| "keeper-config.toml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let config_str = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Two-chain localhost network: parent on selector 1, one child on 2
    pub fn default_localhost() -> Self {
        let pool = |name: &str, chain: ChainSelector, kind: PoolKind, address: u64, port: u16| PoolConfig {
            name: name.to_string(),
            chain,
            kind,
            address: Address::from_low_u64(address),
            rpc_url: format!("http://127.0.0.1:{}", port),
            target_balance: 0,
            liquidity_cap: PoolParams::default().liquidity_cap as u64,
            queue: QueueConfig::default(),
            fees: FeeBps::default(),
            score: ScoreParams::default(),
        };

        Self {
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            event_timeout_ms: DEFAULT_EVENT_TIMEOUT_MS,
            inflight_ttl_ms: 30_000,
            max_concurrent_requests_per_chain: 4,
            max_concurrent_corrections: default_concurrent_corrections(),
            gas_limit: 3_000_000,
            operator: Address::from_low_u64(0x0b0b),
            admin: Some(Address::from_low_u64(0x0ad0)),
            parent_chain: 1,
            sync_params_on_start: false,
            pools: vec![
                pool("localhostParent", 1, PoolKind::Parent, 0x1001, 8545),
                pool("localhostChild", 2, PoolKind::Child, 0x2001, 8546),
            ],
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_localhost();
        let toml_str = toml::to_string_pretty(&config)
            .context("Failed to serialize config")?;

        let expanded = shellexpand::tilde(path);
        std::fs::write(expanded.as_ref(), toml_str)
            .context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    /// Fail fast on values the engine cannot run with. Returns the
    /// misconfigurations that are only worth a warning.
    pub fn validate(&self) -> KeeperResult<Vec<String>> {
        let mut warnings = Vec::new();

        if self.pools.is_empty() {
            return Err(KeeperError::Config("no pools configured".into()));
        }
        if self.polling_interval_ms == 0 {
            return Err(KeeperError::Config("polling_interval_ms must be non-zero".into()));
        }
        if self.event_timeout_ms == 0 {
            return Err(KeeperError::Config("event_timeout_ms must be non-zero".into()));
        }
        if self.max_concurrent_requests_per_chain == 0 {
            return Err(KeeperError::Config("max_concurrent_requests_per_chain must be non-zero".into()));
        }
        if self.max_concurrent_corrections == 0 {
            return Err(KeeperError::Config("max_concurrent_corrections must be non-zero".into()));
        }
        if self.operator.is_zero() {
            return Err(KeeperError::Config("operator address missing".into()));
        }
        if self.sync_params_on_start && self.admin.is_none() {
            return Err(KeeperError::Config("sync_params_on_start requires an admin address".into()));
        }

        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.chain) {
                return Err(KeeperError::Config(format!("duplicate chain selector {}", pool.chain)));
            }
            if pool.address.is_zero() {
                return Err(KeeperError::Config(format!("pool {} has no address", pool.name)));
            }
            if let Some(field) = pool.fees.out_of_range_fields().first() {
                return Err(KeeperError::Config(format!("pool {}: {} above 10000 bps", pool.name, field)));
            }
            if pool.score.lur_score_weight == 0 && pool.score.ndr_score_weight == 0 {
                return Err(KeeperError::Config(format!("pool {}: score weights are both zero", pool.name)));
            }

            for field in pool.fees.zero_fields() {
                warnings.push(format!("pool {} ({}): {} is zero", pool.name, pool.chain, field));
            }
            let weight_sum = pool.score.lur_score_weight as u128 + pool.score.ndr_score_weight as u128;
            if weight_sum != SCALE {
                warnings.push(format!(
                    "pool {} ({}): score weights sum to {} instead of {}",
                    pool.name, pool.chain, weight_sum, SCALE
                ));
            }
        }

        let parents: Vec<&PoolConfig> = self.pools.iter().filter(|p| p.kind == PoolKind::Parent).collect();
        match parents.as_slice() {
            [parent] if parent.chain == self.parent_chain => {}
            [parent] => {
                return Err(KeeperError::Config(format!(
                    "parent_chain {} does not match parent pool {} on chain {}",
                    self.parent_chain, parent.name, parent.chain
                )))
            }
            [] => return Err(KeeperError::Config("no parent pool configured".into())),
            _ => return Err(KeeperError::Config("more than one parent pool configured".into())),
        }

        Ok(warnings)
    }

    pub fn pool(&self, chain: ChainSelector) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.chain == chain)
    }

    pub fn chains(&self) -> Vec<ChainSelector> {
        self.pools.iter().map(|p| p.chain).collect()
    }

    pub fn child_chains(&self) -> Vec<ChainSelector> {
        self.pools
            .iter()
            .filter(|p| p.kind == PoolKind::Child)
            .map(|p| p.chain)
            .collect()
    }

    /// Expected routes: every configured pool to every other
    pub fn route_table(&self) -> RouteTable {
        let mut table = RouteTable::new();
        for pool in &self.pools {
            table.register_pool(pool.chain, pool.address);
        }
        table.full_mesh();
        table
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }

    pub fn inflight_ttl(&self) -> Duration {
        Duration::from_millis(self.inflight_ttl_ms)
    }
}
