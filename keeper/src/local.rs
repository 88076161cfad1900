//! In-process chain backend
//!
//! `LocalChain` serves the `PoolClient` interface from a `pool_model`
//! network held behind a mutex, broadcasting every emitted event. It backs
//! the binary's local mode and the integration tests; latency, deferred
//! confirmations and per-chain faults can be injected.

use crate::client::{ClientError, PoolClient, TxReceipt, TxStatus};
use crate::config::Config;
use crate::tx_builder::{PoolCall, Transaction};
use async_trait::async_trait;
use pool_model::network::{Network, PoolSetup, Receipt, Revert};
use pool_model::{Address, ChainSelector, ParamUpdate, PoolEvent, PoolKind, PoolParams, PoolView, TxHash};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, MutexGuard};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Deferred submissions get ids above anything the ledger assigns
const TICKET_BASE: u64 = 1 << 48;

#[derive(Debug, Default)]
struct Faults {
    unobservable: HashSet<ChainSelector>,
    failing_submits: HashSet<ChainSelector>,
    rejected_calls: HashSet<(ChainSelector, &'static str)>,
}

pub struct LocalChain {
    network: Arc<Mutex<Network>>,
    events: broadcast::Sender<PoolEvent>,
    statuses: Arc<Mutex<HashMap<TxHash, TxStatus>>>,
    faults: Mutex<Faults>,
    latency: Duration,
    deferred: bool,
    next_ticket: AtomicU64,
    submitted: AtomicUsize,
}

impl LocalChain {
    pub fn new(network: Network) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            network: Arc::new(Mutex::new(network)),
            events,
            statuses: Arc::new(Mutex::new(HashMap::new())),
            faults: Mutex::new(Faults::default()),
            latency: Duration::ZERO,
            deferred: false,
            next_ticket: AtomicU64::new(TICKET_BASE),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Deploy every configured pool (parent first), owned by the configured
    /// admin with the operator as keeper, and route them all to each other
    pub fn from_config(config: &Config) -> Result<Self, Revert> {
        let admin = config.admin.unwrap_or(config.operator);
        let mut network = Network::new();

        let mut pools: Vec<_> = config.pools.iter().collect();
        pools.sort_by_key(|p| (p.kind != PoolKind::Parent, p.chain));
        for pool in &pools {
            network.add_pool(PoolSetup {
                chain: pool.chain,
                kind: pool.kind,
                address: pool.address,
                admin,
                keeper: config.operator,
                params: pool.pool_params(),
            })?;
        }
        for src in &pools {
            for dst in &pools {
                if src.chain != dst.chain {
                    network.apply_param(
                        src.chain,
                        admin,
                        ParamUpdate::DstPool { chain: dst.chain, pool: dst.address },
                    )?;
                }
            }
        }
        Ok(Self::new(network))
    }

    /// Delay applied to every read and submission
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// `submit` returns a pending receipt and the call lands after the latency
    pub fn with_deferred_confirmations(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    /// Direct access for provisioning and assertions
    pub async fn network(&self) -> MutexGuard<'_, Network> {
        self.network.lock().await
    }

    /// Run a ledger call outside the keeper (users, admin scripts) and
    /// broadcast its events
    pub async fn apply<F>(&self, f: F) -> Result<Receipt, Revert>
    where
        F: FnOnce(&mut Network) -> Result<Receipt, Revert>,
    {
        let receipt = {
            let mut network = self.network.lock().await;
            f(&mut network)?
        };
        publish(&self.events, &receipt.events);
        Ok(receipt)
    }

    pub async fn set_unobservable(&self, chain: ChainSelector, on: bool) {
        let mut faults = self.faults.lock().await;
        if on {
            faults.unobservable.insert(chain);
        } else {
            faults.unobservable.remove(&chain);
        }
    }

    pub async fn set_failing_submits(&self, chain: ChainSelector, on: bool) {
        let mut faults = self.faults.lock().await;
        if on {
            faults.failing_submits.insert(chain);
        } else {
            faults.failing_submits.remove(&chain);
        }
    }

    /// Revert every `action` call on `chain` without touching the ledger
    pub async fn set_rejecting(&self, chain: ChainSelector, action: &'static str, on: bool) {
        let mut faults = self.faults.lock().await;
        if on {
            faults.rejected_calls.insert((chain, action));
        } else {
            faults.rejected_calls.remove(&(chain, action));
        }
    }

    /// Transactions handed to `submit`, including reverted ones
    pub fn submitted_count(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    async fn check_readable(&self, chain: ChainSelector) -> Result<(), ClientError> {
        if self.faults.lock().await.unobservable.contains(&chain) {
            return Err(ClientError::Transport(format!("node for chain {} unavailable", chain)));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(())
    }
}

fn publish(sender: &broadcast::Sender<PoolEvent>, events: &[PoolEvent]) {
    for event in events {
        // No subscribers is fine
        let _ = sender.send(event.clone());
    }
}

fn read_err(e: Revert) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// Dispatch a transaction to the ledger
fn execute(network: &mut Network, tx: &Transaction) -> Result<Receipt, Revert> {
    let pool = network.chain(tx.chain)?.pool.address;
    if tx.to != pool {
        return Err(Revert::InvalidParam(format!("{} is not the pool on chain {}", tx.to, tx.chain)));
    }
    match tx.call {
        PoolCall::FillDeficit { amount } => network.fill_deficit(tx.chain, tx.from, amount),
        PoolCall::TakeSurplus { amount } => network.take_surplus(tx.chain, tx.from, amount),
        PoolCall::TriggerDepositWithdrawProcess => network.trigger_deposit_withdraw_process(tx.chain, tx.from),
        PoolCall::ProcessPendingWithdrawals => network.process_pending_withdrawals(tx.chain, tx.from),
        PoolCall::SendSnapshot => network.send_snapshot(tx.chain, tx.from),
        PoolCall::SetParam(update) => network.apply_param(tx.chain, tx.from, update),
    }
}

#[async_trait]
impl PoolClient for LocalChain {
    async fn pool_view(&self, chain: ChainSelector) -> Result<PoolView, ClientError> {
        self.check_readable(chain).await?;
        self.network.lock().await.view(chain).map_err(read_err)
    }

    async fn pool_params(&self, chain: ChainSelector) -> Result<PoolParams, ClientError> {
        self.check_readable(chain).await?;
        self.network.lock().await.params(chain).map_err(read_err)
    }

    async fn dst_pool(&self, chain: ChainSelector, dst: ChainSelector) -> Result<Address, ClientError> {
        self.check_readable(chain).await?;
        self.network.lock().await.dst_pool(chain, dst).map_err(read_err)
    }

    async fn liquidity_balance(&self, chain: ChainSelector, holder: Address) -> Result<u128, ClientError> {
        self.check_readable(chain).await?;
        self.network.lock().await.liquidity_balance(chain, &holder).map_err(read_err)
    }

    async fn debt_balance(&self, chain: ChainSelector, holder: Address) -> Result<u128, ClientError> {
        self.check_readable(chain).await?;
        self.network.lock().await.debt_balance(chain, &holder).map_err(read_err)
    }

    async fn submit(&self, tx: Transaction) -> Result<TxReceipt, ClientError> {
        let chain = tx.chain;
        let action = tx.call.name();
        {
            let faults = self.faults.lock().await;
            if faults.failing_submits.contains(&chain) {
                return Err(ClientError::Transport(format!("submission to chain {} failed", chain)));
            }
            self.submitted.fetch_add(1, Ordering::SeqCst);
            if faults.rejected_calls.contains(&(chain, action)) {
                return Err(ClientError::Reverted(format!("{} rejected on chain {}", action, chain)));
            }
        }

        if self.deferred {
            let ticket = TxHash(self.next_ticket.fetch_add(1, Ordering::SeqCst));
            self.statuses.lock().await.insert(ticket, TxStatus::Pending);

            let network = Arc::clone(&self.network);
            let statuses = Arc::clone(&self.statuses);
            let events = self.events.clone();
            let latency = self.latency;
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                let result = execute(&mut *network.lock().await, &tx);
                let status = match result {
                    Ok(receipt) => {
                        publish(&events, &receipt.events);
                        TxStatus::Confirmed
                    }
                    Err(e) => {
                        log::debug!("deferred tx {} reverted: {}", ticket, e);
                        TxStatus::Reverted
                    }
                };
                statuses.lock().await.insert(ticket, status);
            });

            return Ok(TxReceipt {
                tx: ticket,
                chain,
                block: 0,
                status: TxStatus::Pending,
                events: Vec::new(),
            });
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = execute(&mut *self.network.lock().await, &tx);
        match result {
            Ok(receipt) => {
                self.statuses.lock().await.insert(receipt.tx, TxStatus::Confirmed);
                publish(&self.events, &receipt.events);
                Ok(TxReceipt {
                    tx: receipt.tx,
                    chain: receipt.chain,
                    block: receipt.block,
                    status: TxStatus::Confirmed,
                    events: receipt.events,
                })
            }
            Err(e) => Err(ClientError::Reverted(e.to_string())),
        }
    }

    async fn tx_status(&self, _chain: ChainSelector, tx: TxHash) -> Result<TxStatus, ClientError> {
        Ok(self.statuses.lock().await.get(&tx).copied().unwrap_or(TxStatus::Unknown))
    }

    fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }
}
