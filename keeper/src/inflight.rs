//! In-flight transaction tracking
//!
//! A pool with an unconfirmed keeper call or correction gets no new
//! transaction until the previous one settles or its entry expires.

use crate::client::{PoolClient, TxStatus};
use pool_model::{ChainSelector, TxHash};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub tx: TxHash,
    pub action: &'static str,
    pub amount: u128,
    pub submitted_at: Instant,
}

pub struct InFlightTracker {
    entries: Mutex<HashMap<ChainSelector, InFlight>>,
    ttl: Duration,
}

impl InFlightTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn record(&self, chain: ChainSelector, entry: InFlight) {
        self.entries.lock().await.insert(chain, entry);
    }

    pub async fn get(&self, chain: ChainSelector) -> Option<InFlight> {
        self.entries.lock().await.get(&chain).cloned()
    }

    pub async fn clear(&self, chain: ChainSelector) {
        self.entries.lock().await.remove(&chain);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True while the pool's last transaction is still pending and younger
    /// than the ttl. Settled or expired entries are dropped.
    pub async fn blocks(&self, chain: ChainSelector, client: &dyn PoolClient) -> bool {
        let Some(entry) = self.get(chain).await else {
            return false;
        };
        if entry.submitted_at.elapsed() >= self.ttl {
            log::warn!(
                "chain={} action={} tx={} unconfirmed after {} ms, dropping",
                chain,
                entry.action,
                entry.tx,
                self.ttl.as_millis()
            );
            self.clear(chain).await;
            return false;
        }

        match client.tx_status(chain, entry.tx).await {
            Ok(TxStatus::Pending) => true,
            Ok(status) => {
                log::debug!("chain={} action={} tx={} settled as {:?}", chain, entry.action, entry.tx, status);
                self.clear(chain).await;
                false
            }
            // Unknown state keeps blocking until the ttl runs out
            Err(e) => {
                log::debug!("chain={} tx={} status unavailable: {}", chain, entry.tx, e);
                true
            }
        }
    }
}
