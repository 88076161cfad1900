//! Event waiting with explicit timeouts

use crate::error::{KeeperError, KeeperResult};
use pool_model::{ChainSelector, EventTag, PoolEvent};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Wait for the first event matching `predicate`. Lagged receivers keep
/// waiting; a closed stream or the timeout ends the wait with an error.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<PoolEvent>,
    mut predicate: F,
    timeout: Duration,
) -> KeeperResult<PoolEvent>
where
    F: FnMut(&PoolEvent) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return Ok(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("event receiver lagged, {} events skipped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return Err(KeeperError::EventStreamClosed),
            }
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| KeeperError::Timeout {
            what: "event".to_string(),
            ms: timeout.as_millis() as u64,
        })?
}

/// Wait for `tag` emitted on `chain`
pub async fn wait_for(
    rx: &mut broadcast::Receiver<PoolEvent>,
    chain: ChainSelector,
    tag: EventTag,
    timeout: Duration,
) -> KeeperResult<PoolEvent> {
    wait_for_event(rx, |e| e.is(chain, tag), timeout)
        .await
        .map_err(|e| match e {
            KeeperError::Timeout { ms, .. } => KeeperError::Timeout {
                what: format!("{} on chain {}", tag, chain),
                ms,
            },
            other => other,
        })
}
