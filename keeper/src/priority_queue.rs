//! Priority queue for ordering pools by imbalance (max-heap by imbalance)

use pool_model::{ChainSelector, PoolSnapshot};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Pool imbalance snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolImbalance {
    pub chain: ChainSelector,
    /// Deficit, 0 when in surplus
    pub deficit: u128,
    /// Surplus, 0 when in deficit
    pub surplus: u128,
    /// Block the snapshot was read at
    pub block: u64,
}

impl PoolImbalance {
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Self {
        Self {
            chain: snapshot.chain,
            deficit: snapshot.deficit(),
            surplus: snapshot.surplus(),
            block: snapshot.block,
        }
    }

    pub fn magnitude(&self) -> u128 {
        self.deficit.max(self.surplus)
    }

    pub fn is_balanced(&self) -> bool {
        self.deficit == 0 && self.surplus == 0
    }
}

/// Imbalance-ordered queue: largest imbalance first, lower selector on ties
pub struct ImbalanceQueue {
    queue: PriorityQueue<ChainSelector, (u128, Reverse<ChainSelector>)>,
    map: HashMap<ChainSelector, PoolImbalance>,
}

impl ImbalanceQueue {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            map: HashMap::new(),
        }
    }

    /// Push or update a pool
    pub fn push(&mut self, imbalance: PoolImbalance) {
        let chain = imbalance.chain;
        let priority = (imbalance.magnitude(), Reverse(chain));
        self.map.insert(chain, imbalance);
        self.queue.push(chain, priority);
    }

    /// Pop the most imbalanced pool
    pub fn pop(&mut self) -> Option<PoolImbalance> {
        let (chain, _priority) = self.queue.pop()?;
        self.map.remove(&chain)
    }

    pub fn peek(&self) -> Option<&PoolImbalance> {
        let (chain, _priority) = self.queue.peek()?;
        self.map.get(chain)
    }

    pub fn remove(&mut self, chain: &ChainSelector) -> Option<PoolImbalance> {
        self.queue.remove(chain);
        self.map.remove(chain)
    }

    pub fn get(&self, chain: &ChainSelector) -> Option<&PoolImbalance> {
        self.map.get(chain)
    }

    pub fn contains(&self, chain: &ChainSelector) -> bool {
        self.map.contains_key(chain)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.map.clear();
    }

    /// Drain into resolution order
    pub fn into_ordered(mut self) -> Vec<PoolImbalance> {
        let mut ordered = Vec::with_capacity(self.len());
        while let Some(next) = self.pop() {
            ordered.push(next);
        }
        ordered
    }
}

impl Default for ImbalanceQueue {
    fn default() -> Self {
        Self::new()
    }
}
