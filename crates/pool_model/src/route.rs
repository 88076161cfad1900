//! Cross-chain destination pool routes
//!
//! A route between two chains is usable only when both directions are set and
//! each points at the pool registered on the other side.

use crate::types::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {src} -> {dst} is not configured")]
    NotConfigured { src: ChainSelector, dst: ChainSelector },

    #[error("route {src} -> {dst} is asymmetric")]
    Asymmetric { src: ChainSelector, dst: ChainSelector },

    #[error("self route on chain {0}")]
    SelfRoute(ChainSelector),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteTable {
    pools: HashMap<ChainSelector, Address>,
    routes: HashMap<(ChainSelector, ChainSelector), Address>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pool deployed on `chain`
    pub fn register_pool(&mut self, chain: ChainSelector, pool: Address) {
        self.pools.insert(chain, pool);
    }

    pub fn pool(&self, chain: ChainSelector) -> Option<Address> {
        self.pools.get(&chain).copied()
    }

    pub fn chains(&self) -> Vec<ChainSelector> {
        let mut chains: Vec<_> = self.pools.keys().copied().collect();
        chains.sort_unstable();
        chains
    }

    pub fn set_route(&mut self, src: ChainSelector, dst: ChainSelector, pool: Address) -> Result<(), RouteError> {
        if src == dst {
            return Err(RouteError::SelfRoute(src));
        }
        self.routes.insert((src, dst), pool);
        Ok(())
    }

    pub fn clear_route(&mut self, src: ChainSelector, dst: ChainSelector) {
        self.routes.remove(&(src, dst));
    }

    /// Raw one-directional entry, no checks
    pub fn raw_route(&self, src: ChainSelector, dst: ChainSelector) -> Option<Address> {
        self.routes.get(&(src, dst)).copied()
    }

    /// Destination pool for `src -> dst`, enforcing non-self and symmetry
    pub fn get_route(&self, src: ChainSelector, dst: ChainSelector) -> Result<Address, RouteError> {
        if src == dst {
            return Err(RouteError::SelfRoute(src));
        }
        let (forward, backward) = match (self.raw_route(src, dst), self.raw_route(dst, src)) {
            (Some(f), Some(b)) => (f, b),
            _ => return Err(RouteError::NotConfigured { src, dst }),
        };
        if forward.is_zero() || backward.is_zero() {
            return Err(RouteError::NotConfigured { src, dst });
        }

        // Each direction must name the pool registered on the far side
        let forward_ok = self.pools.get(&dst).map_or(true, |p| *p == forward);
        let backward_ok = self.pools.get(&src).map_or(true, |p| *p == backward);
        if !forward_ok || !backward_ok {
            return Err(RouteError::Asymmetric { src, dst });
        }
        Ok(forward)
    }

    /// Routes every registered pool to every other registered pool
    pub fn full_mesh(&mut self) {
        let pools: Vec<(ChainSelector, Address)> = self.pools.iter().map(|(c, a)| (*c, *a)).collect();
        for (src, _) in &pools {
            for (dst, dst_pool) in &pools {
                if src != dst {
                    self.routes.insert((*src, *dst), *dst_pool);
                }
            }
        }
    }
}
