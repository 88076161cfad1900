//! Identifiers shared by the pool model and the keeper

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cross-chain selector identifying a chain (one pool per chain)
pub type ChainSelector = u64;

/// 20-byte account / contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address must be 20 bytes, got {0}")]
    Length(usize),

    #[error("invalid hex in address: {0}")]
    Hex(String),
}

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Address whose low 8 bytes hold `v` (local networks and tests)
    pub fn from_low_u64(v: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&v.to_be_bytes());
        Address(bytes)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| AddressParseError::Hex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressParseError::Length(bytes.len()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Transaction identifier assigned by the ledger
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TxHash(pub u64);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Pool variant. Parent pools sit on the hub chain and own the LP queues;
/// child pools rely on the parent for deficit funding and surplus absorption.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Parent,
    Child,
}

impl PoolKind {
    pub fn reports_balance(&self) -> bool {
        true
    }

    pub fn accepts_deposits(&self) -> bool {
        matches!(self, PoolKind::Parent)
    }

    pub fn accepts_withdrawals(&self) -> bool {
        matches!(self, PoolKind::Parent)
    }

    pub fn exposed_to_reconciler(&self) -> bool {
        true
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Parent => f.write_str("parent"),
            PoolKind::Child => f.write_str("child"),
        }
    }
}
