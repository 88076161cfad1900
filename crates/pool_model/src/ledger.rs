//! Fungible token balances (liquidity token, IOU, LP shares)

use crate::math::*;
use crate::types::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance for {holder}: have {available}, need {needed}")]
    InsufficientBalance {
        holder: Address,
        available: u128,
        needed: u128,
    },

    #[error("supply overflow")]
    Overflow,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenLedger {
    balances: HashMap<Address, u128>,
    total_supply: u128,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn mint(&mut self, to: Address, amount: u128) -> Result<(), LedgerError> {
        let supply = self.total_supply.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let balance = self.balance_of(&to).checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: u128) -> Result<(), LedgerError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: from,
                available: balance,
                needed: amount,
            });
        }
        self.balances.insert(from, balance - amount);
        self.total_supply = sub_u128(self.total_supply, amount);
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<(), LedgerError> {
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: from,
                available: from_balance,
                needed: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        self.balances.insert(from, from_balance - amount);
        let to_balance = add_u128(self.balance_of(&to), amount);
        self.balances.insert(to, to_balance);
        Ok(())
    }

    /// Overwrite a balance, adjusting supply to match (provisioning and tests)
    pub fn set_balance(&mut self, holder: Address, amount: u128) {
        let old = self.balance_of(&holder);
        self.total_supply = add_u128(sub_u128(self.total_supply, old), amount);
        self.balances.insert(holder, amount);
    }
}
