//! Transaction builder for pool calls

use pool_model::{Address, ChainSelector, EventTag, ParamUpdate};

/// Pool write interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCall {
    FillDeficit { amount: u128 },
    TakeSurplus { amount: u128 },
    TriggerDepositWithdrawProcess,
    ProcessPendingWithdrawals,
    SendSnapshot,
    SetParam(ParamUpdate),
}

impl PoolCall {
    /// Contract method name (used in logs)
    pub fn name(&self) -> &'static str {
        match self {
            PoolCall::FillDeficit { .. } => "fillDeficit",
            PoolCall::TakeSurplus { .. } => "takeSurplus",
            PoolCall::TriggerDepositWithdrawProcess => "triggerDepositWithdrawProcess",
            PoolCall::ProcessPendingWithdrawals => "processPendingWithdrawals",
            PoolCall::SendSnapshot => "sendSnapshot",
            PoolCall::SetParam(update) => update.setter(),
        }
    }

    /// Event whose presence in the receipt confirms the call
    pub fn completion_event(&self) -> EventTag {
        match self {
            PoolCall::FillDeficit { .. } => EventTag::DeficitFilled,
            PoolCall::TakeSurplus { .. } => EventTag::SurplusTaken,
            PoolCall::TriggerDepositWithdrawProcess => EventTag::DepositWithdrawTriggered,
            PoolCall::ProcessPendingWithdrawals => EventTag::PendingWithdrawalsProcessed,
            PoolCall::SendSnapshot => EventTag::SnapshotSent,
            PoolCall::SetParam(_) => EventTag::ParamUpdated,
        }
    }

    fn discriminator(&self) -> u8 {
        match self {
            PoolCall::FillDeficit { .. } => 0,
            PoolCall::TakeSurplus { .. } => 1,
            PoolCall::TriggerDepositWithdrawProcess => 2,
            PoolCall::ProcessPendingWithdrawals => 3,
            PoolCall::SendSnapshot => 4,
            PoolCall::SetParam(_) => 5,
        }
    }

    /// Discriminator byte followed by the big-endian amount, if any.
    /// Parameter writes carry only the discriminator.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![self.discriminator()];
        match self {
            PoolCall::FillDeficit { amount } | PoolCall::TakeSurplus { amount } => {
                data.extend_from_slice(&amount.to_be_bytes());
            }
            _ => {}
        }
        data
    }

    /// Hex calldata for log lines
    pub fn calldata_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub chain: ChainSelector,
    pub to: Address,
    pub from: Address,
    pub call: PoolCall,
    pub gas_limit: u64,
}

pub fn build_fill_deficit(chain: ChainSelector, pool: Address, filler: Address, amount: u128, gas_limit: u64) -> Transaction {
    Transaction {
        chain,
        to: pool,
        from: filler,
        call: PoolCall::FillDeficit { amount },
        gas_limit,
    }
}

pub fn build_take_surplus(chain: ChainSelector, pool: Address, sweeper: Address, amount: u128, gas_limit: u64) -> Transaction {
    Transaction {
        chain,
        to: pool,
        from: sweeper,
        call: PoolCall::TakeSurplus { amount },
        gas_limit,
    }
}

/// Keeper-only calls that take no arguments
pub fn build_keeper_call(chain: ChainSelector, pool: Address, keeper: Address, call: PoolCall, gas_limit: u64) -> Transaction {
    Transaction {
        chain,
        to: pool,
        from: keeper,
        call,
        gas_limit,
    }
}

pub fn build_set_param(chain: ChainSelector, pool: Address, admin: Address, update: ParamUpdate, gas_limit: u64) -> Transaction {
    Transaction {
        chain,
        to: pool,
        from: admin,
        call: PoolCall::SetParam(update),
        gas_limit,
    }
}
