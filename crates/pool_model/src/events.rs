//! Pool events (completion signals for keepers, tests and monitoring)

use crate::state::ParamUpdate;
use crate::types::*;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventTag {
    DepositQueued,
    WithdrawalQueued,
    SnapshotSent,
    SnapshotReceived,
    DepositWithdrawTriggered,
    BatchFailed,
    PendingWithdrawalsProcessed,
    DeficitFilled,
    SurplusTaken,
    Bridged,
    ParamUpdated,
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    DepositQueued {
        user: Address,
        amount: u128,
    },
    WithdrawalQueued {
        user: Address,
        shares: u128,
    },
    /// Emitted by the child pool
    SnapshotSent {
        parent_chain: ChainSelector,
        epoch: u64,
        balance: u128,
    },
    /// Emitted by the parent pool
    SnapshotReceived {
        child_chain: ChainSelector,
        epoch: u64,
        balance: u128,
    },
    DepositWithdrawTriggered {
        epoch: u64,
        deposits: u32,
        withdrawals: u32,
        lp_minted: u128,
        withdrawals_owed: u128,
    },
    BatchFailed {
        batch_id: u64,
        reason: String,
    },
    PendingWithdrawalsProcessed {
        count: u32,
        total: u128,
    },
    DeficitFilled {
        filler: Address,
        amount: u128,
        fee: u128,
        iou_minted: u128,
    },
    SurplusTaken {
        sweeper: Address,
        amount: u128,
        fee: u128,
        payout: u128,
    },
    Bridged {
        sender: Address,
        receiver: Address,
        dst_chain: ChainSelector,
        amount: u128,
        fee: u128,
    },
    ParamUpdated(ParamUpdate),
}

impl EventKind {
    pub fn tag(&self) -> EventTag {
        match self {
            EventKind::DepositQueued { .. } => EventTag::DepositQueued,
            EventKind::WithdrawalQueued { .. } => EventTag::WithdrawalQueued,
            EventKind::SnapshotSent { .. } => EventTag::SnapshotSent,
            EventKind::SnapshotReceived { .. } => EventTag::SnapshotReceived,
            EventKind::DepositWithdrawTriggered { .. } => EventTag::DepositWithdrawTriggered,
            EventKind::BatchFailed { .. } => EventTag::BatchFailed,
            EventKind::PendingWithdrawalsProcessed { .. } => EventTag::PendingWithdrawalsProcessed,
            EventKind::DeficitFilled { .. } => EventTag::DeficitFilled,
            EventKind::SurplusTaken { .. } => EventTag::SurplusTaken,
            EventKind::Bridged { .. } => EventTag::Bridged,
            EventKind::ParamUpdated(_) => EventTag::ParamUpdated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolEvent {
    pub chain: ChainSelector,
    pub pool: Address,
    pub block: u64,
    pub tx: TxHash,
    pub kind: EventKind,
}

impl PoolEvent {
    pub fn tag(&self) -> EventTag {
        self.kind.tag()
    }

    pub fn is(&self, chain: ChainSelector, tag: EventTag) -> bool {
        self.chain == chain && self.tag() == tag
    }
}
