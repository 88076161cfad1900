//! Deposit/withdrawal queues and the batch state machine
//!
//! `Idle -> Draining -> Idle`. A drain removes every eligible entry at once;
//! a failed batch goes back to `Idle` without restoring its entries and is
//! parked for operator intervention.

use crate::math::*;
use crate::state::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueSide {
    Deposit,
    Withdrawal,
}

impl fmt::Display for QueueSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueSide::Deposit => f.write_str("deposit"),
            QueueSide::Withdrawal => f.write_str("withdrawal"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("{side} amount {amount} below minimum {min}")]
    MinAmount { side: QueueSide, amount: u128, min: u128 },

    #[error("batch {batch_id} already in progress")]
    BatchInProgress { batch_id: u64 },

    #[error("no batch in progress")]
    NoBatchInProgress,

    #[error("batch {got} does not match batch in progress {expected}")]
    BatchMismatch { expected: u64, got: u64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuePhase {
    #[default]
    Idle,
    Draining { batch_id: u64 },
}

/// Entries removed by one drain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub id: u64,
    pub deposits: Vec<QueueEntry>,
    pub withdrawals: Vec<QueueEntry>,
}

impl Batch {
    pub fn deposit_total(&self) -> u128 {
        self.deposits.iter().fold(0, |acc, e| add_u128(acc, e.amount))
    }

    pub fn withdrawal_total(&self) -> u128 {
        self.withdrawals.iter().fold(0, |acc, e| add_u128(acc, e.amount))
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty() && self.withdrawals.is_empty()
    }
}

/// Which sides of the queue may be batched right now
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReadiness {
    pub deposits: bool,
    pub withdrawals: bool,
}

impl BatchReadiness {
    pub fn is_ready(&self) -> bool {
        self.deposits || self.withdrawals
    }
}

/// A side is ready once its queue reaches the configured minimum.
/// Deposits are additionally held back while blocked (cap reached or
/// score suppression). A minimum of zero is always eligible.
pub fn batch_readiness(
    deposit_len: u32,
    withdrawal_len: u32,
    params: &QueueParams,
    deposits_blocked: bool,
) -> BatchReadiness {
    BatchReadiness {
        deposits: deposit_len >= params.min_deposit_queue_length && !deposits_blocked,
        withdrawals: withdrawal_len >= params.min_withdrawal_queue_length,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolQueues {
    deposits: Vec<QueueEntry>,
    withdrawals: Vec<QueueEntry>,
    phase: QueuePhase,
    next_batch_id: u64,
    failed: Vec<Batch>,
}

impl PoolQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_deposit(&mut self, params: &QueueParams, entry: QueueEntry) -> Result<(), QueueError> {
        if entry.amount < params.min_deposit_amount {
            return Err(QueueError::MinAmount {
                side: QueueSide::Deposit,
                amount: entry.amount,
                min: params.min_deposit_amount,
            });
        }
        self.deposits.push(entry);
        Ok(())
    }

    pub fn enqueue_withdrawal(&mut self, params: &QueueParams, entry: QueueEntry) -> Result<(), QueueError> {
        if entry.amount < params.min_withdrawal_amount {
            return Err(QueueError::MinAmount {
                side: QueueSide::Withdrawal,
                amount: entry.amount,
                min: params.min_withdrawal_amount,
            });
        }
        self.withdrawals.push(entry);
        Ok(())
    }

    pub fn deposit_len(&self) -> u32 {
        self.deposits.len() as u32
    }

    pub fn withdrawal_len(&self) -> u32 {
        self.withdrawals.len() as u32
    }

    pub fn deposits(&self) -> &[QueueEntry] {
        &self.deposits
    }

    pub fn withdrawals(&self) -> &[QueueEntry] {
        &self.withdrawals
    }

    pub fn queued_deposit_total(&self) -> u128 {
        self.deposits.iter().fold(0, |acc, e| add_u128(acc, e.amount))
    }

    pub fn queued_withdrawal_total(&self) -> u128 {
        self.withdrawals.iter().fold(0, |acc, e| add_u128(acc, e.amount))
    }

    pub fn phase(&self) -> QueuePhase {
        self.phase
    }

    pub fn batch_in_progress(&self) -> bool {
        matches!(self.phase, QueuePhase::Draining { .. })
    }

    /// Either queue has reached its ceiling (a zero ceiling never fills)
    pub fn is_full(&self, params: &QueueParams) -> bool {
        let deposits_full = params.target_deposit_queue_length > 0
            && self.deposit_len() >= params.target_deposit_queue_length;
        let withdrawals_full = params.target_withdrawal_queue_length > 0
            && self.withdrawal_len() >= params.target_withdrawal_queue_length;
        deposits_full || withdrawals_full
    }

    /// Atomically take every queued withdrawal, and every queued deposit when
    /// `include_deposits`. Only one drain may run at a time.
    pub fn drain_batch(&mut self, include_deposits: bool) -> Result<Batch, QueueError> {
        if let QueuePhase::Draining { batch_id } = self.phase {
            return Err(QueueError::BatchInProgress { batch_id });
        }
        let id = self.next_batch_id;
        self.next_batch_id = self.next_batch_id.wrapping_add(1);
        self.phase = QueuePhase::Draining { batch_id: id };

        let deposits = if include_deposits {
            std::mem::take(&mut self.deposits)
        } else {
            Vec::new()
        };
        let withdrawals = std::mem::take(&mut self.withdrawals);
        Ok(Batch { id, deposits, withdrawals })
    }

    pub fn complete_batch(&mut self, batch_id: u64) -> Result<(), QueueError> {
        self.check_draining(batch_id)?;
        self.phase = QueuePhase::Idle;
        Ok(())
    }

    /// Back to `Idle`. The entries stay out of the queues.
    pub fn fail_batch(&mut self, batch: Batch) -> Result<(), QueueError> {
        self.check_draining(batch.id)?;
        self.phase = QueuePhase::Idle;
        self.failed.push(batch);
        Ok(())
    }

    pub fn failed_batches(&self) -> &[Batch] {
        &self.failed
    }

    /// Deposit liquidity held by failed batches (still in the pool, not usable)
    pub fn stranded_deposits(&self) -> u128 {
        self.failed.iter().fold(0, |acc, b| add_u128(acc, b.deposit_total()))
    }

    fn check_draining(&self, batch_id: u64) -> Result<(), QueueError> {
        match self.phase {
            QueuePhase::Idle => Err(QueueError::NoBatchInProgress),
            QueuePhase::Draining { batch_id: current } if current != batch_id => Err(QueueError::BatchMismatch {
                expected: current,
                got: batch_id,
            }),
            QueuePhase::Draining { .. } => Ok(()),
        }
    }
}
