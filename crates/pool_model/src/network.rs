//! In-process pool network
//!
//! Executes the pool write interface with ledger semantics: every call checks
//! all of its preconditions before touching state, so a `Revert` leaves the
//! network unchanged. Successful calls return a `Receipt` carrying the events
//! they emitted. One parent pool, any number of children, one pool per chain.

use crate::events::*;
use crate::ledger::*;
use crate::math::*;
use crate::queue::*;
use crate::reconcile::{fill_terms, sweep_terms};
use crate::route::*;
use crate::score::*;
use crate::state::*;
use crate::types::*;
use crate::view::*;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Revert {
    #[error("no pool on chain {0}")]
    UnknownPool(ChainSelector),

    #[error("pool already registered on chain {0}")]
    PoolExists(ChainSelector),

    #[error("no parent pool registered")]
    NoParentPool,

    #[error("parent pool already registered on chain {0}")]
    ParentExists(ChainSelector),

    #[error("{op} not supported by {kind} pool")]
    WrongPoolKind { op: &'static str, kind: PoolKind },

    #[error("caller {0} is not authorized")]
    Unauthorized(Address),

    #[error("zero amount")]
    ZeroAmount,

    #[error("amount {requested} exceeds outstanding deficit {outstanding}")]
    AmountExceedsDeficit { requested: u128, outstanding: u128 },

    #[error("amount {requested} exceeds outstanding surplus {outstanding}")]
    AmountExceedsSurplus { requested: u128, outstanding: u128 },

    #[error("fee consumes the whole amount {0}")]
    NetAmountZero(u128),

    #[error("insufficient pool liquidity: need {needed}, have {available}")]
    InsufficientLiquidity { needed: u128, available: u128 },

    #[error("missing child snapshots for chains {0:?}")]
    MissingSnapshots(Vec<ChainSelector>),

    #[error("snapshot for epoch {epoch} already sent")]
    SnapshotAlreadySent { epoch: u64 },

    #[error("batch not ready")]
    NotReady,

    #[error("no pending withdrawals")]
    NothingPending,

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result of a confirmed call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx: TxHash,
    pub chain: ChainSelector,
    pub block: u64,
    pub events: Vec<PoolEvent>,
}

impl Receipt {
    pub fn has(&self, tag: EventTag) -> bool {
        self.events.iter().any(|e| e.tag() == tag)
    }
}

/// Settled withdrawal awaiting payout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingWithdrawal {
    pub user: Address,
    pub amount: u128,
    pub epoch: u64,
}

#[derive(Clone, Debug)]
pub struct PoolSetup {
    pub chain: ChainSelector,
    pub kind: PoolKind,
    pub address: Address,
    pub admin: Address,
    pub keeper: Address,
    pub params: PoolParams,
}

#[derive(Clone, Debug)]
pub struct PoolState {
    pub address: Address,
    pub kind: PoolKind,
    pub admin: Address,
    pub keeper: Address,
    pub params: PoolParams,
    pub fee_reserve: u128,
    pub protocol_fees: u128,
    pub queues: PoolQueues,
    pub epoch: u64,
    /// Parent: child chains and their snapshots for the current epoch
    pub children: Vec<ChainSelector>,
    pub child_snapshots: BTreeMap<ChainSelector, u128>,
    /// Child: parent epoch of the last snapshot sent
    pub last_snapshot_epoch: Option<u64>,
    pub pending_withdrawals: Vec<PendingWithdrawal>,
    pub flow: FlowWindow,
    pub dst_pools: HashMap<ChainSelector, Address>,
}

#[derive(Clone, Debug)]
pub struct ChainState {
    pub selector: ChainSelector,
    pub block: u64,
    pub pool: PoolState,
    pub liquidity: TokenLedger,
    pub iou: TokenLedger,
    pub lp: TokenLedger,
}

impl ChainState {
    /// Pool liquidity minus reserved fees, queued deposits and stranded batches
    pub fn active_balance(&self) -> u128 {
        let held = self.liquidity.balance_of(&self.pool.address);
        let reserved = [
            self.pool.fee_reserve,
            self.pool.protocol_fees,
            self.pool.queues.queued_deposit_total(),
            self.pool.queues.stranded_deposits(),
        ]
        .iter()
        .fold(0u128, |acc, v| add_u128(acc, *v));
        sub_u128(held, reserved)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            chain: self.selector,
            block: self.block,
            active_balance: self.active_balance(),
            target_balance: self.pool.params.target_balance,
            deposit_queue_length: self.pool.queues.deposit_len(),
            withdrawal_queue_length: self.pool.queues.withdrawal_len(),
        }
    }

    fn missing_snapshots(&self) -> Vec<ChainSelector> {
        self.pool
            .children
            .iter()
            .copied()
            .filter(|c| !self.pool.child_snapshots.contains_key(c))
            .collect()
    }

    fn network_liquidity(&self) -> u128 {
        self.pool
            .child_snapshots
            .values()
            .fold(self.active_balance(), |acc, v| add_u128(acc, *v))
    }

    fn pending_total(&self) -> u128 {
        self.pool.pending_withdrawals.iter().fold(0, |acc, p| add_u128(acc, p.amount))
    }

    fn composite_score(&self) -> Option<u128> {
        score_pool(&self.snapshot(), &self.pool.flow, &self.pool.params.score)
            .ok()
            .map(|s| s.composite)
    }

    fn deposits_suppressed(&self) -> bool {
        score_pool(&self.snapshot(), &self.pool.flow, &self.pool.params.score)
            .map(|s| deposits_suppressed(&s, &self.pool.params.score))
            .unwrap_or(false)
    }

    pub fn view(&self) -> PoolView {
        let is_parent = self.pool.kind == PoolKind::Parent;
        PoolView {
            kind: self.pool.kind,
            address: self.pool.address,
            snapshot: self.snapshot(),
            liquidity_cap: self.pool.params.liquidity_cap,
            queued_deposit_total: self.pool.queues.queued_deposit_total(),
            queues_full: self.pool.queues.is_full(&self.pool.params.queue),
            batch_in_progress: self.pool.queues.batch_in_progress(),
            epoch: if is_parent {
                self.pool.epoch
            } else {
                self.pool.last_snapshot_epoch.unwrap_or(0)
            },
            network_liquidity: if is_parent { self.network_liquidity() } else { self.active_balance() },
            missing_snapshots: if is_parent { self.missing_snapshots() } else { Vec::new() },
            last_snapshot_epoch: self.pool.last_snapshot_epoch,
            pending_withdrawal_count: self.pool.pending_withdrawals.len() as u32,
            pending_withdrawal_total: self.pending_total(),
            flow: self.pool.flow,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Network {
    chains: BTreeMap<ChainSelector, ChainState>,
    parent: Option<ChainSelector>,
    next_tx: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a zeroed pool. The parent must be added before its children.
    pub fn add_pool(&mut self, setup: PoolSetup) -> Result<(), Revert> {
        if self.chains.contains_key(&setup.chain) {
            return Err(Revert::PoolExists(setup.chain));
        }
        if setup.address.is_zero() {
            return Err(Revert::InvalidParam("zero pool address".into()));
        }
        validate_params(&setup.params)?;
        match setup.kind {
            PoolKind::Parent => {
                if let Some(existing) = self.parent {
                    return Err(Revert::ParentExists(existing));
                }
                self.parent = Some(setup.chain);
            }
            PoolKind::Child => {
                let parent = self.parent.ok_or(Revert::NoParentPool)?;
                if let Some(p) = self.chains.get_mut(&parent) {
                    p.pool.children.push(setup.chain);
                }
            }
        }

        let pool = PoolState {
            address: setup.address,
            kind: setup.kind,
            admin: setup.admin,
            keeper: setup.keeper,
            params: setup.params,
            fee_reserve: 0,
            protocol_fees: 0,
            queues: PoolQueues::new(),
            epoch: 0,
            children: Vec::new(),
            child_snapshots: BTreeMap::new(),
            last_snapshot_epoch: None,
            pending_withdrawals: Vec::new(),
            flow: FlowWindow::default(),
            dst_pools: HashMap::new(),
        };
        self.chains.insert(
            setup.chain,
            ChainState {
                selector: setup.chain,
                block: 1,
                pool,
                liquidity: TokenLedger::new(),
                iou: TokenLedger::new(),
                lp: TokenLedger::new(),
            },
        );
        Ok(())
    }

    pub fn chains(&self) -> Vec<ChainSelector> {
        self.chains.keys().copied().collect()
    }

    pub fn parent_chain(&self) -> Option<ChainSelector> {
        self.parent
    }

    pub fn chain(&self, chain: ChainSelector) -> Result<&ChainState, Revert> {
        self.chains.get(&chain).ok_or(Revert::UnknownPool(chain))
    }

    fn chain_mut(&mut self, chain: ChainSelector) -> Result<&mut ChainState, Revert> {
        self.chains.get_mut(&chain).ok_or(Revert::UnknownPool(chain))
    }

    // ---------- reads ----------

    pub fn snapshot(&self, chain: ChainSelector) -> Result<PoolSnapshot, Revert> {
        Ok(self.chain(chain)?.snapshot())
    }

    pub fn view(&self, chain: ChainSelector) -> Result<PoolView, Revert> {
        Ok(self.chain(chain)?.view())
    }

    pub fn params(&self, chain: ChainSelector) -> Result<PoolParams, Revert> {
        Ok(self.chain(chain)?.pool.params)
    }

    pub fn keeper_of(&self, chain: ChainSelector) -> Result<Address, Revert> {
        Ok(self.chain(chain)?.pool.keeper)
    }

    /// `getDstPool`: zero address when unset
    pub fn dst_pool(&self, chain: ChainSelector, dst: ChainSelector) -> Result<Address, Revert> {
        Ok(self
            .chain(chain)?
            .pool
            .dst_pools
            .get(&dst)
            .copied()
            .unwrap_or(Address::ZERO))
    }

    pub fn liquidity_balance(&self, chain: ChainSelector, holder: &Address) -> Result<u128, Revert> {
        Ok(self.chain(chain)?.liquidity.balance_of(holder))
    }

    pub fn debt_balance(&self, chain: ChainSelector, holder: &Address) -> Result<u128, Revert> {
        Ok(self.chain(chain)?.iou.balance_of(holder))
    }

    pub fn lp_balance(&self, chain: ChainSelector, holder: &Address) -> Result<u128, Revert> {
        Ok(self.chain(chain)?.lp.balance_of(holder))
    }

    pub fn debt_supply(&self, chain: ChainSelector) -> Result<u128, Revert> {
        Ok(self.chain(chain)?.iou.total_supply())
    }

    pub fn fee_reserve(&self, chain: ChainSelector) -> Result<u128, Revert> {
        Ok(self.chain(chain)?.pool.fee_reserve)
    }

    /// Symmetric route between two pools as stored on-chain
    pub fn route(&self, src: ChainSelector, dst: ChainSelector) -> Result<Address, Revert> {
        let mut table = RouteTable::new();
        for (selector, state) in [(src, self.chain(src)?), (dst, self.chain(dst)?)] {
            table.register_pool(selector, state.pool.address);
        }
        for (a, b) in [(src, dst), (dst, src)] {
            let pool = self.dst_pool(a, b)?;
            if !pool.is_zero() {
                table.set_route(a, b, pool)?;
            }
        }
        Ok(table.get_route(src, dst)?)
    }

    // ---------- provisioning ----------

    pub fn mint_liquidity(&mut self, chain: ChainSelector, to: Address, amount: u128) -> Result<(), Revert> {
        self.chain_mut(chain)?.liquidity.mint(to, amount)?;
        Ok(())
    }

    pub fn set_liquidity_balance(&mut self, chain: ChainSelector, holder: Address, amount: u128) -> Result<(), Revert> {
        self.chain_mut(chain)?.liquidity.set_balance(holder, amount);
        Ok(())
    }

    /// IOU delivered by the external bridge
    pub fn mint_debt(&mut self, chain: ChainSelector, to: Address, amount: u128) -> Result<(), Revert> {
        self.chain_mut(chain)?.iou.mint(to, amount)?;
        Ok(())
    }

    // ---------- user operations ----------

    pub fn enter_deposit_queue(&mut self, chain: ChainSelector, user: Address, amount: u128) -> Result<Receipt, Revert> {
        let state = self.chain_mut(chain)?;
        if !state.pool.kind.accepts_deposits() {
            return Err(Revert::WrongPoolKind { op: "enterDepositQueue", kind: state.pool.kind });
        }
        let available = state.liquidity.balance_of(&user);
        if available < amount {
            return Err(LedgerError::InsufficientBalance { holder: user, available, needed: amount }.into());
        }
        let entry = QueueEntry { user, amount, enqueued_at: state.block };
        state.pool.queues.enqueue_deposit(&state.pool.params.queue, entry)?;
        let pool = state.pool.address;
        state.liquidity.transfer(user, pool, amount)?;
        Ok(self.seal(chain, vec![(chain, EventKind::DepositQueued { user, amount })]))
    }

    /// Escrows `shares` LP tokens until the batch settles
    pub fn enter_withdrawal_queue(&mut self, chain: ChainSelector, user: Address, shares: u128) -> Result<Receipt, Revert> {
        let state = self.chain_mut(chain)?;
        if !state.pool.kind.accepts_withdrawals() {
            return Err(Revert::WrongPoolKind { op: "enterWithdrawalQueue", kind: state.pool.kind });
        }
        let available = state.lp.balance_of(&user);
        if available < shares {
            return Err(LedgerError::InsufficientBalance { holder: user, available, needed: shares }.into());
        }
        let entry = QueueEntry { user, amount: shares, enqueued_at: state.block };
        state.pool.queues.enqueue_withdrawal(&state.pool.params.queue, entry)?;
        let pool = state.pool.address;
        state.lp.transfer(user, pool, shares)?;
        Ok(self.seal(chain, vec![(chain, EventKind::WithdrawalQueued { user, shares })]))
    }

    /// Pay `amount` into `src` and release it, minus fees, from `dst`.
    /// The LP fee stays in the source pool; the bridge fee is scaled by the
    /// destination pool's health and kept as protocol fees.
    pub fn bridge(
        &mut self,
        src: ChainSelector,
        sender: Address,
        dst: ChainSelector,
        receiver: Address,
        amount: u128,
    ) -> Result<Receipt, Revert> {
        if amount == 0 {
            return Err(Revert::ZeroAmount);
        }
        self.route(src, dst)?;

        let src_state = self.chain(src)?;
        let dst_state = self.chain(dst)?;
        let fees = src_state.pool.params.fees;
        let lp_fee = bps_of(amount, fees.lp_fee_bps);
        let bridge_bps = dynamic_fee_bps(fees.lanca_bridge_fee_bps, dst_state.composite_score().unwrap_or(SCALE));
        let bridge_fee = bps_of(amount, bridge_bps);
        let net = sub_u128(amount, add_u128(lp_fee, bridge_fee));
        if net == 0 {
            return Err(Revert::NetAmountZero(amount));
        }
        let available = src_state.liquidity.balance_of(&sender);
        if available < amount {
            return Err(LedgerError::InsufficientBalance { holder: sender, available, needed: amount }.into());
        }
        let dst_active = dst_state.active_balance();
        if dst_active < net {
            return Err(Revert::InsufficientLiquidity { needed: net, available: dst_active });
        }

        let src_state = self.chain_mut(src)?;
        let src_pool = src_state.pool.address;
        src_state.liquidity.transfer(sender, src_pool, amount)?;
        src_state.pool.protocol_fees = add_u128(src_state.pool.protocol_fees, bridge_fee);
        src_state.pool.flow.record_inflow(amount);

        let dst_state = self.chain_mut(dst)?;
        let dst_pool = dst_state.pool.address;
        dst_state.liquidity.transfer(dst_pool, receiver, net)?;
        dst_state.pool.flow.record_outflow(net);

        Ok(self.seal(
            src,
            vec![(
                src,
                EventKind::Bridged { sender, receiver, dst_chain: dst, amount, fee: add_u128(lp_fee, bridge_fee) },
            )],
        ))
    }

    // ---------- corrections ----------

    /// Pay `amount` liquidity into the pool for `amount - fee` IOU.
    /// Reverts when `amount` exceeds the deficit outstanding right now.
    pub fn fill_deficit(&mut self, chain: ChainSelector, filler: Address, amount: u128) -> Result<Receipt, Revert> {
        let state = self.chain_mut(chain)?;
        let outstanding = state.snapshot().deficit();
        if amount == 0 {
            return Err(Revert::ZeroAmount);
        }
        if amount > outstanding {
            return Err(Revert::AmountExceedsDeficit { requested: amount, outstanding });
        }
        let (fee, iou_minted) = fill_terms(amount, state.pool.params.fees.rebalancer_fee_bps);
        if iou_minted == 0 {
            return Err(Revert::NetAmountZero(amount));
        }
        let available = state.liquidity.balance_of(&filler);
        if available < amount {
            return Err(LedgerError::InsufficientBalance { holder: filler, available, needed: amount }.into());
        }

        let pool = state.pool.address;
        state.iou.mint(filler, iou_minted)?;
        state.liquidity.transfer(filler, pool, amount)?;
        Ok(self.seal(chain, vec![(chain, EventKind::DeficitFilled { filler, amount, fee, iou_minted })]))
    }

    /// Burn `amount` IOU for `amount - fee` liquidity; the fee moves to the
    /// pool's reserve. Reverts when `amount` exceeds the surplus outstanding.
    pub fn take_surplus(&mut self, chain: ChainSelector, sweeper: Address, amount: u128) -> Result<Receipt, Revert> {
        let state = self.chain_mut(chain)?;
        let outstanding = state.snapshot().surplus();
        if amount == 0 {
            return Err(Revert::ZeroAmount);
        }
        if amount > outstanding {
            return Err(Revert::AmountExceedsSurplus { requested: amount, outstanding });
        }
        let (fee, payout) = sweep_terms(amount, state.pool.params.fees.rebalancer_fee_bps);
        if payout == 0 {
            return Err(Revert::NetAmountZero(amount));
        }
        let available = state.iou.balance_of(&sweeper);
        if available < amount {
            return Err(LedgerError::InsufficientBalance { holder: sweeper, available, needed: amount }.into());
        }

        let pool = state.pool.address;
        state.iou.burn(sweeper, amount)?;
        state.liquidity.transfer(pool, sweeper, payout)?;
        state.pool.fee_reserve = add_u128(state.pool.fee_reserve, fee);
        Ok(self.seal(chain, vec![(chain, EventKind::SurplusTaken { sweeper, amount, fee, payout })]))
    }

    // ---------- keeper operations ----------

    /// Child reports its active balance to the parent for the parent's
    /// current epoch. One snapshot per child per epoch.
    pub fn send_snapshot(&mut self, chain: ChainSelector, caller: Address) -> Result<Receipt, Revert> {
        let parent = self.parent.ok_or(Revert::NoParentPool)?;
        let state = self.chain(chain)?;
        if state.pool.kind != PoolKind::Child {
            return Err(Revert::WrongPoolKind { op: "sendSnapshot", kind: state.pool.kind });
        }
        check_keeper(state, caller)?;
        let epoch = self.chain(parent)?.pool.epoch;
        if state.pool.last_snapshot_epoch == Some(epoch) {
            return Err(Revert::SnapshotAlreadySent { epoch });
        }
        let balance = state.active_balance();

        self.chain_mut(chain)?.pool.last_snapshot_epoch = Some(epoch);
        self.chain_mut(parent)?.pool.child_snapshots.insert(chain, balance);
        Ok(self.seal(
            chain,
            vec![
                (chain, EventKind::SnapshotSent { parent_chain: parent, epoch, balance }),
                (parent, EventKind::SnapshotReceived { child_chain: chain, epoch, balance }),
            ],
        ))
    }

    /// Settle the queued batch against network liquidity.
    ///
    /// Deposits mint LP at `amount * supply / liquidity` (1:1 into an empty
    /// pool); withdrawals burn their escrowed shares and owe
    /// `shares * liquidity / supply`. Outstanding LP with zero network
    /// liquidity cannot be priced: the batch is failed and `BatchFailed`
    /// emitted instead.
    pub fn trigger_deposit_withdraw_process(&mut self, chain: ChainSelector, caller: Address) -> Result<Receipt, Revert> {
        let state = self.chain(chain)?;
        if state.pool.kind != PoolKind::Parent {
            return Err(Revert::WrongPoolKind { op: "triggerDepositWithdrawProcess", kind: state.pool.kind });
        }
        check_keeper(state, caller)?;
        let missing = state.missing_snapshots();
        if !missing.is_empty() {
            return Err(Revert::MissingSnapshots(missing));
        }
        let view = state.view();
        let readiness = view.readiness(&state.pool.params.queue, state.deposits_suppressed());
        if !readiness.is_ready() {
            return Err(Revert::NotReady);
        }
        if let QueuePhase::Draining { batch_id } = state.pool.queues.phase() {
            return Err(QueueError::BatchInProgress { batch_id }.into());
        }
        let liquidity = view.network_liquidity;
        let supply = state.lp.total_supply();
        let epoch = state.pool.epoch;

        let state = self.chain_mut(chain)?;
        let batch = state.pool.queues.drain_batch(readiness.deposits)?;

        if supply > 0 && liquidity == 0 && !batch.is_empty() {
            let batch_id = batch.id;
            state.pool.queues.fail_batch(batch)?;
            let reason = format!("{} LP outstanding against zero liquidity", supply);
            return Ok(self.seal(chain, vec![(chain, EventKind::BatchFailed { batch_id, reason })]));
        }

        let pool = state.pool.address;
        let mut lp_minted = 0u128;
        let mut withdrawals_owed = 0u128;
        for d in &batch.deposits {
            let shares = if supply == 0 { d.amount } else { mul_div(d.amount, supply, liquidity) };
            state.lp.mint(d.user, shares)?;
            lp_minted = add_u128(lp_minted, shares);
        }
        for w in &batch.withdrawals {
            let owed = mul_div(w.amount, liquidity, supply);
            state.lp.burn(pool, w.amount)?;
            state.pool.pending_withdrawals.push(PendingWithdrawal { user: w.user, amount: owed, epoch });
            withdrawals_owed = add_u128(withdrawals_owed, owed);
        }
        state.pool.queues.complete_batch(batch.id)?;

        state.pool.flow = FlowWindow { inflow: batch.deposit_total(), outflow: withdrawals_owed };
        state.pool.epoch = epoch + 1;
        state.pool.child_snapshots.clear();

        Ok(self.seal(
            chain,
            vec![(
                chain,
                EventKind::DepositWithdrawTriggered {
                    epoch,
                    deposits: batch.deposits.len() as u32,
                    withdrawals: batch.withdrawals.len() as u32,
                    lp_minted,
                    withdrawals_owed,
                },
            )],
        ))
    }

    /// Pay every settled withdrawal, only when all fit in active balance
    pub fn process_pending_withdrawals(&mut self, chain: ChainSelector, caller: Address) -> Result<Receipt, Revert> {
        let state = self.chain(chain)?;
        if state.pool.kind != PoolKind::Parent {
            return Err(Revert::WrongPoolKind { op: "processPendingWithdrawals", kind: state.pool.kind });
        }
        check_keeper(state, caller)?;
        if state.pool.pending_withdrawals.is_empty() {
            return Err(Revert::NothingPending);
        }
        let total = state.pending_total();
        let available = state.active_balance();
        if total > available {
            return Err(Revert::InsufficientLiquidity { needed: total, available });
        }

        let state = self.chain_mut(chain)?;
        let pool = state.pool.address;
        let pending = std::mem::take(&mut state.pool.pending_withdrawals);
        for p in &pending {
            state.liquidity.transfer(pool, p.user, p.amount)?;
        }
        Ok(self.seal(
            chain,
            vec![(chain, EventKind::PendingWithdrawalsProcessed { count: pending.len() as u32, total })],
        ))
    }

    // ---------- governance ----------

    pub fn apply_param(&mut self, chain: ChainSelector, caller: Address, update: ParamUpdate) -> Result<Receipt, Revert> {
        let state = self.chain_mut(chain)?;
        if caller != state.pool.admin {
            return Err(Revert::Unauthorized(caller));
        }
        let mut params = state.pool.params;
        match update {
            ParamUpdate::DstPool { chain: dst, pool } => {
                if dst == chain {
                    return Err(RouteError::SelfRoute(chain).into());
                }
                state.pool.dst_pools.insert(dst, pool);
            }
            ParamUpdate::LancaKeeper(keeper) => state.pool.keeper = keeper,
            _ => {
                update.apply_to(&mut params);
                validate_params(&params)?;
                state.pool.params = params;
            }
        }
        Ok(self.seal(chain, vec![(chain, EventKind::ParamUpdated(update))]))
    }

    /// Assign a tx hash, advance the block of every touched chain once and
    /// stamp the events
    fn seal(&mut self, origin: ChainSelector, kinds: Vec<(ChainSelector, EventKind)>) -> Receipt {
        self.next_tx += 1;
        let tx = TxHash(self.next_tx);

        let mut touched: Vec<ChainSelector> = vec![origin];
        for (c, _) in &kinds {
            if !touched.contains(c) {
                touched.push(*c);
            }
        }
        for c in &touched {
            if let Some(state) = self.chains.get_mut(c) {
                state.block += 1;
            }
        }

        let events = kinds
            .into_iter()
            .filter_map(|(c, kind)| {
                self.chains.get(&c).map(|state| PoolEvent {
                    chain: c,
                    pool: state.pool.address,
                    block: state.block,
                    tx,
                    kind,
                })
            })
            .collect();
        let block = self.chains.get(&origin).map_or(0, |s| s.block);
        Receipt { tx, chain: origin, block, events }
    }
}

fn check_keeper(state: &ChainState, caller: Address) -> Result<(), Revert> {
    if caller != state.pool.keeper {
        return Err(Revert::Unauthorized(caller));
    }
    Ok(())
}

fn validate_params(params: &PoolParams) -> Result<(), Revert> {
    if let Some(field) = params.fees.out_of_range_fields().first() {
        return Err(Revert::InvalidParam(format!("{} above 10000 bps", field)));
    }
    if params.score.lur_score_weight == 0 && params.score.ndr_score_weight == 0 {
        return Err(Revert::InvalidParam("score weights are both zero".into()));
    }
    Ok(())
}
