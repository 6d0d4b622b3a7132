//! In-memory ledger used by the unit tests.
//!
//! `FakeLedger` implements every collaborator trait over one shared state so
//! a test can script reads, failures and confirmations, then inspect the
//! exact sequence of calls the engine made.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anchor_lang::prelude::Pubkey;
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{
    Clock, Confirmation, ConfirmationOutcome, IndexedStake, Indexer, LedgerReader, LedgerWriter,
    OperationHandle, StakeInfo,
};
use crate::orchestrator::Operation;
use crate::state::{Amount, RateSchedule, StakeCapPolicy, StakeId, StakeStatus, UnixTimestamp};

/// One whole token in base units (18 decimals).
pub const TOKEN: u128 = 1_000_000_000_000_000_000;

pub const GENESIS: UnixTimestamp = 1_700_000_000;

/// Scripted result for the next `await_confirmation`.
#[derive(Debug, Clone)]
pub enum Scripted {
    TimedOut,
    Revert(String),
    TransportError,
}

#[derive(Debug)]
struct FakeState {
    now: UnixTimestamp,
    stakes: BTreeMap<(Pubkey, StakeId), (IndexedStake, StakeInfo)>,
    next_stake_id: StakeId,
    balances: HashMap<Pubkey, Amount>,
    allowances: HashMap<Pubkey, Amount>,
    caps: StakeCapPolicy,
    schedule: RateSchedule,
    submitted: HashMap<String, Operation>,
    next_handle: u64,
    confirmations: VecDeque<Scripted>,
    simulation_revert: Option<String>,
    reads_failing: bool,
    submits_failing: bool,
    calls: Vec<String>,
}

pub struct FakeLedger {
    state: Mutex<FakeState>,
    stake_info_reads: AtomicUsize,
    index_reads: AtomicUsize,
    simulations: AtomicUsize,
    submissions: AtomicUsize,
    simulation_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                now: GENESIS,
                stakes: BTreeMap::new(),
                next_stake_id: 1,
                balances: HashMap::new(),
                allowances: HashMap::new(),
                caps: StakeCapPolicy::new(10 * TOKEN, 5_000 * TOKEN).unwrap(),
                schedule: RateSchedule::Fixed { apr_bps: 1_500 },
                submitted: HashMap::new(),
                next_handle: 1,
                confirmations: VecDeque::new(),
                simulation_revert: None,
                reads_failing: false,
                submits_failing: false,
                calls: Vec::new(),
            }),
            stake_info_reads: AtomicUsize::new(0),
            index_reads: AtomicUsize::new(0),
            simulations: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            simulation_gate: Mutex::new(None),
        })
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn now(&self) -> UnixTimestamp {
        self.state().now
    }

    pub fn advance(&self, seconds: i64) {
        self.state().now += seconds;
    }

    /// Register an active stake starting now.
    pub fn add_stake(&self, account: Pubkey, stake_id: StakeId, principal: Amount, staking_period: i64) {
        let mut state = self.state();
        let now = state.now;
        state.stakes.insert(
            (account, stake_id),
            (
                IndexedStake {
                    stake_id,
                    principal,
                    start_time: now,
                    staking_period,
                    creation_ref: format!("seed-{}", stake_id),
                },
                StakeInfo {
                    principal,
                    last_yield_claim_at: now,
                    status: StakeStatus::Active,
                },
            ),
        );
        state.next_stake_id = state.next_stake_id.max(stake_id + 1);
    }

    pub fn set_status(&self, account: Pubkey, stake_id: StakeId, status: StakeStatus) {
        if let Some((_, info)) = self.state().stakes.get_mut(&(account, stake_id)) {
            info.status = status;
        }
    }

    pub fn stake_info(&self, account: Pubkey, stake_id: StakeId) -> Option<StakeInfo> {
        self.state().stakes.get(&(account, stake_id)).map(|(_, info)| *info)
    }

    pub fn set_balance(&self, account: Pubkey, amount: Amount) {
        self.state().balances.insert(account, amount);
    }

    pub fn balance(&self, account: Pubkey) -> Amount {
        self.state().balances.get(&account).copied().unwrap_or(0)
    }

    pub fn set_allowance(&self, account: Pubkey, amount: Amount) {
        self.state().allowances.insert(account, amount);
    }

    pub fn set_schedule(&self, schedule: RateSchedule) {
        self.state().schedule = schedule;
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.state().reads_failing = failing;
    }

    pub fn set_submits_failing(&self, failing: bool) {
        self.state().submits_failing = failing;
    }

    /// Every following simulation is refused with `raw`.
    pub fn reject_simulations(&self, raw: &str) {
        self.state().simulation_revert = Some(raw.to_string());
    }

    /// Queue the outcome of the next confirmation wait.
    pub fn script_confirmation(&self, outcome: Scripted) {
        self.state().confirmations.push_back(outcome);
    }

    /// Make simulations wait until the returned gate is notified.
    pub fn hold_simulations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.simulation_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn open_simulations(&self) {
        *self.simulation_gate.lock().unwrap() = None;
    }

    pub fn stake_info_reads(&self) -> usize {
        self.stake_info_reads.load(Ordering::SeqCst)
    }

    pub fn index_reads(&self) -> usize {
        self.index_reads.load(Ordering::SeqCst)
    }

    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Writer calls in order, e.g. `"simulate approve"`, `"confirm stake"`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn log(&self, call: String) {
        self.state().calls.push(call);
    }

    fn check_reads(&self) -> LedgerResult<()> {
        if self.state().reads_failing {
            Err(LedgerError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn apply(state: &mut FakeState, operation: &Operation) -> Vec<StakeId> {
        let now = state.now;
        let mut created = Vec::new();
        let mut open = |state: &mut FakeState, account: Pubkey, amount: Amount, period: i64| {
            let stake_id = state.next_stake_id;
            state.next_stake_id += 1;
            state.stakes.insert(
                (account, stake_id),
                (
                    IndexedStake {
                        stake_id,
                        principal: amount,
                        start_time: now,
                        staking_period: period,
                        creation_ref: format!("stake-{}", stake_id),
                    },
                    StakeInfo {
                        principal: amount,
                        last_yield_claim_at: now,
                        status: StakeStatus::Active,
                    },
                ),
            );
            let balance = state.balances.entry(account).or_default();
            *balance = balance.saturating_sub(amount);
            let allowance = state.allowances.entry(account).or_default();
            *allowance = allowance.saturating_sub(amount);
            created.push(stake_id);
        };

        match operation {
            Operation::Approve { owner, amount, .. } => {
                state.allowances.insert(*owner, *amount);
            }
            Operation::Stake {
                account,
                amount,
                staking_period,
            } => open(state, *account, *amount, *staking_period),
            Operation::StakeBatch {
                account,
                amounts,
                staking_periods,
            } => {
                for (amount, period) in amounts.iter().zip(staking_periods) {
                    open(state, *account, *amount, *period);
                }
            }
            Operation::WithdrawYield { account, stake_id } => {
                if let Some((_, info)) = state.stakes.get_mut(&(*account, *stake_id)) {
                    info.last_yield_claim_at = now;
                }
            }
            Operation::Withdraw {
                account,
                stake_id,
                amount,
            } => {
                if let Some((_, info)) = state.stakes.get_mut(&(*account, *stake_id)) {
                    info.principal -= amount;
                    if info.principal == 0 {
                        info.status = StakeStatus::Withdrawn;
                    }
                }
            }
            Operation::WithdrawAll { account, stake_id } => {
                if let Some((_, info)) = state.stakes.get_mut(&(*account, *stake_id)) {
                    info.principal = 0;
                    info.status = StakeStatus::Withdrawn;
                }
            }
        }
        created
    }
}

impl Clock for FakeLedger {
    fn now(&self) -> UnixTimestamp {
        FakeLedger::now(self)
    }
}

#[async_trait]
impl LedgerReader for FakeLedger {
    async fn read_stake_info(&self, account: &Pubkey, stake_id: StakeId) -> LedgerResult<StakeInfo> {
        self.stake_info_reads.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.stake_info(*account, stake_id)
            .ok_or_else(|| LedgerError::Decode(format!("no stake record {}#{}", account, stake_id)))
    }

    async fn read_allowance(&self, account: &Pubkey, _spender: &Pubkey) -> LedgerResult<Amount> {
        self.check_reads()?;
        self.log("read_allowance".into());
        Ok(self.state().allowances.get(account).copied().unwrap_or(0))
    }

    async fn read_cap_policy(&self) -> LedgerResult<StakeCapPolicy> {
        self.check_reads()?;
        Ok(self.state().caps)
    }

    async fn read_token_balance(&self, account: &Pubkey) -> LedgerResult<Amount> {
        self.check_reads()?;
        Ok(self.balance(*account))
    }

    async fn read_rate_schedule(&self) -> LedgerResult<RateSchedule> {
        self.check_reads()?;
        Ok(self.state().schedule)
    }
}

#[async_trait]
impl LedgerWriter for FakeLedger {
    async fn simulate(&self, operation: &Operation) -> LedgerResult<()> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        self.log(format!("simulate {}", operation.kind()));

        let gate = self.simulation_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.state().simulation_revert.clone() {
            Some(raw) => Err(LedgerError::Rejected(raw)),
            None => Ok(()),
        }
    }

    async fn submit(&self, operation: &Operation) -> LedgerResult<OperationHandle> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.log(format!("submit {}", operation.kind()));

        let mut state = self.state();
        if state.submits_failing {
            return Err(LedgerError::Transport("node unreachable".into()));
        }
        let id = format!("sig-{}", state.next_handle);
        state.next_handle += 1;
        state.submitted.insert(id.clone(), operation.clone());
        Ok(OperationHandle(id))
    }

    async fn await_confirmation(&self, handle: &OperationHandle) -> LedgerResult<ConfirmationOutcome> {
        let mut state = self.state();
        let operation = state
            .submitted
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| LedgerError::Transport(format!("unknown handle {}", handle.0)))?;
        state.calls.push(format!("confirm {}", operation.kind()));

        match state.confirmations.pop_front() {
            Some(Scripted::TimedOut) => Ok(ConfirmationOutcome::TimedOut),
            Some(Scripted::Revert(raw)) => {
                state.submitted.remove(&handle.0);
                Ok(ConfirmationOutcome::Reverted(raw))
            }
            Some(Scripted::TransportError) => Err(LedgerError::Transport("socket closed".into())),
            None => {
                state.submitted.remove(&handle.0);
                let created_stake_ids = Self::apply(&mut state, &operation);
                Ok(ConfirmationOutcome::Confirmed(Confirmation {
                    id: handle.0.clone(),
                    confirmed_at: state.now,
                    created_stake_ids,
                }))
            }
        }
    }
}

#[async_trait]
impl Indexer for FakeLedger {
    async fn list_stakes_for_account(&self, account: &Pubkey) -> LedgerResult<Vec<IndexedStake>> {
        self.index_reads.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self
            .state()
            .stakes
            .iter()
            .filter(|((owner, _), _)| owner == account)
            .map(|(_, (indexed, _))| indexed.clone())
            .collect())
    }
}
