//! Transaction orchestrator.
//!
//! Drives every mutating intent through
//! `Validating → AllowanceCheck → Approving → Simulating → Submitting →
//! Confirming → Settled | Failed` against the ledger.
//!
//! # Guarantees
//!
//! - **Single-flight**: one in-flight operation per `(account, stake)`,
//!   whatever its kind; conflicting intents fail fast with
//!   `OperationInProgress` and are never queued
//! - **Approve before stake**: an approval must be *confirmed* before the
//!   stake is simulated
//! - **No doomed submissions**: a failed simulation never reaches `submit`
//! - **Abandon before submit only**: dropping the future before Submitting
//!   releases the slot without further ledger contact; from Submitting on,
//!   the protocol runs to completion on its own task
//! - **No automatic retries**: callers opt in through [`Orchestrator::retry`]
//! - **Resume, never resubmit**: re-issuing an intent whose confirmation
//!   timed out skips validation and awaits the recorded submission

pub mod idempotency;
pub mod operation;
pub mod phase;
pub mod retry;
pub mod single_flight;

pub use idempotency::*;
pub use operation::*;
pub use phase::*;
pub use retry::*;
pub use single_flight::*;

use std::sync::Arc;

use anchor_lang::prelude::Pubkey;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, RevertReason};
use crate::events::{LifecycleEvent, NotificationSink};
use crate::guard;
use crate::ledger::{Clock, Confirmation, ConfirmationOutcome, LedgerReader, LedgerWriter, OperationHandle};
use crate::registry::StakeRegistry;
use crate::state::{Amount, StakeId, StakeKey};

/// Outcome of a settled intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub key: OperationKey,
    pub confirmation: Confirmation,
}

pub struct Orchestrator {
    reader: Arc<dyn LedgerReader>,
    writer: Arc<dyn LedgerWriter>,
    registry: Arc<StakeRegistry>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    pending: Arc<PendingOperations>,
    submitted: Arc<SubmittedOperations>,
    spender: Pubkey,
    allowed_periods: Vec<i64>,
    retry_policy: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        reader: Arc<dyn LedgerReader>,
        writer: Arc<dyn LedgerWriter>,
        registry: Arc<StakeRegistry>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            writer,
            registry,
            sink,
            clock,
            pending: Arc::new(PendingOperations::new()),
            submitted: Arc::new(SubmittedOperations::new()),
            spender: config.spender()?,
            allowed_periods: config.allowed_staking_periods(),
            retry_policy: config.retry,
        })
    }

    pub fn registry(&self) -> &Arc<StakeRegistry> {
        &self.registry
    }

    /// Phase of the operation holding `(account, slot)`, if any.
    pub fn phase_of(&self, account: &Pubkey, slot: StakeSlot) -> Option<OperationPhase> {
        self.pending.get(account, slot).map(|p| p.phase)
    }

    pub fn in_flight(&self) -> Vec<PendingOperation> {
        self.pending.in_flight()
    }

    pub async fn stake(&self, account: Pubkey, amount: Amount, staking_period: i64) -> Result<Settlement> {
        self.execute(Intent::Stake {
            account,
            amount,
            staking_period,
        })
        .await
    }

    /// Stake several amounts as one atomic ledger operation.
    pub async fn stake_batch(
        &self,
        account: Pubkey,
        amounts: Vec<Amount>,
        staking_periods: Vec<i64>,
    ) -> Result<Settlement> {
        self.execute(Intent::StakeBatch {
            account,
            amounts,
            staking_periods,
        })
        .await
    }

    pub async fn withdraw_yield(&self, account: Pubkey, stake_id: StakeId) -> Result<Settlement> {
        self.execute(Intent::WithdrawYield { account, stake_id }).await
    }

    /// Withdraw the whole principal once the lock has expired.
    pub async fn withdraw_stake(&self, account: Pubkey, stake_id: StakeId) -> Result<Settlement> {
        self.execute(Intent::WithdrawStake { account, stake_id }).await
    }

    /// Withdraw part of the principal once the lock has expired.
    pub async fn withdraw(&self, account: Pubkey, stake_id: StakeId, amount: Amount) -> Result<Settlement> {
        self.execute(Intent::Withdraw {
            account,
            stake_id,
            amount,
        })
        .await
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Re-issue `intent` under the configured [`RetryPolicy`].
    pub async fn retry(&self, intent: Intent) -> Result<Settlement> {
        self.retry_with(intent, &self.retry_policy).await
    }

    /// Re-issue `intent` while it fails with a retryable error, up to
    /// `policy.max_attempts` attempts in total.
    pub async fn retry_with(&self, intent: Intent, policy: &RetryPolicy) -> Result<Settlement> {
        let mut attempt = 1;
        loop {
            match self.execute(intent.clone()).await {
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    warn!(
                        "Attempt {}/{} of {} failed ({}), retrying",
                        attempt,
                        policy.max_attempts,
                        intent.key(),
                        err
                    );
                    tokio::time::sleep(policy.backoff()).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Run one intent through the full protocol.
    pub async fn execute(&self, intent: Intent) -> Result<Settlement> {
        let key = intent.key();
        let mut slot = self.pending.acquire(key)?;

        let operation = intent.to_operation();
        let fingerprint = operation.fingerprint()?;
        // an unresolved submission may have landed; it is settled by its
        // confirmation, not validated again
        let resumed = self.submitted.unresolved(&key, &fingerprint);

        if resumed.is_none() {
            slot.set_phase(OperationPhase::Validating);
            self.validate(&intent).await?;
        }
        self.sink.notify(LifecycleEvent::OperationStarted { key });
        debug!("Operation started: {}", key);

        if resumed.is_none() {
            if let Err(err) = self.prepare(&operation, &mut slot).await {
                slot.set_phase(OperationPhase::Failed);
                debug!("Operation failed: {}: {}", key, err);
                self.sink.notify(LifecycleEvent::OperationFailed {
                    key,
                    reason: err.clone(),
                });
                return Err(err);
            }
        } else {
            info!("{} has an unresolved submission, awaiting it again", key);
        }

        let task = SettleTask {
            writer: Arc::clone(&self.writer),
            registry: Arc::clone(&self.registry),
            sink: Arc::clone(&self.sink),
            submitted: Arc::clone(&self.submitted),
            slot,
            operation,
            fingerprint,
            resumed,
        };
        tokio::spawn(task.run())
            .await
            .map_err(|e| EngineError::TaskAborted(e.to_string()))?
    }

    /// Read the state the guard needs and run it.
    async fn validate(&self, intent: &Intent) -> Result<()> {
        match intent {
            Intent::Stake {
                account,
                amount,
                staking_period,
            } => {
                let (caps, balance) = tokio::try_join!(
                    self.reader.read_cap_policy(),
                    self.reader.read_token_balance(account)
                )
                .map_err(EngineError::upstream)?;
                guard::validate_stake_intent(*amount, *staking_period, &caps, balance, &self.allowed_periods)?;
            }
            Intent::StakeBatch {
                account,
                amounts,
                staking_periods,
            } => {
                let (caps, balance) = tokio::try_join!(
                    self.reader.read_cap_policy(),
                    self.reader.read_token_balance(account)
                )
                .map_err(EngineError::upstream)?;
                guard::validate_stake_batch(amounts, staking_periods, &caps, balance, &self.allowed_periods)?;
            }
            Intent::WithdrawYield { account, stake_id } => {
                let stake = self.registry.get(account, *stake_id).await?;
                let schedule = self
                    .reader
                    .read_rate_schedule()
                    .await
                    .map_err(EngineError::upstream)?;
                guard::validate_withdraw_yield(&stake, &schedule, self.clock.now())?;
            }
            Intent::WithdrawStake { account, stake_id } => {
                let stake = self.registry.get(account, *stake_id).await?;
                guard::validate_withdraw_stake(&stake, self.clock.now())?;
            }
            Intent::Withdraw {
                account,
                stake_id,
                amount,
            } => {
                let stake = self.registry.get(account, *stake_id).await?;
                guard::validate_partial_withdraw(&stake, *amount, self.clock.now())?;
            }
        }
        Ok(())
    }

    /// Everything before submission: allowance, approval, dry run.
    async fn prepare(&self, operation: &Operation, slot: &mut SlotGuard) -> Result<()> {
        if let Some(required) = operation.required_allowance() {
            let owner = slot.key().account;
            slot.set_phase(OperationPhase::AllowanceCheck);
            let allowance = self
                .reader
                .read_allowance(&owner, &self.spender)
                .await
                .map_err(EngineError::upstream)?;

            if allowance < required {
                debug!("Allowance {} below {}, approving", allowance, required);
                slot.set_phase(OperationPhase::Approving);
                self.approve(owner, required)
                    .await
                    .map_err(|e| EngineError::ApprovalFailed(Box::new(e)))?;
            }
        }

        slot.set_phase(OperationPhase::Simulating);
        self.writer
            .simulate(operation)
            .await
            .map_err(EngineError::from_simulation)
    }

    /// Raise the allowance and wait until the ledger has confirmed it.
    async fn approve(&self, owner: Pubkey, amount: Amount) -> Result<()> {
        let approval = Operation::Approve {
            owner,
            spender: self.spender,
            amount,
        };
        self.writer
            .simulate(&approval)
            .await
            .map_err(EngineError::from_simulation)?;
        let handle = self
            .writer
            .submit(&approval)
            .await
            .map_err(EngineError::from_submission)?;

        match self.writer.await_confirmation(&handle).await {
            Ok(ConfirmationOutcome::Confirmed(confirmation)) => {
                info!("Approval of {} confirmed ({})", amount, confirmation.id);
            }
            Ok(ConfirmationOutcome::Reverted(raw)) => {
                return Err(EngineError::Reverted(RevertReason::normalize(&raw)))
            }
            Ok(ConfirmationOutcome::TimedOut) | Err(_) => return Err(EngineError::ConfirmationTimedOut),
        }

        let allowance = self
            .reader
            .read_allowance(&owner, &self.spender)
            .await
            .map_err(EngineError::upstream)?;
        if allowance < amount {
            return Err(EngineError::AllowanceInsufficient);
        }
        Ok(())
    }
}

/// Submission and confirmation, detached from the caller so that it runs to
/// completion once started.
struct SettleTask {
    writer: Arc<dyn LedgerWriter>,
    registry: Arc<StakeRegistry>,
    sink: Arc<dyn NotificationSink>,
    submitted: Arc<SubmittedOperations>,
    slot: SlotGuard,
    operation: Operation,
    fingerprint: [u8; 32],
    /// Handle of an earlier submission whose confirmation timed out.
    resumed: Option<OperationHandle>,
}

impl SettleTask {
    async fn run(mut self) -> Result<Settlement> {
        let key = self.slot.key();
        let outcome = self.settle().await;

        match &outcome {
            Ok(settlement) => {
                self.slot.set_phase(OperationPhase::Settled);
                debug!("Operation settled: {} ({})", key, settlement.confirmation.id);
                self.sink.notify(LifecycleEvent::OperationSettled {
                    key,
                    confirmation_id: settlement.confirmation.id.clone(),
                });
            }
            Err(err) => {
                self.slot.set_phase(OperationPhase::Failed);
                debug!("Operation failed: {}: {}", key, err);
                self.sink.notify(LifecycleEvent::OperationFailed {
                    key,
                    reason: err.clone(),
                });
            }
        }
        outcome
    }

    async fn settle(&mut self) -> Result<Settlement> {
        let key = self.slot.key();
        let handle = match self.resumed.take() {
            Some(handle) => handle,
            None => {
                self.slot.set_phase(OperationPhase::Submitting);
                let handle = self
                    .writer
                    .submit(&self.operation)
                    .await
                    .map_err(EngineError::from_submission)?;
                self.submitted.record(key, self.fingerprint, handle.clone());
                handle
            }
        };

        self.slot.set_phase(OperationPhase::Confirming);
        let outcome = self.writer.await_confirmation(&handle).await;
        match outcome {
            Ok(ConfirmationOutcome::Confirmed(confirmation)) => {
                self.submitted.clear(&key);
                for stake in affected_stakes(&self.operation, &confirmation) {
                    self.registry.invalidate(&stake).await;
                }
                Ok(Settlement { key, confirmation })
            }
            Ok(ConfirmationOutcome::Reverted(raw)) => {
                self.submitted.clear(&key);
                Err(EngineError::Reverted(RevertReason::normalize(&raw)))
            }
            // the handle stays recorded so a retry re-awaits it
            Ok(ConfirmationOutcome::TimedOut) => Err(EngineError::ConfirmationTimedOut),
            Err(err) => {
                debug!("Confirmation of {} unknown: {}", key, err);
                Err(EngineError::ConfirmationTimedOut)
            }
        }
    }
}

fn affected_stakes(operation: &Operation, confirmation: &Confirmation) -> Vec<StakeKey> {
    match operation {
        Operation::Stake { account, .. } | Operation::StakeBatch { account, .. } => confirmation
            .created_stake_ids
            .iter()
            .map(|id| StakeKey::new(*account, *id))
            .collect(),
        other => other.target().into_iter().collect(),
    }
}
