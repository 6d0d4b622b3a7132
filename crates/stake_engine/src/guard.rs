//! Lifecycle guard.
//!
//! Pre-flight checks run before any operation reaches the ledger. Every
//! function is pure over the state it is handed, so callers decide where the
//! snapshot comes from.

use crate::accrual::accrued_yield;
use crate::error::{RejectReason, Result};
use crate::state::{Amount, RateSchedule, Stake, StakeCapPolicy, UnixTimestamp};

pub type GuardResult = std::result::Result<(), RejectReason>;

/// Validate a single stake creation.
///
/// Checks run in order: zero amount, maximum cap, minimum cap, balance,
/// staking period.
pub fn validate_stake_intent(
    amount: Amount,
    staking_period: i64,
    caps: &StakeCapPolicy,
    account_balance: Amount,
    allowed_periods: &[i64],
) -> GuardResult {
    check_amount(amount, caps)?;
    if account_balance < amount {
        return Err(RejectReason::InsufficientBalance);
    }
    check_period(staking_period, allowed_periods)
}

/// Validate a batch of stake creations submitted as one ledger operation.
///
/// Each entry must pass the cap and period checks on its own; the balance
/// must cover the whole batch.
pub fn validate_stake_batch(
    amounts: &[Amount],
    staking_periods: &[i64],
    caps: &StakeCapPolicy,
    account_balance: Amount,
    allowed_periods: &[i64],
) -> GuardResult {
    if amounts.is_empty() {
        return Err(RejectReason::EmptyBatch);
    }
    if amounts.len() != staking_periods.len() {
        return Err(RejectReason::BatchLengthMismatch);
    }

    let mut total: Amount = 0;
    for (amount, period) in amounts.iter().zip(staking_periods) {
        check_amount(*amount, caps)?;
        check_period(*period, allowed_periods)?;
        // a total beyond u128 can never be covered by a balance
        total = total
            .checked_add(*amount)
            .ok_or(RejectReason::InsufficientBalance)?;
    }

    if account_balance < total {
        return Err(RejectReason::InsufficientBalance);
    }
    Ok(())
}

/// Validate a yield claim: the stake must be active and owe something.
pub fn validate_withdraw_yield(
    stake: &Stake,
    schedule: &RateSchedule,
    now: UnixTimestamp,
) -> Result<()> {
    if !stake.is_active() {
        return Err(RejectReason::StakeNotActive.into());
    }
    if accrued_yield(stake, schedule, now)? == 0 {
        return Err(RejectReason::NoYieldAvailable.into());
    }
    Ok(())
}

/// Validate a full principal withdrawal.
pub fn validate_withdraw_stake(stake: &Stake, now: UnixTimestamp) -> GuardResult {
    if !stake.is_active() {
        return Err(RejectReason::StakeNotActive);
    }
    if !stake.is_lock_ended(now) {
        return Err(RejectReason::LockNotExpired);
    }
    Ok(())
}

/// Validate a partial principal withdrawal of `amount`.
pub fn validate_partial_withdraw(stake: &Stake, amount: Amount, now: UnixTimestamp) -> GuardResult {
    validate_withdraw_stake(stake, now)?;
    if amount == 0 {
        return Err(RejectReason::ZeroAmount);
    }
    if amount > stake.principal {
        return Err(RejectReason::ExceedsPrincipal);
    }
    Ok(())
}

fn check_amount(amount: Amount, caps: &StakeCapPolicy) -> GuardResult {
    if amount == 0 {
        return Err(RejectReason::ZeroAmount);
    }
    if amount > caps.maximum_stake() {
        return Err(RejectReason::AboveMaximum);
    }
    if amount < caps.minimum_stake() {
        return Err(RejectReason::BelowMinimum);
    }
    Ok(())
}

fn check_period(staking_period: i64, allowed_periods: &[i64]) -> GuardResult {
    if allowed_periods.contains(&staking_period) {
        Ok(())
    } else {
        Err(RejectReason::InvalidStakingPeriod)
    }
}
