//! Accrual model.
//!
//! Pure functions computing yield owed on a stake. All arithmetic is
//! integer; nothing here reads a clock or mutates state.
//!
//! # Integration rule
//!
//! The rate is piecewise-constant per second: `apr(s)` applies to `[s, s+1)`.
//! Over `[a, b)` the yield is
//!
//! ```text
//! floor(principal * Σ_{s=a}^{b-1} apr_bps(s) / (10_000 * SECONDS_PER_YEAR))
//! ```
//!
//! evaluated exactly with a single final floor. For a fixed rate this is the
//! ledger's linear formula `principal * apr * elapsed / (10_000 * year)`.

use crate::constants::{BASIS_POINTS_DENOMINATOR, SECONDS_PER_YEAR};
use crate::error::{EngineError, Result};
use crate::math::mul_div_floor;
use crate::state::{Amount, RateSchedule, Stake, UnixTimestamp};

/// Yield accrued by `principal` over `elapsed_seconds` starting at `claim_from`.
///
/// Returns zero when `elapsed_seconds <= 0`. `claim_from` only matters for
/// time-varying schedules.
pub fn accrue(
    principal: Amount,
    schedule: &RateSchedule,
    claim_from: UnixTimestamp,
    elapsed_seconds: i64,
) -> Result<Amount> {
    if elapsed_seconds <= 0 || principal == 0 {
        return Ok(0);
    }
    let until = claim_from
        .checked_add(elapsed_seconds)
        .ok_or(EngineError::MathOverflow)?;

    let year = SECONDS_PER_YEAR as u128;
    // Every schedule's rate sum is expressed over this common denominator
    let denominator = (BASIS_POINTS_DENOMINATOR as u128)
        .checked_mul(year)
        .and_then(|d| d.checked_mul(year))
        .ok_or(EngineError::MathOverflow)?;

    let rate_sum = rate_sum_scaled(schedule, claim_from, until)?;
    mul_div_floor(principal, rate_sum, denominator)
}

/// Current yield owed on `stake` as of `now`.
///
/// Withdrawn stakes owe nothing.
pub fn accrued_yield(stake: &Stake, schedule: &RateSchedule, now: UnixTimestamp) -> Result<Amount> {
    if !stake.is_active() {
        return Ok(0);
    }
    let from = stake.accrual_start();
    let elapsed = now.saturating_sub(from);
    accrue(stake.principal, schedule, from, elapsed)
}

/// `Σ apr_bps(s) * SECONDS_PER_YEAR` for `s` in `[from, until)`.
fn rate_sum_scaled(schedule: &RateSchedule, from: i64, until: i64) -> Result<u128> {
    let year = SECONDS_PER_YEAR as u128;
    match *schedule {
        RateSchedule::Fixed { apr_bps } => {
            let seconds = span(from, until);
            (apr_bps as u128)
                .checked_mul(seconds)
                .and_then(|v| v.checked_mul(year))
                .ok_or(EngineError::MathOverflow)
        }
        RateSchedule::Linear {
            epoch,
            base_apr_bps,
            growth_bps_per_year,
        } => {
            let seconds = span(from, until);
            let base = (base_apr_bps as u128)
                .checked_mul(seconds)
                .and_then(|v| v.checked_mul(year))
                .ok_or(EngineError::MathOverflow)?;

            // Growth only applies from the epoch on
            let grow_from = from.max(epoch);
            if grow_from >= until {
                return Ok(base);
            }
            let first = (grow_from as i128 - epoch as i128) as u128;
            let last = (until as i128 - 1 - epoch as i128) as u128;
            let count = last - first + 1;
            // Σ s over [first, last]; (first + last) * count is always even
            let offsets = first
                .checked_add(last)
                .and_then(|v| v.checked_mul(count))
                .map(|v| v / 2)
                .ok_or(EngineError::MathOverflow)?;
            let growth = (growth_bps_per_year as u128)
                .checked_mul(offsets)
                .ok_or(EngineError::MathOverflow)?;

            base.checked_add(growth).ok_or(EngineError::MathOverflow)
        }
    }
}

fn span(from: i64, until: i64) -> u128 {
    until.saturating_sub(from).max(0) as u128
}
